//! Traversal engine - main harvest loop
//!
//! The engine owns the only mutable coordinate. Each iteration it:
//! - checks the shutdown signal (only ever between coordinates, and again
//!   after the pause between requests)
//! - asks the retry wrapper for a verdict on the current coordinate
//! - stores the page (if any) and then checkpoints the next coordinate
//! - stops on end of book or quota exhaustion
//!
//! A page write always precedes its checkpoint, so a crash in between only
//! causes one harmless re-fetch on resume.

use crate::config::Config;
use crate::crawler::fetcher::Fetcher;
use crate::crawler::retry::{fetch_with_retry, RetryOutcome, RetryPolicy};
use crate::crawler::transition::{next_step, BoundaryProbe, Step};
use crate::state::{Coordinate, RunStatus, StopReason};
use crate::storage::{GapRecord, Storage};
use crate::HarvestError;
use chrono::Utc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Engine settings derived from configuration
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub retry: RetryPolicy,
    /// Pause between coordinates
    pub request_interval: Duration,
    /// Hash of the configuration, stored with the run record
    pub config_hash: String,
}

impl EngineSettings {
    pub fn from_config(config: &Config, config_hash: &str) -> Self {
        Self {
            retry: RetryPolicy::from(&config.retry),
            request_interval: Duration::from_millis(config.traversal.request_interval_ms),
            config_hash: config_hash.to_string(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            request_interval: Duration::ZERO,
            config_hash: String::new(),
        }
    }
}

/// How a harvest run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarvestStop {
    Stopped(StopReason),
    /// The shutdown signal was honored between coordinates
    Interrupted,
}

impl HarvestStop {
    pub fn run_status(&self) -> RunStatus {
        match self {
            Self::Stopped(reason) => RunStatus::from(*reason),
            Self::Interrupted => RunStatus::Interrupted,
        }
    }
}

/// Summary of one harvest run
#[derive(Debug, Clone)]
pub struct HarvestReport {
    /// Coordinate the run started from
    pub started_at: Coordinate,
    /// Coordinate the next run will start from
    pub checkpoint: Coordinate,
    pub stop: HarvestStop,
    pub pages_stored: u64,
    pub boundaries_crossed: u64,
    pub gaps: Vec<GapRecord>,
    pub elapsed: Duration,
}

/// Sequential harvest state machine
pub struct TraversalEngine<F, S> {
    fetcher: F,
    store: S,
    settings: EngineSettings,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<F, S> TraversalEngine<F, S>
where
    F: Fetcher,
    S: Storage,
{
    pub fn new(fetcher: F, store: S, settings: EngineSettings) -> Self {
        Self {
            fetcher,
            store,
            settings,
            shutdown: None,
        }
    }

    /// Stops the run at the next iteration boundary once `signal` turns true
    pub fn with_shutdown(mut self, signal: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(signal);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Runs until the book is complete, quota runs out, or shutdown is requested
    ///
    /// Storage failures end the run with an error; the run record is marked
    /// `failed` when that is still possible.
    pub async fn run(&mut self) -> Result<HarvestReport, HarvestError> {
        self.store.start_run(&self.settings.config_hash)?;

        match self.drive().await {
            Ok(report) => {
                self.store.finish_run(report.stop.run_status())?;
                Ok(report)
            }
            Err(e) => {
                if let Err(log_err) = self.store.finish_run(RunStatus::Failed) {
                    tracing::error!("Could not mark run as failed: {}", log_err);
                }
                Err(e)
            }
        }
    }

    async fn drive(&mut self) -> Result<HarvestReport, HarvestError> {
        let start = self.store.load_progress()?.unwrap_or_else(|| {
            tracing::info!("No progress record found. Starting from the beginning.");
            Coordinate::START
        });
        tracing::info!("Harvest starting at {}", start);

        let started = Instant::now();
        let mut current = start;
        let mut probe = BoundaryProbe::None;
        let mut pages_stored = 0u64;
        let mut boundaries_crossed = 0u64;
        let mut gaps = Vec::new();
        let mut first = true;

        let stop = loop {
            if self.shutdown_requested() {
                tracing::info!("Shutdown requested; resume point is {}", current);
                break HarvestStop::Interrupted;
            }

            if !first && !self.settings.request_interval.is_zero() {
                tokio::time::sleep(self.settings.request_interval).await;
                if self.shutdown_requested() {
                    tracing::info!("Shutdown requested; resume point is {}", current);
                    break HarvestStop::Interrupted;
                }
            }
            first = false;

            tracing::debug!("Attempting to fetch {}", current);
            let outcome = fetch_with_retry(&self.fetcher, current, &self.settings.retry).await;

            match next_step(current, probe, &outcome) {
                Step::Store { next } => {
                    if let RetryOutcome::Success(payload) = &outcome {
                        self.store.store_page(current, payload)?;
                    }
                    self.store.save_progress(next)?;
                    pages_stored += 1;
                    tracing::info!("Stored {}", current);
                    current = next;
                    probe = BoundaryProbe::None;
                }
                Step::Cross { next, probe: next_probe } => {
                    self.store.save_progress(next)?;
                    boundaries_crossed += 1;
                    tracing::info!("{} does not exist; moving to {}", current, next);
                    current = next;
                    probe = next_probe;
                }
                Step::Skip {
                    next,
                    attempts,
                    failure,
                } => {
                    let gap = GapRecord {
                        coordinate: current,
                        attempts,
                        reason: failure.to_string(),
                        recorded_at: Utc::now().to_rfc3339(),
                    };
                    self.store.record_gap(&gap)?;
                    self.store.save_progress(next)?;
                    tracing::warn!(
                        "Failed to fetch {} after {} attempts ({}); skipping to {}",
                        current,
                        attempts,
                        failure,
                        next
                    );
                    gaps.push(gap);
                    current = next;
                    probe = BoundaryProbe::None;
                }
                Step::Stop(StopReason::QuotaExhausted) => {
                    tracing::error!(
                        "Insufficient credit to access {}; stopping. Resume point stays at {}",
                        current,
                        current
                    );
                    break HarvestStop::Stopped(StopReason::QuotaExhausted);
                }
                Step::Stop(StopReason::BookComplete) => {
                    tracing::info!("{} does not exist; harvest complete", current);
                    break HarvestStop::Stopped(StopReason::BookComplete);
                }
            }
        };

        let report = HarvestReport {
            started_at: start,
            checkpoint: current,
            stop,
            pages_stored,
            boundaries_crossed,
            gaps,
            elapsed: started.elapsed(),
        };

        tracing::info!(
            "Harvest ended ({:?}): {} pages stored, {} boundaries crossed, {} gaps in {:?}",
            report.stop,
            report.pages_stored,
            report.boundaries_crossed,
            report.gaps.len(),
            report.elapsed
        );

        Ok(report)
    }
}
