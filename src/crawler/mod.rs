//! Harvest module for walking the remote corpus
//!
//! This module contains the core harvesting logic, including:
//! - Single-shot page fetching and response classification
//! - Attempt-level retry with sticky rate-limit backoff
//! - Coordinate transition rules
//! - The traversal engine that ties them to storage

mod engine;
mod fetcher;
mod retry;
mod transition;

pub use engine::{EngineSettings, HarvestReport, HarvestStop, TraversalEngine};
pub use fetcher::{
    classify_payload, classify_response, ApiFetcher, FetchOutcome, Fetcher, NOT_FOUND_CODE,
    QUOTA_EXHAUSTED_CODE,
};
pub use retry::{fetch_with_retry, AttemptFailure, RetryOutcome, RetryPolicy};
pub use transition::{next_step, BoundaryProbe, Step};

use crate::config::Config;
use crate::storage::open_storage;
use crate::HarvestError;
use tokio::sync::watch;

/// Runs a complete harvest
///
/// This is the main entry point for starting a harvest. It will:
/// 1. Open the configured storage backend
/// 2. Build the API fetcher
/// 3. Walk coordinates from the checkpoint until the engine stops
///
/// # Arguments
///
/// * `config` - The harvest configuration
/// * `config_hash` - Hash of the configuration file, stored with the run
/// * `shutdown` - Stops the run between coordinates once it turns true
pub async fn harvest(
    config: &Config,
    config_hash: &str,
    shutdown: watch::Receiver<bool>,
) -> Result<HarvestReport, HarvestError> {
    let store = open_storage(&config.storage)?;
    let fetcher = ApiFetcher::from_config(&config.api)?;
    let settings = EngineSettings::from_config(config, config_hash);

    let mut engine = TraversalEngine::new(fetcher, store, settings).with_shutdown(shutdown);
    engine.run().await
}
