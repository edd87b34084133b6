//! Harvest statistics from storage
//!
//! This module provides functionality for extracting and displaying
//! harvest progress from the storage layer.

use crate::state::Coordinate;
use crate::storage::{GapRecord, RunRecord, Storage};
use crate::HarvestError;
use std::collections::BTreeMap;

/// Harvest statistics summary
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// Next coordinate to fetch, if a harvest ever ran
    pub checkpoint: Option<Coordinate>,

    /// Most recent run record
    pub last_run: Option<RunRecord>,

    /// Stored page counts keyed by volume
    pub pages_by_volume: BTreeMap<u32, u64>,

    /// Sections skipped after exhausting retries
    pub gaps: Vec<GapRecord>,
}

impl HarvestStatistics {
    pub fn total_pages(&self) -> u64 {
        self.pages_by_volume.values().sum()
    }
}

/// Loads statistics from storage
pub fn load_statistics<S>(storage: &S) -> Result<HarvestStatistics, HarvestError>
where
    S: Storage + ?Sized,
{
    let mut pages_by_volume = BTreeMap::new();
    for coordinate in storage.list_pages()? {
        *pages_by_volume.entry(coordinate.volume).or_insert(0) += 1;
    }

    Ok(HarvestStatistics {
        checkpoint: storage.load_progress()?,
        last_run: storage.last_run()?,
        pages_by_volume,
        gaps: storage.gaps()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Status ===\n");

    match stats.checkpoint {
        Some(next) => println!("Next coordinate: {}", next),
        None => println!("Next coordinate: {} (never run)", Coordinate::START),
    }

    if let Some(run) = &stats.last_run {
        println!("Last run:");
        println!("  Started: {}", run.started_at);
        if let Some(finished) = &run.finished_at {
            println!("  Finished: {}", finished);
        }
        println!("  Status: {}", run.status);
        if run.status.needs_operator() {
            println!("  Operator action needed before the next run.");
        }
    }
    println!();

    println!("Stored pages: {}", stats.total_pages());
    for (volume, count) in &stats.pages_by_volume {
        println!("  Volume {}: {}", volume, count);
    }
    println!();

    if !stats.gaps.is_empty() {
        println!("Skipped sections ({}):", stats.gaps.len());
        for gap in &stats.gaps {
            println!(
                "  - {} after {} attempts: {} ({})",
                gap.coordinate, gap.attempts, gap.reason, gap.recorded_at
            );
        }
    }
}
