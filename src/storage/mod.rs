//! Storage module for persisting harvest data
//!
//! This module handles all durable state, including:
//! - The single progress checkpoint (next coordinate to fetch)
//! - Raw page payloads, one per coordinate
//! - Run records and the log of skipped sections
//!
//! Two backends implement the same traits: a plain file tree
//! (`volume_*/section_*/page_*.json` plus `progress.json`) and SQLite.

mod files;
mod schema;
mod sqlite;
mod traits;

pub use files::FileStorage;
pub(crate) use files::write_atomically;
pub use sqlite::SqliteStorage;
pub use traits::{PageStore, ProgressStore, Storage, StorageError, StorageResult};

use crate::config::{StorageBackend, StorageConfig};
use crate::state::{Coordinate, RunStatus};
use serde::{Deserialize, Serialize};

/// Opens the backend selected in the configuration
pub fn open_storage(config: &StorageConfig) -> StorageResult<Box<dyn Storage + Send>> {
    match config.backend {
        StorageBackend::Files => {
            tracing::debug!(
                "Opening file storage (pages: {}, state: {})",
                config.data_dir.display(),
                config.state_dir.display()
            );
            Ok(Box::new(FileStorage::open(&config.data_dir, &config.state_dir)?))
        }
        StorageBackend::Sqlite => {
            tracing::debug!("Opening SQLite storage at {}", config.database_path.display());
            Ok(Box::new(SqliteStorage::new(&config.database_path)?))
        }
    }
}

/// Represents a harvest run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// A section skipped after exhausting retries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapRecord {
    /// Coordinate whose fetch kept failing
    pub coordinate: Coordinate,
    pub attempts: u32,
    /// Last failure observed
    pub reason: String,
    pub recorded_at: String,
}
