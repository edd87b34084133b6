//! Storage traits and error types
//!
//! The traversal engine only talks to storage through [`ProgressStore`] and
//! [`PageStore`], so backends can be swapped without touching it.

use crate::state::{Coordinate, RunStatus};
use crate::storage::{GapRecord, RunRecord};
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt record in {location}: {message}")]
    Corrupt { location: String, message: String },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable checkpoint of the next coordinate, plus the run and gap logs
pub trait ProgressStore {
    /// Reads the checkpoint, `None` if the harvest never ran
    fn load_progress(&self) -> StorageResult<Option<Coordinate>>;

    /// Atomically replaces the checkpoint
    fn save_progress(&mut self, next: Coordinate) -> StorageResult<()>;

    /// Opens a new run record with status `running`
    fn start_run(&mut self, config_hash: &str) -> StorageResult<()>;

    /// Closes the current run record
    fn finish_run(&mut self, status: RunStatus) -> StorageResult<()>;

    /// Most recent run record
    fn last_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Persists a section skipped by a forced advance
    fn record_gap(&mut self, gap: &GapRecord) -> StorageResult<()>;

    /// All recorded gaps, oldest first
    fn gaps(&self) -> StorageResult<Vec<GapRecord>>;
}

/// Write-once-per-coordinate store of raw payloads
///
/// Writes must be idempotent: storing the same coordinate twice replaces the
/// first payload.
pub trait PageStore {
    fn store_page(&mut self, coordinate: Coordinate, payload: &Value) -> StorageResult<()>;

    fn load_page(&self, coordinate: Coordinate) -> StorageResult<Option<Value>>;

    /// Every stored coordinate in ascending order
    fn list_pages(&self) -> StorageResult<Vec<Coordinate>>;

    fn contains_page(&self, coordinate: Coordinate) -> StorageResult<bool> {
        Ok(self.load_page(coordinate)?.is_some())
    }
}

/// A backend that provides both stores
pub trait Storage: ProgressStore + PageStore {}

impl<T: ProgressStore + PageStore + ?Sized> Storage for T {}

impl<T: ProgressStore + ?Sized> ProgressStore for Box<T> {
    fn load_progress(&self) -> StorageResult<Option<Coordinate>> {
        (**self).load_progress()
    }

    fn save_progress(&mut self, next: Coordinate) -> StorageResult<()> {
        (**self).save_progress(next)
    }

    fn start_run(&mut self, config_hash: &str) -> StorageResult<()> {
        (**self).start_run(config_hash)
    }

    fn finish_run(&mut self, status: RunStatus) -> StorageResult<()> {
        (**self).finish_run(status)
    }

    fn last_run(&self) -> StorageResult<Option<RunRecord>> {
        (**self).last_run()
    }

    fn record_gap(&mut self, gap: &GapRecord) -> StorageResult<()> {
        (**self).record_gap(gap)
    }

    fn gaps(&self) -> StorageResult<Vec<GapRecord>> {
        (**self).gaps()
    }
}

impl<T: PageStore + ?Sized> PageStore for Box<T> {
    fn store_page(&mut self, coordinate: Coordinate, payload: &Value) -> StorageResult<()> {
        (**self).store_page(coordinate, payload)
    }

    fn load_page(&self, coordinate: Coordinate) -> StorageResult<Option<Value>> {
        (**self).load_page(coordinate)
    }

    fn list_pages(&self) -> StorageResult<Vec<Coordinate>> {
        (**self).list_pages()
    }

    fn contains_page(&self, coordinate: Coordinate) -> StorageResult<bool> {
        (**self).contains_page(coordinate)
    }
}
