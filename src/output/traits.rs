//! Index sink trait and error types
//!
//! This module defines the trait interface for index export targets and
//! the document shape they receive.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Failed to format output: {0}")]
    Format(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Book metadata attached to every document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookInfo {
    pub title: String,
    pub vol_no: u32,
    pub sec_no: u32,
    pub page_no: u32,
}

/// One searchable document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDocument {
    /// Stable id derived from the record key
    pub id: String,
    pub book: BookInfo,
    /// Translated heading
    pub title: String,
    /// Heading in the source language
    pub topic: String,
    /// Source text with diacritics
    pub text_original: String,
    /// Source text with diacritics removed
    pub text_plain: String,
    pub text_translated: String,
}

/// Receives documents in batches
///
/// Sinks must treat documents as upserts keyed by `id`, so exporting the
/// same records twice leaves the index unchanged.
pub trait IndexSink {
    fn write_batch(&mut self, documents: &[IndexDocument]) -> OutputResult<()>;

    /// Flushes buffered output
    fn finish(&mut self) -> OutputResult<()> {
        Ok(())
    }
}
