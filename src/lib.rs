//! Corpus Harvest: a resumable harvester for paginated remote corpora
//!
//! This crate walks a remote text corpus organized as volume → section → page
//! through a rate-limited HTTP API, stores every page it fetches, and keeps a
//! single checkpoint so an interrupted harvest resumes exactly where it left off.
//! Volume and section boundaries are discovered empirically from the API's
//! validation signals.
//!
//! Downstream stages turn stored pages into records ([`extract`]), translate
//! them ([`translate`]) and export them for bulk indexing ([`output`]).

pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod state;
pub mod storage;
pub mod translate;

use thiserror::Error;

/// Main error type for harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Extraction error at {coordinate}: {message}")]
    Extract {
        coordinate: state::Coordinate,
        message: String,
    },

    #[error("Translation error: {0}")]
    Translate(#[from] translate::TranslateError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("Environment variable {0} holding the API token is not set")]
    MissingToken(String),
}

/// Result type alias for harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{HarvestReport, HarvestStop, TraversalEngine};
pub use state::{Coordinate, RunStatus, StopReason};
