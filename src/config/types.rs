use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for Corpus Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub traversal: TraversalConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub translate: TranslateConfig,
    #[serde(default)]
    pub index: IndexConfig,
}

/// Remote API endpoint and request identity
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ApiConfig {
    /// Endpoint that serves one page per POST request
    pub base_url: String,

    /// Identifier of the corpus item (book) being harvested
    pub book_id: u64,

    #[serde(default = "default_origin")]
    pub origin: String,

    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_view_type")]
    pub view_type: String,

    /// Sent as the `referer` header when set
    #[serde(default)]
    pub referrer: Option<String>,

    /// Bearer token given inline
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Name of the environment variable holding the bearer token
    #[serde(default)]
    pub auth_token_env: Option<String>,

    /// Per-request timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Attempt-level retry policy
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Fetch attempts per coordinate before forcing an advance
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay after a transient error (milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Delay once the API has rate limited us (milliseconds)
    #[serde(default = "default_rate_limit_delay_ms")]
    pub rate_limit_delay_ms: u64,
}

/// Coordinate-level traversal settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TraversalConfig {
    /// Pause between consecutive coordinates (milliseconds)
    #[serde(default)]
    pub request_interval_ms: u64,
}

/// Which storage backend holds pages and progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Files,
    Sqlite,
}

/// Storage locations
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Root of the `volume_*/section_*/page_*.json` tree (files backend)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory for progress.json, run.json and gaps.jsonl (files backend)
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// SQLite database file (sqlite backend)
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

/// Rules for turning stored pages into records
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExtractConfig {
    #[serde(default = "default_records_path")]
    pub records_path: PathBuf,

    #[serde(default = "default_record_selector")]
    pub record_selector: String,

    #[serde(default = "default_heading_selector")]
    pub heading_selector: String,

    #[serde(default = "default_id_attribute")]
    pub id_attribute: String,
}

/// Translation stage settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TranslateConfig {
    /// HTTP translation service; records pass through untranslated when unset
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_source_language")]
    pub source_language: String,

    #[serde(default = "default_target_language")]
    pub target_language: String,

    #[serde(default = "default_translated_path")]
    pub output_path: PathBuf,

    /// Number of newly translated records between output flushes
    #[serde(default = "default_flush_every")]
    pub flush_every: usize,
}

/// Bulk index export settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IndexConfig {
    #[serde(default = "default_index_name")]
    pub index_name: String,

    /// Prefix of every derived document id
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,

    #[serde(default)]
    pub book_title: String,

    #[serde(default = "default_bulk_path")]
    pub bulk_path: PathBuf,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_origin() -> String {
    "noorlib.web.app".to_string()
}

fn default_language() -> String {
    "fa".to_string()
}

fn default_view_type() -> String {
    "html".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    2_000
}

fn default_rate_limit_delay_ms() -> u64 {
    10_000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./scraped_data")
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./harvest.db")
}

fn default_records_path() -> PathBuf {
    PathBuf::from("./records.json")
}

fn default_record_selector() -> String {
    "format.hadith".to_string()
}

fn default_heading_selector() -> String {
    "heading".to_string()
}

fn default_id_attribute() -> String {
    "revayatindex".to_string()
}

fn default_source_language() -> String {
    "ar".to_string()
}

fn default_target_language() -> String {
    "fa".to_string()
}

fn default_translated_path() -> PathBuf {
    PathBuf::from("./records_translated.json")
}

fn default_flush_every() -> usize {
    25
}

fn default_index_name() -> String {
    "corpus".to_string()
}

fn default_id_prefix() -> String {
    "doc".to_string()
}

fn default_bulk_path() -> PathBuf {
    PathBuf::from("./bulk.ndjson")
}

fn default_batch_size() -> usize {
    500
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            rate_limit_delay_ms: default_rate_limit_delay_ms(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            data_dir: default_data_dir(),
            state_dir: default_state_dir(),
            database_path: default_database_path(),
        }
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            records_path: default_records_path(),
            record_selector: default_record_selector(),
            heading_selector: default_heading_selector(),
            id_attribute: default_id_attribute(),
        }
    }
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            source_language: default_source_language(),
            target_language: default_target_language(),
            output_path: default_translated_path(),
            flush_every: default_flush_every(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_name: default_index_name(),
            id_prefix: default_id_prefix(),
            book_title: String::new(),
            bulk_path: default_bulk_path(),
            batch_size: default_batch_size(),
        }
    }
}

impl ApiConfig {
    /// Resolves the bearer token, reading the configured environment variable if needed
    ///
    /// An inline `auth-token` wins over `auth-token-env`. Returns `Ok(None)` when
    /// neither is configured.
    pub fn resolve_token(&self) -> Result<Option<String>, crate::ConfigError> {
        if let Some(token) = &self.auth_token {
            return Ok(Some(token.clone()));
        }

        match &self.auth_token_env {
            Some(var) => std::env::var(var)
                .map(Some)
                .map_err(|_| crate::ConfigError::MissingToken(var.clone())),
            None => Ok(None),
        }
    }
}
