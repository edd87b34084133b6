//! Translation of extracted records
//!
//! The driver is resumable: records already present in the output file are
//! reused as long as their source text is unchanged, and records whose
//! translation fails are left out so the next run retries them.

use crate::config::TranslateConfig;
use crate::extract::Record;
use crate::storage::write_atomically;
use crate::HarvestError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors from a translation backend
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Translation service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Translation service returned an empty text")]
    EmptyResponse,
}

/// What is being translated; services may phrase titles differently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextKind {
    Title,
    Content,
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, kind: TextKind) -> Result<String, TranslateError>;
}

/// Copies text unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughTranslator;

#[async_trait]
impl Translator for PassthroughTranslator {
    async fn translate(&self, text: &str, _kind: TextKind) -> Result<String, TranslateError> {
        Ok(text.to_string())
    }
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    text: &'a str,
    source: &'a str,
    target: &'a str,
    kind: TextKind,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    text: String,
}

/// Translator backed by an HTTP service
pub struct HttpTranslator {
    client: Client,
    endpoint: String,
    source: String,
    target: String,
}

impl HttpTranslator {
    pub fn new(endpoint: &str, source: &str, target: &str) -> Result<Self, TranslateError> {
        let client = Client::builder()
            .user_agent(concat!("corpus-harvest/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            source: source.to_string(),
            target: target.to_string(),
        })
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, text: &str, kind: TextKind) -> Result<String, TranslateError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&TranslateRequest {
                text,
                source: &self.source,
                target: &self.target,
                kind,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranslateError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let translated = response.json::<TranslateResponse>().await?.text;
        let translated = translated.trim();
        if translated.is_empty() && !text.trim().is_empty() {
            return Err(TranslateError::EmptyResponse);
        }
        Ok(translated.to_string())
    }
}

/// Builds the configured translator; passthrough when no endpoint is set
pub fn translator_from_config(
    config: &TranslateConfig,
) -> Result<Box<dyn Translator>, TranslateError> {
    match &config.endpoint {
        Some(endpoint) => Ok(Box::new(HttpTranslator::new(
            endpoint,
            &config.source_language,
            &config.target_language,
        )?)),
        None => {
            tracing::warn!("No translation endpoint configured; copying text unchanged");
            Ok(Box::new(PassthroughTranslator))
        }
    }
}

/// A record with its translated title and content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatedRecord {
    #[serde(flatten)]
    pub record: Record,
    pub title_translated: String,
    pub content_translated: String,
}

/// Counts for one translation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranslateReport {
    pub reused: usize,
    pub translated: usize,
    pub failed: usize,
}

/// Translates `records`, resuming from whatever `output_path` already holds
pub async fn translate_records<T>(
    records: &[Record],
    translator: &T,
    output_path: &Path,
    flush_every: usize,
) -> Result<TranslateReport, HarvestError>
where
    T: Translator + ?Sized,
{
    let mut previous: HashMap<String, TranslatedRecord> = read_translated(output_path)?
        .into_iter()
        .map(|t| (t.record.key(), t))
        .collect();
    tracing::info!(
        "Translating {} records ({} already in {})",
        records.len(),
        previous.len(),
        output_path.display()
    );

    let flush_every = flush_every.max(1);
    let mut report = TranslateReport::default();
    let mut output = Vec::with_capacity(records.len());
    let mut pending = 0;

    for record in records {
        if let Some(done) = previous.remove(&record.key()) {
            if done.record.content == record.content {
                report.reused += 1;
                output.push(done);
                continue;
            }
        }

        match translate_one(record, translator).await {
            Ok(translated) => {
                tracing::debug!("Translated record {}", record.id);
                report.translated += 1;
                output.push(translated);
                pending += 1;
            }
            Err(e) => {
                tracing::warn!("Failed to translate record {}: {}", record.id, e);
                report.failed += 1;
            }
        }

        // Cached records not reached yet stay in the file until the final write
        if pending >= flush_every {
            write_translated(output_path, output.iter().chain(previous.values()))?;
            pending = 0;
        }
    }

    write_translated(output_path, &output)?;
    tracing::info!(
        "Translation finished: {} reused, {} translated, {} failed",
        report.reused,
        report.translated,
        report.failed
    );

    Ok(report)
}

async fn translate_one<T>(record: &Record, translator: &T) -> Result<TranslatedRecord, TranslateError>
where
    T: Translator + ?Sized,
{
    let title_translated = translator.translate(&record.title, TextKind::Title).await?;
    let content_translated = translator
        .translate(&record.content, TextKind::Content)
        .await?;

    Ok(TranslatedRecord {
        record: record.clone(),
        title_translated,
        content_translated,
    })
}

/// Reads translated records; a missing file reads as empty
pub fn read_translated(path: &Path) -> Result<Vec<TranslatedRecord>, HarvestError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

fn write_translated<'a, I>(path: &Path, records: I) -> Result<(), HarvestError>
where
    I: IntoIterator<Item = &'a TranslatedRecord>,
{
    let records: Vec<&TranslatedRecord> = records.into_iter().collect();
    write_atomically(path, &serde_json::to_vec_pretty(&records)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record(id: &str, content: &str) -> Record {
        Record {
            vol: 1,
            sec: 1,
            page: 1,
            id: id.to_string(),
            title: "باب".to_string(),
            content: content.to_string(),
        }
    }

    /// Fails on any text containing "bad", upper-cases everything else
    #[derive(Default)]
    struct FlakyTranslator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Translator for FlakyTranslator {
        async fn translate(&self, text: &str, _kind: TextKind) -> Result<String, TranslateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if text.contains("bad") {
                Err(TranslateError::EmptyResponse)
            } else {
                Ok(text.to_uppercase())
            }
        }
    }

    /// Records how many entries the output file holds at every call
    struct FileWatchingTranslator {
        path: PathBuf,
        seen: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl Translator for FileWatchingTranslator {
        async fn translate(&self, text: &str, _kind: TextKind) -> Result<String, TranslateError> {
            let count = read_translated(&self.path).map(|r| r.len()).unwrap_or(0);
            self.seen.lock().unwrap().push(count);
            Ok(text.to_uppercase())
        }
    }

    #[tokio::test]
    async fn test_passthrough_copies_text() {
        let text = PassthroughTranslator
            .translate("قال", TextKind::Content)
            .await
            .unwrap();
        assert_eq!(text, "قال");
    }

    #[tokio::test]
    async fn test_failures_are_skipped_not_cached() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("translated.json");
        let records = vec![record("1", "good"), record("2", "bad"), record("3", "fine")];
        let translator = FlakyTranslator::default();

        let report = translate_records(&records, &translator, &out, 1).await.unwrap();
        assert_eq!(
            report,
            TranslateReport {
                reused: 0,
                translated: 2,
                failed: 1
            }
        );

        let written = read_translated(&out).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(written[0].content_translated, "GOOD");
        assert!(written.iter().all(|t| t.record.id != "2"));
    }

    #[tokio::test]
    async fn test_resume_reuses_finished_records() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("translated.json");
        let records = vec![record("1", "one"), record("2", "two")];

        translate_records(&records[..1], &FlakyTranslator::default(), &out, 25)
            .await
            .unwrap();

        let translator = FlakyTranslator::default();
        let report = translate_records(&records, &translator, &out, 25).await.unwrap();

        assert_eq!(report.reused, 1);
        assert_eq!(report.translated, 1);
        // title + content for the one new record only
        assert_eq!(translator.calls.load(Ordering::SeqCst), 2);
        assert_eq!(read_translated(&out).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_changed_content_is_retranslated() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("translated.json");

        translate_records(&[record("1", "half")], &FlakyTranslator::default(), &out, 25)
            .await
            .unwrap();
        let report = translate_records(
            &[record("1", "half\nrest")],
            &FlakyTranslator::default(),
            &out,
            25,
        )
        .await
        .unwrap();

        assert_eq!(report.reused, 0);
        assert_eq!(
            read_translated(&out).unwrap()[0].content_translated,
            "HALF\nREST"
        );
    }

    #[tokio::test]
    async fn test_flush_keeps_cached_records_not_yet_reached() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("translated.json");
        let cached: Vec<Record> = (1..=5)
            .map(|i| record(&i.to_string(), &format!("text {}", i)))
            .collect();
        translate_records(&cached, &FlakyTranslator::default(), &out, 25)
            .await
            .unwrap();

        let mut records = vec![record("6", "new"), record("1", "text 1 changed")];
        records.extend_from_slice(&cached[1..]);
        let translator = FileWatchingTranslator {
            path: out.clone(),
            seen: Mutex::new(Vec::new()),
        };
        let report = translate_records(&records, &translator, &out, 1).await.unwrap();

        assert_eq!(report.reused, 4);
        assert_eq!(report.translated, 2);
        // An interruption at any point would have left every cached record on disk
        assert_eq!(*translator.seen.lock().unwrap(), vec![5, 5, 6, 6]);

        let written = read_translated(&out).unwrap();
        let ids: Vec<&str> = written.iter().map(|t| t.record.id.as_str()).collect();
        assert_eq!(ids, vec!["6", "1", "2", "3", "4", "5"]);
        assert_eq!(written[1].content_translated, "TEXT 1 CHANGED");
    }

    #[tokio::test]
    async fn test_http_translator_request_and_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/translate"))
            .and(body_partial_json(serde_json::json!({
                "source": "ar",
                "target": "fa",
                "kind": "title"
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": " موضوع "})),
            )
            .mount(&server)
            .await;

        let translator =
            HttpTranslator::new(&format!("{}/translate", server.uri()), "ar", "fa").unwrap();
        let text = translator.translate("باب", TextKind::Title).await.unwrap();
        assert_eq!(text, "موضوع");
    }

    #[tokio::test]
    async fn test_http_translator_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let translator = HttpTranslator::new(&server.uri(), "ar", "fa").unwrap();
        let err = translator
            .translate("x", TextKind::Content)
            .await
            .unwrap_err();
        assert!(matches!(err, TranslateError::Status { status: 500, .. }));
    }
}
