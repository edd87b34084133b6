//! HTTP fetcher implementation
//!
//! This module performs exactly one request per call and classifies the
//! result. It never retries; that is the retry wrapper's job.
//!
//! | Response | Outcome |
//! |----------|---------|
//! | HTTP 429 | `RateLimited` |
//! | other non-2xx, connect error, timeout | `TransientError` |
//! | 2xx, undecodable or empty body | `TransientError` |
//! | 2xx, validation code 2 | `NotFound(2)` |
//! | 2xx, validation code 14 | `QuotaExhausted` |
//! | 2xx, anything else | `Success(payload)` |

use crate::config::ApiConfig;
use crate::state::Coordinate;
use crate::ConfigError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, REFERER};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Validation code meaning "no such page"
pub const NOT_FOUND_CODE: i64 = 2;

/// Validation code meaning "insufficient credit"
pub const QUOTA_EXHAUSTED_CODE: i64 = 14;

/// Result of a single fetch attempt
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Page content, exactly as returned by the API
    Success(Value),

    /// HTTP 429
    RateLimited,

    /// Network failure, non-2xx status, or unusable body
    TransientError(String),

    /// The page does not exist (carries the validation code)
    NotFound(i64),

    /// The account cannot fetch more pages
    QuotaExhausted,
}

/// Performs one network call for a coordinate
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, coordinate: Coordinate) -> FetchOutcome;
}

/// JSON body of a page request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PageRequest<'a> {
    origin: &'a str,
    language: &'a str,
    book_id: u64,
    book_view: bool,
    volume_number: u32,
    section_number: u32,
    view_type: &'a str,
    is_referral_from_google_search: &'a str,
    page_number: u32,
}

/// Fetcher backed by the remote page API
pub struct ApiFetcher {
    client: Client,
    config: ApiConfig,
}

impl ApiFetcher {
    /// Builds a fetcher from explicit API configuration and an optional bearer token
    pub fn new(config: ApiConfig, token: Option<String>) -> Result<Self, ConfigError> {
        let client = build_http_client(&config, token.as_deref())?;
        Ok(Self { client, config })
    }

    /// Resolves the token from the configuration and builds the fetcher
    pub fn from_config(config: &ApiConfig) -> Result<Self, ConfigError> {
        let token = config.resolve_token()?;
        if token.is_none() {
            tracing::warn!("No API token configured; requests are sent unauthenticated");
        }
        Self::new(config.clone(), token)
    }

    fn request_body(&self, coordinate: Coordinate) -> PageRequest<'_> {
        PageRequest {
            origin: &self.config.origin,
            language: &self.config.language,
            book_id: self.config.book_id,
            book_view: false,
            volume_number: coordinate.volume,
            section_number: coordinate.section,
            view_type: &self.config.view_type,
            is_referral_from_google_search: "",
            page_number: coordinate.page,
        }
    }
}

#[async_trait]
impl Fetcher for ApiFetcher {
    async fn fetch(&self, coordinate: Coordinate) -> FetchOutcome {
        let response = match self
            .client
            .post(&self.config.base_url)
            .json(&self.request_body(coordinate))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let detail = if e.is_timeout() {
                    "Request timeout".to_string()
                } else if e.is_connect() {
                    format!("Connection failed: {}", e)
                } else {
                    e.to_string()
                };
                tracing::debug!("Fetch {} failed: {}", coordinate, detail);
                return FetchOutcome::TransientError(detail);
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return FetchOutcome::TransientError(format!("Failed to read body: {}", e)),
        };

        classify_response(status, &body)
    }
}

/// Builds an HTTP client with the API's default headers
fn build_http_client(config: &ApiConfig, token: Option<&str>) -> Result<Client, ConfigError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));

    if let Some(referrer) = &config.referrer {
        let value = HeaderValue::from_str(referrer)
            .map_err(|e| ConfigError::Validation(format!("Invalid referrer header: {}", e)))?;
        headers.insert(REFERER, value);
    }

    if let Some(token) = token {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| ConfigError::Validation(format!("Invalid API token: {}", e)))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    Client::builder()
        .user_agent(concat!("corpus-harvest/", env!("CARGO_PKG_VERSION")))
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
        .map_err(|e| ConfigError::Validation(format!("Failed to build HTTP client: {}", e)))
}

/// Classifies a complete HTTP response
pub fn classify_response(status: StatusCode, body: &str) -> FetchOutcome {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return FetchOutcome::RateLimited;
    }

    if !status.is_success() {
        return FetchOutcome::TransientError(format!("HTTP {}", status.as_u16()));
    }

    match serde_json::from_str::<Value>(body) {
        Ok(payload) => classify_payload(payload),
        Err(e) => FetchOutcome::TransientError(format!("Invalid JSON body: {}", e)),
    }
}

/// Classifies a decoded 2xx payload by its embedded validation signal
pub fn classify_payload(payload: Value) -> FetchOutcome {
    if is_empty_payload(&payload) {
        return FetchOutcome::TransientError("Empty payload".to_string());
    }

    match validation_code(&payload) {
        Some(QUOTA_EXHAUSTED_CODE) => FetchOutcome::QuotaExhausted,
        Some(NOT_FOUND_CODE) => FetchOutcome::NotFound(NOT_FOUND_CODE),
        Some(other) => {
            tracing::debug!("Ignoring validation code {}", other);
            FetchOutcome::Success(payload)
        }
        None => FetchOutcome::Success(payload),
    }
}

/// Reads `data[0].validation.code`
fn validation_code(payload: &Value) -> Option<i64> {
    payload
        .get("data")?
        .get(0)?
        .get("validation")?
        .get("code")?
        .as_i64()
}

fn is_empty_payload(payload: &Value) -> bool {
    match payload {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_test_config() -> ApiConfig {
        ApiConfig {
            base_url: "https://example.com/api/book/getBookPageContent".to_string(),
            book_id: 126314,
            origin: "noorlib.web.app".to_string(),
            language: "fa".to_string(),
            view_type: "html".to_string(),
            referrer: Some("https://example.com/".to_string()),
            auth_token: None,
            auth_token_env: None,
            timeout_secs: 30,
        }
    }

    #[test]
    fn test_build_http_client() {
        let config = create_test_config();
        assert!(build_http_client(&config, Some("token")).is_ok());
        assert!(build_http_client(&config, Some("bad\ntoken")).is_err());
    }

    #[test]
    fn test_request_body_shape() {
        let fetcher = ApiFetcher::new(create_test_config(), None).unwrap();
        let body = serde_json::to_value(fetcher.request_body(Coordinate::new(2, 3, 4).unwrap()))
            .unwrap();

        assert_eq!(
            body,
            json!({
                "origin": "noorlib.web.app",
                "language": "fa",
                "bookId": 126314,
                "bookView": false,
                "volumeNumber": 2,
                "sectionNumber": 3,
                "viewType": "html",
                "isReferralFromGoogleSearch": "",
                "pageNumber": 4
            })
        );
    }

    #[test]
    fn test_classify_status_codes() {
        assert_eq!(
            classify_response(StatusCode::TOO_MANY_REQUESTS, ""),
            FetchOutcome::RateLimited
        );
        assert_eq!(
            classify_response(StatusCode::SERVICE_UNAVAILABLE, "{}"),
            FetchOutcome::TransientError("HTTP 503".to_string())
        );
        assert!(matches!(
            classify_response(StatusCode::NOT_FOUND, ""),
            FetchOutcome::TransientError(_)
        ));
        assert!(matches!(
            classify_response(StatusCode::OK, "<html>"),
            FetchOutcome::TransientError(_)
        ));
    }

    #[test]
    fn test_classify_validation_signals() {
        let not_found = json!({"data": [{"validation": {"code": 2}}]});
        assert_eq!(classify_payload(not_found), FetchOutcome::NotFound(2));

        let quota = json!({"data": [{"validation": {"code": 14}}]});
        assert_eq!(classify_payload(quota), FetchOutcome::QuotaExhausted);

        let content = json!({"data": [{"paragList": [{"text": "<p>x</p>"}]}]});
        assert_eq!(
            classify_payload(content.clone()),
            FetchOutcome::Success(content)
        );

        let other_code = json!({"data": [{"validation": {"code": 0}, "paragList": []}]});
        assert!(matches!(
            classify_payload(other_code),
            FetchOutcome::Success(_)
        ));
    }

    #[test]
    fn test_classify_empty_payloads() {
        for empty in [json!(null), json!({}), json!([]), json!("")] {
            assert!(matches!(
                classify_payload(empty),
                FetchOutcome::TransientError(_)
            ));
        }
    }
}
