//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for the page API and run the full
//! harvest cycle end-to-end against file storage in a temp directory.

use corpus_harvest::config::{parse_config, Config};
use corpus_harvest::crawler::harvest;
use corpus_harvest::extract::{extract_records, ExtractRules};
use corpus_harvest::output::{export_documents, BulkFileSink};
use corpus_harvest::storage::{FileStorage, PageStore, ProgressStore};
use corpus_harvest::translate::{translate_records, PassthroughTranslator};
use corpus_harvest::{Coordinate, HarvestStop, RunStatus, StopReason};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::watch;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_PATH: &str = "/api/book/getBookPageContent";

/// Creates a test configuration pointing at the mock server, with no backoff
fn create_test_config(server: &MockServer, dir: &TempDir, extra_api: &str) -> Config {
    let toml = format!(
        r#"
[api]
base-url = "{uri}{path}"
book-id = 126314
{extra_api}

[retry]
max-attempts = 3
base-delay-ms = 0
rate-limit-delay-ms = 0

[storage]
backend = "files"
data-dir = "{data}"
state-dir = "{state}"
"#,
        uri = server.uri(),
        path = API_PATH,
        extra_api = extra_api,
        data = dir.path().join("pages").display(),
        state = dir.path().join("state").display(),
    );
    parse_config(&toml).expect("test config should be valid")
}

fn c(v: u32, s: u32, p: u32) -> Coordinate {
    Coordinate::new(v, s, p).unwrap()
}

fn at(coordinate: Coordinate) -> Value {
    json!({
        "bookId": 126314,
        "volumeNumber": coordinate.volume,
        "sectionNumber": coordinate.section,
        "pageNumber": coordinate.page
    })
}

fn page_body(html: &str) -> Value {
    json!({ "data": [{ "validation": { "code": 0 }, "paragList": [{ "text": html }] }] })
}

fn validation(code: i64) -> Value {
    json!({ "data": [{ "validation": { "code": code } }] })
}

async fn mount_page(server: &MockServer, coordinate: Coordinate, html: &str) {
    Mock::given(method("POST"))
        .and(path(API_PATH))
        .and(body_partial_json(at(coordinate)))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(html)))
        .mount(server)
        .await;
}

/// Everything not mounted before this is reported as missing
async fn mount_not_found_fallback(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(validation(2)))
        .mount(server)
        .await;
}

fn open_files(dir: &TempDir) -> FileStorage {
    FileStorage::open(&dir.path().join("pages"), &dir.path().join("state")).unwrap()
}

fn no_shutdown() -> watch::Receiver<bool> {
    watch::channel(false).1
}

#[tokio::test]
async fn test_full_book_harvest() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page(&server, c(1, 1, 1), "<p><heading>باب</heading></p>").await;
    mount_page(
        &server,
        c(1, 1, 2),
        r#"<p id="a"><format class="hadith" revayatindex="1">قَالَ</format></p>"#,
    )
    .await;
    mount_page(
        &server,
        c(1, 2, 1),
        r#"<p><format class="hadith" revayatindex="2">ثانی</format></p>"#,
    )
    .await;
    mount_page(
        &server,
        c(2, 1, 1),
        r#"<p><format class="hadith" revayatindex="3">ثالث</format></p>"#,
    )
    .await;
    mount_not_found_fallback(&server).await;

    let config = create_test_config(&server, &dir, "");
    let report = harvest(&config, "hash", no_shutdown()).await.unwrap();

    assert_eq!(report.stop, HarvestStop::Stopped(StopReason::BookComplete));
    assert_eq!(report.pages_stored, 4);
    assert!(report.gaps.is_empty());

    let storage = open_files(&dir);
    assert_eq!(
        storage.list_pages().unwrap(),
        vec![c(1, 1, 1), c(1, 1, 2), c(1, 2, 1), c(2, 1, 1)]
    );
    assert!(dir
        .path()
        .join("pages/volume_1/section_2/page_1.json")
        .exists());
    assert_eq!(
        storage.last_run().unwrap().unwrap().status,
        RunStatus::BookComplete
    );

    // The stored payload is the API response as-is
    let stored = storage.load_page(c(1, 1, 2)).unwrap().unwrap();
    assert_eq!(stored["data"][0]["validation"]["code"], 0);
}

#[tokio::test]
async fn test_quota_stop_then_resume() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page(&server, c(1, 1, 1), "<p>one</p>").await;
    Mock::given(method("POST"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(validation(14)))
        .mount(&server)
        .await;

    let config = create_test_config(&server, &dir, "");
    let report = harvest(&config, "hash", no_shutdown()).await.unwrap();

    assert_eq!(report.stop, HarvestStop::Stopped(StopReason::QuotaExhausted));
    assert_eq!(report.checkpoint, c(1, 1, 2));
    assert_eq!(open_files(&dir).load_progress().unwrap(), Some(c(1, 1, 2)));
    assert_eq!(
        open_files(&dir).last_run().unwrap().unwrap().status,
        RunStatus::QuotaExhausted
    );

    // Credit topped up: the next run picks up exactly at the checkpoint
    server.reset().await;
    mount_page(&server, c(1, 1, 2), "<p>two</p>").await;
    mount_not_found_fallback(&server).await;

    let report = harvest(&config, "hash", no_shutdown()).await.unwrap();

    assert_eq!(report.started_at, c(1, 1, 2));
    assert_eq!(report.pages_stored, 1);
    assert_eq!(report.stop, HarvestStop::Stopped(StopReason::BookComplete));

    let requests = server.received_requests().await.unwrap();
    let first: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(first["pageNumber"], 2);
    assert_eq!(open_files(&dir).list_pages().unwrap().len(), 2);
}

#[tokio::test]
async fn test_rate_limited_page_is_skipped_as_gap() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page(&server, c(1, 1, 1), "<p>one</p>").await;
    Mock::given(method("POST"))
        .and(path(API_PATH))
        .and(body_partial_json(at(c(1, 1, 2))))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;
    mount_not_found_fallback(&server).await;

    let config = create_test_config(&server, &dir, "");
    let report = harvest(&config, "hash", no_shutdown()).await.unwrap();

    assert_eq!(report.stop, HarvestStop::Stopped(StopReason::BookComplete));
    assert_eq!(report.gaps.len(), 1);
    assert_eq!(report.gaps[0].coordinate, c(1, 1, 2));
    assert_eq!(report.gaps[0].attempts, 3);

    let storage = open_files(&dir);
    assert_eq!(storage.gaps().unwrap(), report.gaps);
    assert_eq!(storage.list_pages().unwrap(), vec![c(1, 1, 1)]);
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path(API_PATH))
        .and(body_partial_json(at(c(1, 1, 1))))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_page(&server, c(1, 1, 1), "<p>one</p>").await;
    mount_not_found_fallback(&server).await;

    let config = create_test_config(&server, &dir, "");
    let report = harvest(&config, "hash", no_shutdown()).await.unwrap();

    assert_eq!(report.pages_stored, 1);
    assert!(report.gaps.is_empty());
}

#[tokio::test]
async fn test_bearer_token_is_sent() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path(API_PATH))
        .and(header("authorization", "Bearer secret-token"))
        .and(body_partial_json(at(c(1, 1, 1))))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body("<p>x</p>")))
        .mount(&server)
        .await;
    mount_not_found_fallback(&server).await;

    let config = create_test_config(&server, &dir, r#"auth-token = "secret-token""#);
    let report = harvest(&config, "hash", no_shutdown()).await.unwrap();

    assert_eq!(report.pages_stored, 1);
}

#[tokio::test]
async fn test_harvest_to_bulk_export() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page(
        &server,
        c(1, 1, 1),
        r#"<p><heading>باب</heading></p>"#,
    )
    .await;
    mount_page(
        &server,
        c(1, 1, 2),
        r#"<p><format class="hadith" revayatindex="9">أَوَّلُ</format></p>"#,
    )
    .await;
    mount_page(
        &server,
        c(1, 1, 3),
        r#"<p><format class="hadith" revayatindex="9">آخِرُ</format></p>"#,
    )
    .await;
    mount_not_found_fallback(&server).await;

    let config = create_test_config(&server, &dir, "");
    harvest(&config, "hash", no_shutdown()).await.unwrap();

    let rules = ExtractRules::from_config(&config.extract).unwrap();
    let records = extract_records(&open_files(&dir), &rules).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title, "باب");
    assert_eq!(records[0].content, "أَوَّلُ\nآخِرُ");

    let translated_path = dir.path().join("translated.json");
    translate_records(&records, &PassthroughTranslator, &translated_path, 10)
        .await
        .unwrap();
    let translated = corpus_harvest::translate::read_translated(&translated_path).unwrap();

    let mut sink = BulkFileSink::new(Vec::new(), "corpus");
    export_documents(&translated, &mut sink, "doc", "Book", 100).unwrap();
    let output = String::from_utf8(sink.into_inner()).unwrap();
    let lines: Vec<Value> = output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1]["text_plain"], "أول\nآخر");
    assert_eq!(lines[1]["book"]["page_no"], 2);
}
