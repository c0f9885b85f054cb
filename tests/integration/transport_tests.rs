//! Integration tests for the HTTP transport
//!
//! These tests run the reqwest-backed transport against a wiremock server and
//! check how responses map onto fetch outcomes.

use tempfile::TempDir;
use threadwatch::output::{create_archive, ArchiveFormat, MemoryOutput, OutputMode};
use threadwatch::poller::{FetchOutcome, HttpTransport, Poller, Transport};
use threadwatch::target::TargetRegistry;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LAST_MODIFIED: &str = "Mon, 01 Jan 2024 00:00:00 GMT";

/// Scheme-less URI of a path on the mock server
fn uri_for(server: &MockServer, path: &str) -> String {
    format!("{}{}", server.address(), path)
}

fn transport() -> HttpTransport {
    HttpTransport::new(false).expect("Failed to build HTTP client")
}

#[tokio::test]
async fn test_success_returns_body_and_marker() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/b/1.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"posts": []}"#)
                .insert_header("Last-Modified", LAST_MODIFIED),
        )
        .mount(&mock_server)
        .await;

    let uri = uri_for(&mock_server, "/b/1.json");
    let result = transport().fetch(&uri, "").await;

    assert_eq!(result.uri, uri);
    assert_eq!(
        result.outcome,
        FetchOutcome::Success {
            body: r#"{"posts": []}"#.to_string(),
            last_load: LAST_MODIFIED.to_string(),
        }
    );
}

#[tokio::test]
async fn test_marker_is_sent_back() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/b/1.json"))
        .and(header("If-Modified-Since", "opaque-marker"))
        .respond_with(ResponseTemplate::new(304))
        .expect(1)
        .mount(&mock_server)
        .await;

    // the marker is opaque; the transport echoes it unchanged
    let result = transport()
        .fetch(&uri_for(&mock_server, "/b/1.json"), "opaque-marker")
        .await;

    assert_eq!(result.outcome, FetchOutcome::NotModified);
}

#[tokio::test]
async fn test_missing_header_keeps_old_marker() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/b/1.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&mock_server)
        .await;

    let result = transport()
        .fetch(&uri_for(&mock_server, "/b/1.json"), "previous")
        .await;

    assert!(matches!(
        result.outcome,
        FetchOutcome::Success { last_load, .. } if last_load == "previous"
    ));
}

#[tokio::test]
async fn test_error_statuses() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/b/500.json"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let transport = transport();
    let missing = transport.fetch(&uri_for(&mock_server, "/b/404.json"), "").await;
    let broken = transport.fetch(&uri_for(&mock_server, "/b/500.json"), "").await;

    assert_eq!(missing.outcome, FetchOutcome::HttpError { status_code: 404 });
    assert_eq!(broken.outcome, FetchOutcome::HttpError { status_code: 500 });
}

#[tokio::test]
async fn test_download_file() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/b/1000.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x89, b'P', b'N', b'G']))
        .expect(1)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let transport = transport();
    let uri = uri_for(&mock_server, "/b/1000.png");

    assert!(transport.download_file(&uri, temp_dir.path(), "cat.png").await);
    let saved = std::fs::read(temp_dir.path().join("cat.png")).unwrap();
    assert_eq!(saved, vec![0x89, b'P', b'N', b'G']);
    // only the finished file is left behind
    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);

    // already on disk, no second request
    assert!(transport.download_file(&uri, temp_dir.path(), "cat.png").await);
}

#[tokio::test]
async fn test_failed_download_leaves_no_file() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    let ok = transport()
        .download_file(&uri_for(&mock_server, "/b/gone.png"), temp_dir.path(), "gone.png")
        .await;

    assert!(!ok);
    assert!(!temp_dir.path().join("gone.png").exists());
    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_poll_thread_over_http() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/b/100.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(
                    r#"{"posts": [
                        {"no": 100, "resto": 0, "sub": "Cats", "com": "first<br>post", "time": 1700000000},
                        {"no": 101, "resto": 100, "com": "reply", "time": 1700000100}
                    ]}"#,
                )
                .insert_header("Last-Modified", LAST_MODIFIED),
        )
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let archive_path = temp_dir.path().join("archive.txt");
    let sink =
        create_archive(OutputMode::Archive, ArchiveFormat::Plaintext, &archive_path).unwrap();

    let uri = uri_for(&mock_server, "/b/100.json");
    let mut registry = TargetRegistry::new();
    registry.seed(&uri, "b", true);

    let output = MemoryOutput::new();
    let mut poller = Poller::new(transport(), &output, "4chan", registry, sink).unwrap();
    let summary = poller.run(CancellationToken::new()).await;

    assert_eq!(summary.iterations, 1);
    assert_eq!(summary.posts_handled, 2);
    assert_eq!(poller.registry().get(&uri).unwrap().last_load, LAST_MODIFIED);
    assert!(output.errors().is_empty());

    let archived = std::fs::read_to_string(&archive_path).unwrap();
    assert!(archived.contains("Post: 100 (thread 100, 4chan)"));
    assert!(archived.contains("Subject: Cats"));
    assert!(archived.contains("first\npost"));
    assert!(archived.contains("Post: 101 (thread 100, 4chan)"));
}
