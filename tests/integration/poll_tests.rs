//! Integration tests for the poll loop
//!
//! These tests drive complete poll runs, from raw target strings to archives
//! on disk, with a scripted transport standing in for the network.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use threadwatch::filter::FilterSet;
use threadwatch::output::{
    create_archive, resolve_output_path, ArchiveFormat, MemoryOutput, OutputMode, Sink,
    SqliteArchive,
};
use threadwatch::poller::{FetchOutcome, FetchResult, PollOptions, Poller, Transport};
use threadwatch::target::{resolve_targets, TargetRegistry};
use tokio_util::sync::CancellationToken;

/// Serves fixed bodies per URI and records every request
#[derive(Clone, Default)]
struct FixtureTransport {
    bodies: Arc<HashMap<String, String>>,
    requests: Arc<Mutex<Vec<(String, String)>>>,
    downloads: Arc<AtomicUsize>,
}

impl FixtureTransport {
    fn new(bodies: &[(&str, &str)]) -> Self {
        Self {
            bodies: Arc::new(
                bodies
                    .iter()
                    .map(|(uri, body)| (uri.to_string(), body.to_string()))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    fn requested(&self, uri: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| u == uri)
            .count()
    }
}

impl Transport for FixtureTransport {
    async fn fetch(&self, uri: &str, last_load: &str) -> FetchResult {
        self.requests
            .lock()
            .unwrap()
            .push((uri.to_string(), last_load.to_string()));

        let outcome = match self.bodies.get(uri) {
            Some(body) => FetchOutcome::Success {
                body: body.clone(),
                last_load: format!("loaded {}", uri),
            },
            None => FetchOutcome::HttpError { status_code: 404 },
        };
        FetchResult::new(uri, outcome)
    }

    async fn download_file(&self, _uri: &str, dir: &Path, filename: &str) -> bool {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        std::fs::write(dir.join(filename), b"file").is_ok()
    }
}

fn registry_for(targets: &[&str], imageboard: &str) -> TargetRegistry {
    let (targets, failed) = resolve_targets(targets, imageboard);
    assert!(failed.is_empty(), "unexpected invalid targets: {:?}", failed);
    TargetRegistry::from(targets)
}

const FOURCHAN_CATALOG: &str = r#"[
    {"page": 1, "threads": [{"no": 100}, {"no": 200}]},
    {"page": 2, "threads": [{"no": 300}]}
]"#;

const THREAD_100: &str = r#"{"posts": [
    {"no": 100, "resto": 0, "name": "Anonymous", "sub": "First", "com": "hello", "time": 1700000000,
     "tim": 1700000000001, "ext": ".jpg", "filename": "sunset"},
    {"no": 101, "resto": 100, "name": "Anonymous", "com": "reply", "time": 1700000060}
]}"#;

const THREAD_200: &str = r#"{"posts": [
    {"no": 200, "resto": 0, "name": "moot", "com": "second thread", "time": 1700000120,
     "tim": 1700000000002, "ext": ".png", "filename": "chart"}
]}"#;

#[tokio::test]
async fn test_board_archived_to_sqlite() {
    let transport = FixtureTransport::new(&[
        ("a.4cdn.org/g/threads.json", FOURCHAN_CATALOG),
        ("a.4cdn.org/g/100.json", THREAD_100),
        ("a.4cdn.org/g/200.json", THREAD_200),
    ]);

    let temp_dir = TempDir::new().unwrap();
    let path = resolve_output_path(temp_dir.path(), OutputMode::Archive, ArchiveFormat::Sqlite)
        .unwrap();
    let sink = create_archive(OutputMode::Archive, ArchiveFormat::Sqlite, &path).unwrap();

    let output = MemoryOutput::new();
    let registry = registry_for(&["/g/"], "4chan");
    let mut poller = Poller::new(transport.clone(), &output, "4chan", registry, sink).unwrap();
    let summary = poller.run(CancellationToken::new()).await;

    assert_eq!(summary.iterations, 2);
    assert_eq!(summary.posts_handled, 3);
    // thread 300 is listed but gone
    assert_eq!(summary.targets_dropped, 1);
    assert_eq!(output.errors(), vec!["a.4cdn.org/g/300.json does not exist."]);
    assert_eq!(transport.requested("a.4cdn.org/g/threads.json"), 1);
    drop(poller);

    let archive = SqliteArchive::new(&path).unwrap();
    assert_eq!(archive.count_posts().unwrap(), 3);
    assert_eq!(archive.count_thread_posts("4chan", "g", "100").unwrap(), 2);
}

#[tokio::test]
async fn test_threads_archived_to_plaintext() {
    let transport = FixtureTransport::new(&[
        ("a.4cdn.org/g/100.json", THREAD_100),
        ("a.4cdn.org/g/200.json", THREAD_200),
    ]);

    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("g.txt");
    let sink = create_archive(OutputMode::Archive, ArchiveFormat::Plaintext, &path).unwrap();

    let output = MemoryOutput::new();
    let registry = registry_for(&["g/100", "/g/200/", "g 100"], "4chan");
    assert_eq!(registry.len(), 2);

    let summary = Poller::new(transport, &output, "4chan", registry, sink)
        .unwrap()
        .run(CancellationToken::new())
        .await;

    assert_eq!(summary.iterations, 1);
    let archived = std::fs::read_to_string(&path).unwrap();
    assert_eq!(archived.matches("Post: ").count(), 3);
    assert!(archived.contains("Name: moot"));
    assert!(archived.contains("File: sunset.jpg"));
}

#[tokio::test]
async fn test_files_downloaded_once_with_filters() {
    let transport = FixtureTransport::new(&[
        ("a.4cdn.org/g/100.json", THREAD_100),
        ("a.4cdn.org/g/200.json", THREAD_200),
    ]);

    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("files");
    let dir =
        resolve_output_path(&dir, OutputMode::FileDownload, ArchiveFormat::Plaintext).unwrap();
    let sink = create_archive(OutputMode::FileDownload, ArchiveFormat::Plaintext, &dir).unwrap();
    assert!(matches!(sink, Sink::Download { .. }));

    let (filters, invalid) = FilterSet::compile(&["name:^moot$"], "4chan");
    assert!(invalid.is_empty());

    let output = MemoryOutput::new();
    let registry = registry_for(&["g/100", "g/200"], "4chan");
    let summary = Poller::new(transport.clone(), &output, "4chan", registry, sink)
        .unwrap()
        .with_filters(filters)
        .with_options(PollOptions::default().capped())
        .run(CancellationToken::new())
        .await;

    assert_eq!(summary.posts_handled, 2);
    assert_eq!(transport.downloads.load(Ordering::SeqCst), 1);
    assert!(dir.join("1700000000001_sunset.jpg").exists());
    assert!(!dir.join("1700000000002_chart.png").exists());
}

#[tokio::test]
async fn test_uploads_sharing_a_name_are_all_saved() {
    let thread = r#"{"posts": [
        {"no": 500, "resto": 0, "com": "op",
         "tim": 1700000000501, "ext": ".png", "filename": "image"},
        {"no": 501, "resto": 500, "com": "same name",
         "tim": 1700000000502, "ext": ".png", "filename": "image"}
    ]}"#;
    let transport = FixtureTransport::new(&[("a.4cdn.org/g/500.json", thread)]);

    let temp_dir = TempDir::new().unwrap();
    let sink = create_archive(OutputMode::FileDownload, ArchiveFormat::Plaintext, temp_dir.path())
        .unwrap();

    let output = MemoryOutput::new();
    let registry = registry_for(&["g/500"], "4chan");
    let summary = Poller::new(transport.clone(), &output, "4chan", registry, sink)
        .unwrap()
        .run(CancellationToken::new())
        .await;

    assert_eq!(summary.posts_handled, 2);
    assert_eq!(transport.downloads.load(Ordering::SeqCst), 2);
    assert!(temp_dir.path().join("1700000000501_image.png").exists());
    assert!(temp_dir.path().join("1700000000502_image.png").exists());
    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 2);
    assert!(output.errors().is_empty());
}

#[tokio::test]
async fn test_nested_imageboard_board_run() {
    let catalog = r#"[{"threadId": 40, "subject": "a"}]"#;
    let thread = r#"{
        "threadId": 40, "name": "Anon", "markdown": "op",
        "posts": [{"postId": 41, "name": "Anon", "markdown": "reply"}]
    }"#;
    let transport = FixtureTransport::new(&[
        ("endchan.xyz/pol/catalog.json", catalog),
        ("endchan.xyz/pol/40.json", thread),
    ]);

    let output = MemoryOutput::new();
    let registry = registry_for(&["pol"], "endchan");
    let sink = Sink::Sqlite(SqliteArchive::open_in_memory().unwrap());
    let mut poller = Poller::new(transport, &output, "endchan", registry, sink).unwrap();
    let summary = poller.run(CancellationToken::new()).await;

    assert_eq!(summary.iterations, 2);
    assert_eq!(summary.posts_handled, 2);
    assert!(poller.registry().contains("endchan.xyz/pol/40.json"));
    assert_eq!(
        poller.registry().get("endchan.xyz/pol/40.json").unwrap().last_load,
        "loaded endchan.xyz/pol/40.json"
    );
}

#[tokio::test]
async fn test_markers_flow_into_next_fetch() {
    let transport = FixtureTransport::new(&[("a.4cdn.org/g/100.json", THREAD_100)]);
    let token = CancellationToken::new();

    let output = MemoryOutput::new();
    let registry = registry_for(&["g/100"], "4chan");
    let sink = Sink::Sqlite(SqliteArchive::open_in_memory().unwrap());
    let options = PollOptions {
        continuous: true,
        max_connections: None,
        refresh_interval: std::time::Duration::from_millis(1),
    };
    let mut poller = Poller::new(transport.clone(), &output, "4chan", registry, sink)
        .unwrap()
        .with_options(options);

    let stopper = token.clone();
    let watched = transport.clone();
    tokio::spawn(async move {
        while watched.requested("a.4cdn.org/g/100.json") < 3 {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
        stopper.cancel();
    });
    let summary = poller.run(token).await;

    assert!(summary.cancelled);
    assert_eq!(summary.posts_handled, 2);
    let requests = transport.requests.lock().unwrap().clone();
    assert_eq!(requests[0].1, "");
    assert_eq!(requests[1].1, "loaded a.4cdn.org/g/100.json");
}
