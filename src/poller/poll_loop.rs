//! Poll loop
//!
//! Each iteration snapshots the target registry, fetches every target, then
//! applies the results to the registry one completion at a time:
//!
//! 1. **Dispatch**: build one fetch operation per tracked target
//! 2. **Drain**: handle results in arrival order; catalogs expand into thread
//!    targets, thread bodies become posts for the sink, failures drop the target
//! 3. **Decide**: keep going (continuous mode), stop once every target is a
//!    thread that has been fetched, or stop after the second iteration
//!
//! Only the task running the loop touches the registry and the post cache.

use crate::config::Config;
use crate::filter::FilterSet;
use crate::imageboard::{parse_posts, parse_thread_ids, schema_for, ImageboardSchema, Post};
use crate::output::{archive_plaintext, Output, Sink};
use crate::poller::cache::PostCache;
use crate::poller::scheduler::{build_operations, MAX_CONNECTIONS};
use crate::poller::transport::{FetchOutcome, FetchResult, Transport};
use crate::target::{build_request_uri, TargetRegistry, ThreadRef};
use crate::ChanError;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default pause between iterations in continuous mode
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// How a poll run behaves
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOptions {
    /// Keep polling until cancelled
    pub continuous: bool,

    /// Upper bound on concurrent fetches, if any
    pub max_connections: Option<usize>,

    /// Pause between iterations in continuous mode
    pub refresh_interval: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            continuous: false,
            max_connections: None,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}

impl PollOptions {
    pub fn from_config(config: &Config) -> Self {
        let poller = &config.poller;
        Self {
            continuous: poller.continuous,
            max_connections: poller.cap_connections.then_some(poller.max_connections),
            refresh_interval: Duration::from_secs(poller.refresh_interval),
        }
    }

    /// Caps connections at [`MAX_CONNECTIONS`]
    pub fn capped(mut self) -> Self {
        self.max_connections = Some(MAX_CONNECTIONS);
        self
    }
}

/// What a finished (or cancelled) run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub iterations: u32,

    /// Posts handed to the sink
    pub posts_handled: usize,

    /// Targets removed because of errors
    pub targets_dropped: usize,

    pub cancelled: bool,
}

/// Drives the polling of every tracked target
pub struct Poller<T: Transport, O: Output> {
    transport: T,
    output: O,
    schema: &'static ImageboardSchema,
    registry: TargetRegistry,
    sink: Sink,
    filters: FilterSet,
    cache: PostCache,
    options: PollOptions,
    summary: PollSummary,
}

impl<T: Transport, O: Output> Poller<T, O> {
    /// Creates a poller for one imageboard
    ///
    /// # Errors
    ///
    /// Returns `ChanError::UnknownImageboard` if the imageboard has no schema.
    pub fn new(
        transport: T,
        output: O,
        imageboard: &str,
        registry: TargetRegistry,
        sink: Sink,
    ) -> Result<Self, ChanError> {
        let schema = schema_for(imageboard)
            .ok_or_else(|| ChanError::UnknownImageboard(imageboard.to_string()))?;

        Ok(Self {
            transport,
            output,
            schema,
            registry,
            sink,
            filters: FilterSet::default(),
            cache: PostCache::new(),
            options: PollOptions::default(),
            summary: PollSummary::default(),
        })
    }

    pub fn with_filters(mut self, filters: FilterSet) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_options(mut self, options: PollOptions) -> Self {
        self.options = options;
        self
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    /// Gives the sink back, e.g. to close out a SQLite run record
    pub fn into_sink(self) -> Sink {
        self.sink
    }

    /// Polls until the run is done or `cancel` fires
    pub async fn run(&mut self, cancel: CancellationToken) -> PollSummary {
        self.output.write_debug("Entering the main loop.");

        let mut iteration: u32 = 0;
        loop {
            iteration += 1;
            self.summary.iterations = iteration;
            self.output.write_debug(&format!("Starting iteration {}.", iteration));

            let Some(expanded) = self.run_iteration(&cancel).await else {
                self.summary.cancelled = true;
                break;
            };

            if self.options.continuous {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        self.summary.cancelled = true;
                        break;
                    }
                    _ = tokio::time::sleep(self.options.refresh_interval) => {}
                }
            } else if expanded == 0 && self.registry.all_threaded() {
                break;
            } else if iteration > 1 {
                break;
            }
        }

        tracing::debug!(
            "Poll run finished after {} iterations ({} posts, {} targets dropped)",
            self.summary.iterations,
            self.summary.posts_handled,
            self.summary.targets_dropped
        );
        self.summary.clone()
    }

    /// Runs one Dispatch and Drain
    ///
    /// Returns how many catalogs were expanded, or `None` if cancelled midway.
    async fn run_iteration(&mut self, cancel: &CancellationToken) -> Option<usize> {
        let snapshot = self.registry.snapshot();
        let mut operations =
            build_operations(&self.transport, snapshot, self.options.max_connections);
        let mut expanded = 0;

        loop {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    operations.abort_all();
                    return None;
                }
                joined = operations.join_next() => joined,
            };

            match joined {
                None => return Some(expanded),
                Some(Ok(result)) => {
                    if self.handle_result(result, cancel).await {
                        expanded += 1;
                    }
                }
                Some(Err(e)) => tracing::warn!("Fetch task ended abnormally: {}", e),
            }
        }
    }

    /// Applies one fetch result; returns true if a catalog was expanded
    async fn handle_result(&mut self, result: FetchResult, cancel: &CancellationToken) -> bool {
        let FetchResult { uri, outcome } = result;

        let (body, last_load) = match outcome {
            FetchOutcome::Success { body, last_load } => (body, last_load),
            FetchOutcome::NotModified => {
                self.output.write_debug(&format!("{} has not changed.", uri));
                return false;
            }
            failure => {
                let message = failure_message(&uri, &failure);
                if let FetchOutcome::Tls { error } | FetchOutcome::Network { error } = &failure {
                    tracing::debug!("{}: {}", uri, error);
                }
                self.drop_target(&uri, &message);
                return false;
            }
        };

        let Some(target) = self.registry.get(&uri) else {
            return false;
        };
        let board = target.board.clone();
        let is_thread = target.is_thread;
        self.output.write_debug(&format!("Connection made to {}...", uri));

        if is_thread {
            self.handle_thread(&uri, &board, &body, &last_load, cancel).await;
            false
        } else {
            self.handle_catalog(&uri, &board, &body)
        }
    }

    fn handle_catalog(&mut self, uri: &str, board: &str, body: &str) -> bool {
        let ids = match parse_thread_ids(body, self.schema) {
            Ok(ids) => ids,
            Err(e) => {
                self.drop_target(uri, &format!("Could not read the catalog at {}: {}", uri, e));
                return false;
            }
        };

        let thread_uris: Vec<String> = ids
            .into_iter()
            .filter_map(|id| build_request_uri(board, &ThreadRef::Thread(id), self.schema.name))
            .collect();
        let found = thread_uris.len();
        let added = self.registry.expand_catalog(uri, thread_uris);
        self.output.write_debug(&format!(
            "Found {} threads on /{}/ ({} new).",
            found, board, added
        ));
        true
    }

    async fn handle_thread(
        &mut self,
        uri: &str,
        board: &str,
        body: &str,
        last_load: &str,
        cancel: &CancellationToken,
    ) {
        let posts = match parse_posts(body, board, self.schema) {
            Ok(posts) => posts,
            Err(e) => {
                self.drop_target(uri, &format!("Could not read the thread at {}: {}", uri, e));
                return;
            }
        };

        let posts = self.filters.apply(posts);
        let posts = self.cache.retain_unseen(board, posts);
        if posts.is_empty() {
            self.output.write_debug(&format!("No new posts in {}.", uri));
        } else if self.dispatch(board, &posts, cancel).await {
            self.summary.posts_handled += posts.len();
        } else {
            // the marker stays put so the next run fetches this thread again
            self.output.write_debug(&format!("Interrupted while handling {}.", uri));
            return;
        }

        self.registry.record_success(uri, last_load);
    }

    /// Hands new posts to the sink
    ///
    /// Returns false if `cancel` fired before every file was downloaded.
    async fn dispatch(&mut self, board: &str, posts: &[Post], cancel: &CancellationToken) -> bool {
        let link = match posts.first() {
            Some(post) => self.schema.thread_link(board, &post.thread),
            None => return true,
        };

        match &mut self.sink {
            Sink::Download { dir } => {
                for file in posts.iter().flat_map(|post| post.files.iter()) {
                    let name = file.local_name();
                    self.output
                        .write_debug(&format!("File {} found at {}.", file.filename, file.uri));
                    self.output.write(&format!("Downloading \"{}\"...", name));

                    let download = self.transport.download_file(&file.uri, dir, &name);
                    let downloaded = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return false,
                        downloaded = download => downloaded,
                    };
                    if downloaded {
                        self.output.write(&format!("Downloaded {}.", name));
                    } else {
                        self.output.write_error(&format!("Could not download {}.", name));
                    }
                }
            }
            Sink::Plaintext { path } => {
                self.output.write(&format!("Archiving {}...", link));
                match archive_plaintext(posts, path, self.schema.name) {
                    Ok(()) => self.output.write("Archiving successful."),
                    Err(e) => self.output.write_error(&format!("Could not archive {link}: {e}")),
                }
            }
            Sink::Sqlite(archive) => {
                self.output.write(&format!("Archiving {}...", link));
                match archive.archive(posts, board, self.schema.name) {
                    Ok(added) => {
                        self.output.write_debug(&format!("{} posts stored.", added));
                        self.output.write("Archiving successful.");
                    }
                    Err(e) => self.output.write_error(&format!("Could not archive {link}: {e}")),
                }
            }
        }
        true
    }

    /// Reports a failure once and stops tracking the target
    fn drop_target(&mut self, uri: &str, message: &str) {
        if self.registry.remove(uri).is_some() {
            self.output.write_error(message);
            self.summary.targets_dropped += 1;
        }
    }
}

/// User-facing diagnostic for a failed fetch
fn failure_message(uri: &str, outcome: &FetchOutcome) -> String {
    match outcome {
        FetchOutcome::Tls { .. } => "The imageboard may require an SSL connection - run \
                                     threadwatch with the '--ssl' flag."
            .to_string(),
        FetchOutcome::Network { .. } => "Could not reach the imageboard. Are you sure you have a \
                                         working internet connection right now? If so, check \
                                         to see if the imageboard is online."
            .to_string(),
        FetchOutcome::HttpError { status_code: 404 } => format!("{} does not exist.", uri),
        _ => "Could not connect to imageboard.".to_string(),
    }
}

/// Fetches every target once and reports whether it can be reached
///
/// Used when no output mode is selected. Returns how many targets answered.
pub async fn check_connections<T: Transport, O: Output>(
    transport: &T,
    output: &O,
    registry: &TargetRegistry,
    max_connections: Option<usize>,
    cancel: &CancellationToken,
) -> usize {
    let mut operations = build_operations(transport, registry.snapshot(), max_connections);
    let mut reachable = 0;

    loop {
        let joined = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                operations.abort_all();
                break;
            }
            joined = operations.join_next() => joined,
        };

        match joined {
            None => break,
            Some(Ok(FetchResult { uri, outcome })) => match outcome {
                FetchOutcome::Success { .. } | FetchOutcome::NotModified => {
                    reachable += 1;
                    output.write(&format!("Connection made to {}.", uri));
                }
                failure => output.write_error(&failure_message(&uri, &failure)),
            },
            Some(Err(e)) => tracing::warn!("Fetch task ended abnormally: {}", e),
        }
    }

    reachable
}
