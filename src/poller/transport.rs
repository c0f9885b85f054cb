//! HTTP transport
//!
//! This module handles every network request the poller makes:
//! - Building the HTTP client with the crate's user agent and timeouts
//! - Conditional GETs for catalogs and threads (`If-Modified-Since`)
//! - File downloads for the download sink
//! - Classifying failures into the outcomes the poll loop acts on

use reqwest::header::{IF_MODIFIED_SINCE, LAST_MODIFIED};
use reqwest::{Client, Response, StatusCode};
use std::error::Error as StdError;
use std::ffi::OsStr;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use url::Url;

/// Result of fetching one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    /// The scheme-less request URI this result belongs to
    pub uri: String,

    pub outcome: FetchOutcome,
}

/// What happened to a fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The body was fetched
    Success {
        /// Response body
        body: String,
        /// Marker to send with the next fetch of the same target
        last_load: String,
    },

    /// Nothing changed since the last fetch (HTTP 304)
    NotModified,

    /// The server answered with an error status
    HttpError {
        /// The HTTP status code
        status_code: u16,
    },

    /// TLS handshake or certificate failure
    Tls {
        /// Error description
        error: String,
    },

    /// Connection refused, DNS failure, timeout and similar
    Network {
        /// Error description
        error: String,
    },
}

impl FetchResult {
    pub fn new(uri: impl Into<String>, outcome: FetchOutcome) -> Self {
        Self {
            uri: uri.into(),
            outcome,
        }
    }
}

/// Network collaborator used by the poll loop
///
/// URIs are scheme-less (`host/board/123.json`); the transport decides on
/// `http` or `https`.
pub trait Transport: Send + Sync + Clone + 'static {
    /// Fetches a target, sending `last_load` back as a freshness marker
    fn fetch(&self, uri: &str, last_load: &str) -> impl Future<Output = FetchResult> + Send;

    /// Downloads a file into `dir/filename`; returns whether the file is there
    ///
    /// An existing `dir/filename` counts as downloaded, so callers pick names
    /// that are unique per file.
    fn download_file(
        &self,
        uri: &str,
        dir: &Path,
        filename: &str,
    ) -> impl Future<Output = bool> + Send;
}

/// Builds the HTTP client used for API requests and downloads
///
/// # Example
///
/// ```
/// use threadwatch::poller::build_http_client;
///
/// let client = build_http_client().unwrap();
/// ```
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    let user_agent = format!("threadwatch/{}", env!("CARGO_PKG_VERSION"));

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// reqwest-backed [`Transport`]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    ssl: bool,
}

impl HttpTransport {
    pub fn new(ssl: bool) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(build_http_client()?, ssl))
    }

    pub fn with_client(client: Client, ssl: bool) -> Self {
        Self { client, ssl }
    }

    /// Prefixes a scheme-less URI with `http://` or `https://`
    pub fn url_for(&self, uri: &str) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        format!("{}://{}", scheme, uri)
    }
}

impl Transport for HttpTransport {
    async fn fetch(&self, uri: &str, last_load: &str) -> FetchResult {
        let mut request = self.client.get(self.url_for(uri));
        if !last_load.is_empty() {
            request = request.header(IF_MODIFIED_SINCE, last_load);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return FetchResult::new(uri, classify_error(&e)),
        };

        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            return FetchResult::new(uri, FetchOutcome::NotModified);
        }
        if !status.is_success() {
            return FetchResult::new(
                uri,
                FetchOutcome::HttpError {
                    status_code: status.as_u16(),
                },
            );
        }

        // Keep the old marker when the server sends none
        let marker = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(last_load)
            .to_string();

        match response.text().await {
            Ok(body) => FetchResult::new(
                uri,
                FetchOutcome::Success {
                    body,
                    last_load: marker,
                },
            ),
            Err(e) => FetchResult::new(uri, classify_error(&e)),
        }
    }

    async fn download_file(&self, uri: &str, dir: &Path, filename: &str) -> bool {
        // only plain file names may land in the download directory
        if Path::new(filename).file_name() != Some(OsStr::new(filename)) {
            tracing::debug!("Refusing to save {:?} outside the download dir", filename);
            return false;
        }

        let url = match Url::parse(&self.url_for(uri)) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("Invalid file URL {}: {}", uri, e);
                return false;
            }
        };

        let destination = dir.join(filename);
        if destination.exists() {
            tracing::debug!("{} already exists, skipping", destination.display());
            return true;
        }

        let response = match self.client.get(url).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::debug!("Download of {} failed with HTTP {}", uri, response.status());
                return false;
            }
            Err(e) => {
                tracing::debug!("Download of {} failed: {}", uri, e);
                return false;
            }
        };

        // a dropped or failed download never leaves a file under the final name
        let partial = dir.join(format!(".{}.part", filename));
        if let Err(e) = write_body(response, &partial).await {
            tracing::debug!("Download of {} was cut short: {}", uri, e);
            let _ = tokio::fs::remove_file(&partial).await;
            return false;
        }

        match tokio::fs::rename(&partial, &destination).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("Could not write {}: {}", destination.display(), e);
                false
            }
        }
    }
}

/// Streams a response body into `path`, chunk by chunk
async fn write_body(mut response: Response, path: &Path) -> anyhow::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(())
}

/// Maps a reqwest error to a fetch outcome
///
/// | Condition | Outcome |
/// |-----------|---------|
/// | TLS/SSL/certificate failure anywhere in the source chain | `Tls` |
/// | Timeout | `Network` |
/// | Connection refused, DNS | `Network` |
/// | Anything else | `Network` |
fn classify_error(error: &reqwest::Error) -> FetchOutcome {
    if is_tls_error(error) {
        return FetchOutcome::Tls {
            error: error.to_string(),
        };
    }

    let error = if error.is_timeout() {
        "Request timeout".to_string()
    } else if error.is_connect() {
        format!("Connection failed: {}", error)
    } else {
        error.to_string()
    };
    FetchOutcome::Network { error }
}

/// Looks for TLS failures below the top-level error, whose text includes the URL
fn is_tls_error(error: &reqwest::Error) -> bool {
    let mut source = error.source();
    while let Some(err) = source {
        let message = err.to_string().to_lowercase();
        if message.contains("certificate") || message.contains("tls") || message.contains("ssl") {
            return true;
        }
        source = err.source();
    }
    false
}
