//! Polling engine
//!
//! This module contains the machinery that keeps tracked targets up to date:
//! - `transport`: HTTP fetching and file downloads
//! - `scheduler`: per-iteration fetch tasks with an optional connection cap
//! - `cache`: posts already handed to a sink during this run
//! - `poll_loop`: the iteration state machine that ties everything together

mod cache;
mod poll_loop;
mod scheduler;
mod transport;

pub use cache::PostCache;
pub use poll_loop::{
    check_connections, PollOptions, PollSummary, Poller, DEFAULT_REFRESH_INTERVAL,
};
pub use scheduler::{build_operations, MAX_CONNECTIONS};
pub use transport::{build_http_client, FetchOutcome, FetchResult, HttpTransport, Transport};
