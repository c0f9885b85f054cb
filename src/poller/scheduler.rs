//! Fetch scheduling
//!
//! Builds one fetch task per tracked target and optionally gates them behind a
//! counting semaphore, so that no more than a fixed number of connections are
//! open at once. Tasks finish independently and are drained in completion
//! order.

use crate::poller::transport::{FetchResult, Transport};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Connection cap applied when capping is enabled
pub const MAX_CONNECTIONS: usize = 8;

/// Spawns one fetch per `(uri, last_load)` pair
///
/// With `max_connections` set, each fetch waits for a permit before it touches
/// the network. The set aborts every unfinished fetch when dropped.
///
/// # Arguments
///
/// * `transport` - The transport to fetch with (cloned into every task)
/// * `snapshot` - URIs and markers, detached from the registry
/// * `max_connections` - Upper bound on in-flight fetches, if any
pub fn build_operations<T: Transport>(
    transport: &T,
    snapshot: Vec<(String, String)>,
    max_connections: Option<usize>,
) -> JoinSet<FetchResult> {
    let limit = max_connections.map(|n| Arc::new(Semaphore::new(n.max(1))));
    let mut operations = JoinSet::new();

    for (uri, last_load) in snapshot {
        let transport = transport.clone();
        let limit = limit.clone();
        operations.spawn(async move {
            let _permit = match limit {
                Some(limit) => limit.acquire_owned().await.ok(),
                None => None,
            };
            transport.fetch(&uri, &last_load).await
        });
    }

    operations
}
