//! Target records and the registry that owns polling state

use std::collections::HashMap;

/// One board or thread being polled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Scheme-less API URI, unique per target
    pub request_uri: String,

    /// Board the target lives on
    pub board: String,

    /// False while the target is a board catalog
    pub is_thread: bool,

    /// Opaque marker handed back to the transport on the next fetch
    pub last_load: String,
}

impl Target {
    pub fn new(request_uri: impl Into<String>, board: impl Into<String>, is_thread: bool) -> Self {
        Self {
            request_uri: request_uri.into(),
            board: board.into(),
            is_thread,
            last_load: String::new(),
        }
    }
}

/// Mapping from request URI to tracked target
///
/// Every key equals the `request_uri` of the target stored under it.
#[derive(Debug, Default, Clone)]
pub struct TargetRegistry {
    targets: HashMap<String, Target>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a user-specified target; seeding an already tracked URI is a no-op
    pub fn seed(&mut self, request_uri: &str, board: &str, is_thread: bool) {
        self.targets
            .entry(request_uri.to_string())
            .or_insert_with(|| Target::new(request_uri, board, is_thread));
    }

    /// Records the marker of a successful fetch
    ///
    /// Returns false, and changes nothing, when the target is no longer tracked.
    pub fn record_success(&mut self, request_uri: &str, last_load: &str) -> bool {
        match self.targets.get_mut(request_uri) {
            Some(target) => {
                target.last_load = last_load.to_string();
                true
            }
            None => false,
        }
    }

    /// Replaces a catalog target with one thread target per discovered URI
    ///
    /// Threads that are already tracked keep their state. Returns how many new
    /// threads were added.
    pub fn expand_catalog<I, S>(&mut self, request_uri: &str, thread_uris: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let Some(catalog) = self.targets.remove(request_uri) else {
            return 0;
        };

        let mut added = 0;
        for uri in thread_uris {
            let uri = uri.into();
            if !self.targets.contains_key(&uri) {
                let target = Target::new(uri.clone(), catalog.board.clone(), true);
                self.targets.insert(uri, target);
                added += 1;
            }
        }
        added
    }

    /// Stops tracking a target; returns the removed record
    pub fn remove(&mut self, request_uri: &str) -> Option<Target> {
        self.targets.remove(request_uri)
    }

    /// True when every tracked target is resolved to a thread
    pub fn all_threaded(&self) -> bool {
        self.targets.values().all(|target| target.is_thread)
    }

    /// URIs and markers of every tracked target, detached from the registry
    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.targets
            .values()
            .map(|target| (target.request_uri.clone(), target.last_load.clone()))
            .collect()
    }

    pub fn get(&self, request_uri: &str) -> Option<&Target> {
        self.targets.get(request_uri)
    }

    pub fn contains(&self, request_uri: &str) -> bool {
        self.targets.contains_key(request_uri)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.targets.values()
    }
}

impl From<HashMap<String, Target>> for TargetRegistry {
    fn from(targets: HashMap<String, Target>) -> Self {
        let mut registry = Self::new();
        for target in targets.into_values() {
            registry.seed(&target.request_uri, &target.board, target.is_thread);
        }
        registry
    }
}
