//! Run-scoped record of posts that already reached a sink

use crate::imageboard::Post;
use std::collections::HashSet;

/// Append-only set of `(board, post id)` pairs
///
/// Never persisted; a fresh run starts empty.
#[derive(Debug, Default, Clone)]
pub struct PostCache {
    seen: HashSet<(String, String)>,
}

impl PostCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps only the posts not seen before, and marks them as seen
    pub fn retain_unseen(&mut self, board: &str, posts: Vec<Post>) -> Vec<Post> {
        posts
            .into_iter()
            .filter(|post| self.seen.insert((board.to_string(), post.id.clone())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
