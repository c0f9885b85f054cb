//! Target string parsing and request URI construction

use crate::imageboard::schema_for;
use crate::target::registry::Target;
use crate::TargetError;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// What part of a board a target points at
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ThreadRef {
    /// One specific thread, by id
    Thread(String),

    /// The whole board, read through its catalog
    Catalog,
}

impl ThreadRef {
    pub fn is_thread(&self) -> bool {
        matches!(self, Self::Thread(_))
    }
}

fn board_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^\s/]+").expect("board pattern is valid"))
}

fn thread_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^\s/][/ ](\d+)").expect("thread pattern is valid"))
}

/// Percent-escapes everything except unreserved characters, `/` and spaces
fn normalize(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    let mut buf = [0u8; 4];
    for c in raw.chars() {
        if c == '/' || c == ' ' {
            escaped.push(c);
        } else {
            escaped.push_str(&urlencoding::encode(c.encode_utf8(&mut buf)));
        }
    }
    escaped.trim().to_string()
}

/// Splits a target string into a board and a thread reference
///
/// The board is the first run of characters that are neither whitespace nor
/// `/`. A thread id is a run of digits directly after a board-like character
/// and a `/` or space separator. Targets without one denote the whole board.
///
/// # Example
///
/// ```
/// use threadwatch::target::{parse_target, ThreadRef};
///
/// assert_eq!(
///     parse_target("/g/123456/").unwrap(),
///     ("g".to_string(), ThreadRef::Thread("123456".to_string()))
/// );
/// assert_eq!(parse_target("g").unwrap(), ("g".to_string(), ThreadRef::Catalog));
/// assert!(parse_target("  ").is_err());
/// ```
pub fn parse_target(raw: &str) -> Result<(String, ThreadRef), TargetError> {
    let target = normalize(raw);

    let board = board_pattern()
        .find(&target)
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| TargetError::Empty(raw.to_string()))?;

    let thread = thread_pattern()
        .captures(&target)
        .and_then(|captures| captures.get(1))
        .map(|m| ThreadRef::Thread(m.as_str().to_string()))
        .unwrap_or(ThreadRef::Catalog);

    Ok((board, thread))
}

/// Builds the scheme-less API URI for a board or thread
///
/// Returns `None` if the imageboard has no schema.
///
/// # Example
///
/// ```
/// use threadwatch::target::{build_request_uri, ThreadRef};
///
/// let thread = ThreadRef::Thread("123".to_string());
/// assert_eq!(
///     build_request_uri("b", &thread, "4chan").as_deref(),
///     Some("a.4cdn.org/b/123.json")
/// );
/// assert_eq!(
///     build_request_uri("b", &ThreadRef::Catalog, "4chan").as_deref(),
///     Some("a.4cdn.org/b/threads.json")
/// );
/// ```
pub fn build_request_uri(board: &str, thread: &ThreadRef, imageboard: &str) -> Option<String> {
    let schema = schema_for(imageboard)?;
    let resource = match thread {
        ThreadRef::Thread(id) => format!("{}.json", id),
        ThreadRef::Catalog => schema.threads_endpoint.to_string(),
    };
    Some(format!("{}/{}/{}", schema.base_host, board, resource))
}

/// Resolves raw target strings into initial registry entries
///
/// Returns the targets keyed by request URI, plus every raw string that could
/// not be resolved. Duplicates collapse onto one entry.
pub fn resolve_targets<S: AsRef<str>>(
    raw_targets: &[S],
    imageboard: &str,
) -> (HashMap<String, Target>, Vec<String>) {
    let mut targets = HashMap::new();
    let mut failed = Vec::new();

    for raw in raw_targets {
        let raw = raw.as_ref();
        let resolved = parse_target(raw).and_then(|(board, thread)| {
            build_request_uri(&board, &thread, imageboard)
                .map(|uri| Target::new(uri, board, thread.is_thread()))
                .ok_or_else(|| TargetError::UnknownImageboard(imageboard.to_string()))
        });

        match resolved {
            Ok(target) => {
                targets
                    .entry(target.request_uri.clone())
                    .or_insert(target);
            }
            Err(e) => {
                tracing::debug!("Rejected target: {}", e);
                failed.push(raw.to_string());
            }
        }
    }

    (targets, failed)
}
