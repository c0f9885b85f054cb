//! Plaintext archive writer

use crate::imageboard::Post;
use crate::ArchiveResult;
use chrono::DateTime;
use scraper::{Html, Node};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Appends one text block per post to the archive at `path`
///
/// The file is created if it does not exist yet.
pub fn archive_plaintext(posts: &[Post], path: &Path, imageboard: &str) -> ArchiveResult<()> {
    if posts.is_empty() {
        return Ok(());
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut buffer = String::new();
    for post in posts {
        buffer.push_str(&format_post(post, imageboard));
    }
    file.write_all(buffer.as_bytes())?;
    Ok(())
}

/// Renders a post as a text block, terminated by a blank line
pub fn format_post(post: &Post, imageboard: &str) -> String {
    let mut block = format!("Post: {} (thread {}, {})\n", post.id, post.thread, imageboard);

    let name = post.name.as_deref().unwrap_or("");
    match post.tripcode.as_deref() {
        Some(trip) if !trip.is_empty() => block.push_str(&format!("Name: {} {}\n", name, trip)),
        _ => block.push_str(&format!("Name: {}\n", name)),
    }

    if let Some(subject) = post.subject.as_deref().filter(|s| !s.is_empty()) {
        block.push_str(&format!("Subject: {}\n", comment_text(subject)));
    }

    if let Some(date) = post.timestamp.and_then(|ts| DateTime::from_timestamp(ts, 0)) {
        block.push_str(&format!("Date: {}\n", date.format("%Y-%m-%d %H:%M:%S UTC")));
    }

    let filename = post
        .filename
        .as_deref()
        .or_else(|| post.files.first().map(|f| f.filename.as_str()));
    if let Some(filename) = filename {
        block.push_str(&format!("File: {}\n", filename));
    }

    if let Some(comment) = post.comment.as_deref() {
        let text = comment_text(comment);
        if !text.is_empty() {
            block.push_str(&text);
            block.push('\n');
        }
    }

    block.push('\n');
    block
}

/// Converts a comment's HTML into plain text; `<br>` becomes a line break
pub fn comment_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut text = String::new();

    for node in fragment.tree.root().descendants() {
        match node.value() {
            Node::Text(t) => text.push_str(t),
            Node::Element(e) if e.name() == "br" => text.push('\n'),
            _ => {}
        }
    }

    text.trim_end().to_string()
}
