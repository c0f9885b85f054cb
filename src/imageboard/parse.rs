//! Schema interpreter for catalog and thread bodies
//!
//! Turns the JSON of any supported imageboard into thread ids or uniform
//! [`Post`] records, using only the keys recorded in its [`ImageboardSchema`].

use crate::imageboard::ImageboardSchema;
use crate::SchemaError;
use chrono::DateTime;
use serde_json::Value;

/// A post in imageboard-independent form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    /// Post id, unique within its board
    pub id: String,

    /// Id of the thread the post belongs to
    pub thread: String,

    /// Unix timestamp (seconds)
    pub timestamp: Option<i64>,

    pub name: Option<String>,
    pub tripcode: Option<String>,
    pub subject: Option<String>,

    /// Raw comment body, usually HTML
    pub comment: Option<String>,

    /// Original filename of the post's main file, with extension
    pub filename: Option<String>,

    /// Every file attached to the post
    pub files: Vec<PostFile>,
}

/// A downloadable file attached to a post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostFile {
    /// Scheme-less location of the file on the image host
    pub uri: String,

    /// Original upload name, with extension
    pub filename: String,
}

impl PostFile {
    /// Name to save the file under: the host's stored name, then the upload name
    ///
    /// Uploads often share a name (`image.png`), stored names do not.
    pub fn local_name(&self) -> String {
        let stored = self.uri.rsplit('/').next().unwrap_or(&self.uri);
        let stem = stored.split('.').next().unwrap_or(stored);
        if stem.is_empty() {
            self.filename.clone()
        } else {
            format!("{}_{}", stem, self.filename)
        }
    }
}

/// Extracts the ids of every thread listed in a catalog body
///
/// Catalogs are either a list of pages, each holding its threads under
/// `thread_fields.page_threads`, or a flat list of thread entries. Duplicate
/// ids are reported once, in catalog order.
///
/// # Example
///
/// ```
/// use threadwatch::imageboard::{parse_thread_ids, schema_for};
///
/// let schema = schema_for("4chan").unwrap();
/// let body = r#"[{"page": 1, "threads": [{"no": 10}, {"no": 11}]}]"#;
/// assert_eq!(parse_thread_ids(body, schema).unwrap(), vec!["10", "11"]);
/// ```
pub fn parse_thread_ids(body: &str, schema: &ImageboardSchema) -> Result<Vec<String>, SchemaError> {
    let value: Value = serde_json::from_str(body)?;
    let entries = value
        .as_array()
        .ok_or_else(|| SchemaError::Shape("catalog is not a list".to_string()))?;

    let mut threads: Vec<&Value> = Vec::new();
    match schema.thread_fields.page_threads {
        Some(key) => {
            for page in entries {
                let listed = page.get(key).and_then(Value::as_array).ok_or_else(|| {
                    SchemaError::Shape(format!("catalog page has no \"{}\" list", key))
                })?;
                threads.extend(listed);
            }
        }
        None => threads.extend(entries),
    }

    let mut ids: Vec<String> = Vec::new();
    for entry in threads {
        let id = resolved_thread(entry, schema)
            .or_else(|| entry.get(schema.thread_fields.id).and_then(scalar_string));
        match id {
            Some(id) if !ids.contains(&id) => ids.push(id),
            Some(_) => {}
            None => tracing::debug!("Skipping catalog entry without a thread id"),
        }
    }

    Ok(ids)
}

/// Extracts every post of a thread body
///
/// With a flat schema the body is `{"posts": [...]}` and the first post is the
/// OP. With a nested schema the body itself is the OP and replies live under
/// `replies_field`.
pub fn parse_posts(
    body: &str,
    board: &str,
    schema: &ImageboardSchema,
) -> Result<Vec<Post>, SchemaError> {
    let value: Value = serde_json::from_str(body)?;

    let raw_posts: Vec<&Value> = match schema.replies_field {
        None => value
            .get("posts")
            .and_then(Value::as_array)
            .ok_or_else(|| SchemaError::Shape("thread has no \"posts\" list".to_string()))?
            .iter()
            .collect(),
        Some(key) => {
            if !value.is_object() {
                return Err(SchemaError::Shape("thread is not an object".to_string()));
            }
            let mut posts = vec![&value];
            if let Some(replies) = value.get(key).and_then(Value::as_array) {
                posts.extend(replies);
            }
            posts
        }
    };

    let Some(root) = raw_posts.first() else {
        return Ok(Vec::new());
    };
    let thread_id = post_id(root, schema)
        .ok_or_else(|| SchemaError::Shape("opening post has no id".to_string()))?;

    Ok(raw_posts
        .into_iter()
        .filter_map(|raw| build_post(raw, &thread_id, board, schema))
        .collect())
}

/// Builds the scheme-less location of a stored file on the image host
///
/// Stored names that already are absolute paths are appended to the host as-is.
pub fn file_uri(
    schema: &ImageboardSchema,
    board: &str,
    stored_name: &str,
    extension: &str,
) -> String {
    if stored_name.starts_with('/') {
        return format!("{}{}{}", schema.image_host, stored_name, extension);
    }

    let mut segments = vec![schema.image_host];
    if schema.image_host_includes_board {
        segments.push(board);
    }
    if let Some(subdirectory) = schema.image_subdirectory {
        segments.push(subdirectory);
    }
    format!("{}/{}{}", segments.join("/"), stored_name, extension)
}

fn build_post(
    raw: &Value,
    thread_id: &str,
    board: &str,
    schema: &ImageboardSchema,
) -> Option<Post> {
    let fields = &schema.post_fields;
    let id = match post_id(raw, schema) {
        Some(id) => id,
        None => {
            tracing::debug!("Skipping post without an id");
            return None;
        }
    };

    let thread = resolved_thread(raw, schema).unwrap_or_else(|| thread_id.to_string());
    let text = |slot: Option<&'static str>| {
        slot.and_then(|key| raw.get(key))
            .and_then(scalar_string)
            .filter(|s| !s.is_empty())
    };

    let filename = text(fields.filename).map(|name| match text(fields.extension) {
        Some(extension) => format!("{}{}", name, extension),
        None => name,
    });

    Some(Post {
        id,
        thread,
        timestamp: fields.timestamp.and_then(|key| raw.get(key)).and_then(timestamp),
        name: text(fields.name),
        tripcode: text(fields.tripcode),
        subject: text(fields.subject),
        comment: text(fields.comment),
        filename,
        files: collect_files(raw, board, schema),
    })
}

fn collect_files(raw: &Value, board: &str, schema: &ImageboardSchema) -> Vec<PostFile> {
    let mut files = Vec::new();

    // vichan keeps the first file inline on the post
    if let Some(file) = file_from(raw, board, schema) {
        files.push(file);
    }

    if let Some(attachments) = raw.get(schema.image_fields.attachments).and_then(Value::as_array) {
        files.extend(attachments.iter().filter_map(|item| file_from(item, board, schema)));
    }

    files
}

fn file_from(record: &Value, board: &str, schema: &ImageboardSchema) -> Option<PostFile> {
    let fields = &schema.image_fields;
    let lookup = |key: &str| {
        record
            .get(key)
            .or_else(|| schema.pivot_field.and_then(|pivot| record.get(pivot)?.get(key)))
            .and_then(scalar_string)
    };

    let stored_name = lookup(fields.stored_name)?;
    let extension = fields.extension.and_then(|key| lookup(key)).unwrap_or_default();
    let original = lookup(fields.filename).unwrap_or_else(|| stored_name.clone());
    let original = original.rsplit('/').next().unwrap_or(&original).to_string();

    Some(PostFile {
        uri: file_uri(schema, board, &stored_name, &extension),
        filename: format!("{}{}", original, extension),
    })
}

fn post_id(raw: &Value, schema: &ImageboardSchema) -> Option<String> {
    raw.get(schema.post_fields.id)
        .or_else(|| raw.get(schema.thread_fields.id))
        .and_then(scalar_string)
}

/// Thread named by the reply-to field, if the entry is a reply
fn resolved_thread(raw: &Value, schema: &ImageboardSchema) -> Option<String> {
    schema
        .reply_to_field
        .and_then(|key| raw.get(key))
        .and_then(scalar_string)
        .filter(|thread| thread != "0")
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|parsed| parsed.timestamp()),
        _ => None,
    }
}
