//! Imageboard schema registry
//!
//! Every supported imageboard is described by one [`ImageboardSchema`] entry in
//! a static table. The schema names the hosts and endpoints to talk to and the
//! JSON keys that carry each semantic field. The interpreter in [`parse`] reads
//! catalogs and threads through these tables, so adding an imageboard means
//! adding one entry to [`SCHEMAS`] and nothing else.

mod parse;

pub use parse::{file_uri, parse_posts, parse_thread_ids, Post, PostFile};

/// JSON keys for the semantic fields of a post
///
/// A `None` slot means the imageboard has no such field at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostFields {
    pub id: &'static str,
    pub timestamp: Option<&'static str>,
    pub name: Option<&'static str>,
    pub tripcode: Option<&'static str>,
    pub subject: Option<&'static str>,
    pub comment: Option<&'static str>,
    pub filename: Option<&'static str>,
    pub extension: Option<&'static str>,
}

/// JSON keys for file attachments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageFields {
    /// Original filename as uploaded
    pub filename: &'static str,

    /// Name (or path) the file is stored under on the image host
    pub stored_name: &'static str,

    /// Extension, for schemas that keep it apart from the names
    pub extension: Option<&'static str>,

    /// Key of the per-post list of (additional) attachments
    pub attachments: &'static str,
}

/// JSON keys for catalog entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadFields {
    /// Key holding the thread id in a catalog entry
    pub id: &'static str,

    /// Key of the thread list inside each catalog page, for paginated catalogs
    pub page_threads: Option<&'static str>,
}

/// Endpoint layout and field schema of one imageboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageboardSchema {
    pub name: &'static str,
    pub base_host: &'static str,
    pub threads_endpoint: &'static str,
    pub image_host: &'static str,
    pub image_subdirectory: Option<&'static str>,
    pub image_host_includes_board: bool,

    /// Path segment before a thread id in human-facing thread links
    pub delimiter: &'static str,

    pub post_fields: PostFields,
    pub image_fields: ImageFields,
    pub thread_fields: ThreadFields,

    /// Key of the nested reply list; `None` when a thread is a flat post list
    pub replies_field: Option<&'static str>,

    /// Key of the nested record carrying an attachment's own file metadata
    pub pivot_field: Option<&'static str>,

    /// Key naming the thread a post or catalog entry belongs to
    pub reply_to_field: Option<&'static str>,
}

impl ImageboardSchema {
    /// Thread path in the board's own layout, e.g. `8ch.net/tech/res/42`
    pub fn thread_link(&self, board: &str, thread: &str) -> String {
        format!("{}/{}/{}/{}", self.base_host, board, self.delimiter, thread)
    }
}

const VICHAN_POST_FIELDS: PostFields = PostFields {
    id: "no",
    timestamp: Some("time"),
    name: Some("name"),
    tripcode: Some("trip"),
    subject: Some("sub"),
    comment: Some("com"),
    filename: Some("filename"),
    extension: Some("ext"),
};

const VICHAN_IMAGE_FIELDS: ImageFields = ImageFields {
    filename: "filename",
    stored_name: "tim",
    extension: Some("ext"),
    attachments: "extra_files",
};

const VICHAN_THREAD_FIELDS: ThreadFields = ThreadFields {
    id: "no",
    page_threads: Some("threads"),
};

const LYNXCHAN_POST_FIELDS: PostFields = PostFields {
    id: "postId",
    timestamp: Some("creation"),
    name: Some("name"),
    tripcode: Some("id"),
    subject: Some("subject"),
    comment: Some("markdown"),
    filename: Some("originalName"),
    extension: None,
};

const LYNXCHAN_IMAGE_FIELDS: ImageFields = ImageFields {
    filename: "originalName",
    stored_name: "path",
    extension: None,
    attachments: "files",
};

const LYNXCHAN_THREAD_FIELDS: ThreadFields = ThreadFields {
    id: "threadId",
    page_threads: None,
};

const NEXT_POST_FIELDS: PostFields = PostFields {
    id: "board_id",
    timestamp: Some("created_at"),
    name: Some("author"),
    tripcode: Some("author_id"),
    subject: Some("subject"),
    comment: Some("content_html"),
    filename: Some("filename"),
    extension: None,
};

const NEXT_IMAGE_FIELDS: ImageFields = ImageFields {
    filename: "filename",
    stored_name: "attachment_id",
    extension: None,
    attachments: "attachments",
};

const NEXT_THREAD_FIELDS: ThreadFields = ThreadFields {
    id: "board_id",
    page_threads: None,
};

/// Table of supported imageboards
pub static SCHEMAS: &[ImageboardSchema] = &[
    ImageboardSchema {
        name: "4chan",
        base_host: "a.4cdn.org",
        threads_endpoint: "threads.json",
        image_host: "i.4cdn.org",
        image_subdirectory: None,
        image_host_includes_board: true,
        delimiter: "thread",
        post_fields: VICHAN_POST_FIELDS,
        image_fields: VICHAN_IMAGE_FIELDS,
        thread_fields: VICHAN_THREAD_FIELDS,
        replies_field: None,
        pivot_field: None,
        reply_to_field: Some("resto"),
    },
    ImageboardSchema {
        name: "8chan",
        base_host: "8ch.net",
        threads_endpoint: "threads.json",
        image_host: "media.8ch.net",
        image_subdirectory: Some("src"),
        image_host_includes_board: true,
        delimiter: "res",
        post_fields: VICHAN_POST_FIELDS,
        image_fields: VICHAN_IMAGE_FIELDS,
        thread_fields: VICHAN_THREAD_FIELDS,
        replies_field: None,
        pivot_field: None,
        reply_to_field: Some("resto"),
    },
    ImageboardSchema {
        name: "76chan",
        base_host: "76chan.org",
        threads_endpoint: "threads.json",
        image_host: "76chan.org",
        image_subdirectory: Some("src"),
        image_host_includes_board: true,
        delimiter: "res",
        post_fields: VICHAN_POST_FIELDS,
        image_fields: VICHAN_IMAGE_FIELDS,
        thread_fields: VICHAN_THREAD_FIELDS,
        replies_field: None,
        pivot_field: None,
        reply_to_field: Some("resto"),
    },
    ImageboardSchema {
        name: "endchan",
        base_host: "endchan.xyz",
        threads_endpoint: "catalog.json",
        image_host: "endchan.xyz",
        image_subdirectory: None,
        image_host_includes_board: false,
        delimiter: "res",
        post_fields: LYNXCHAN_POST_FIELDS,
        image_fields: LYNXCHAN_IMAGE_FIELDS,
        thread_fields: LYNXCHAN_THREAD_FIELDS,
        replies_field: Some("posts"),
        pivot_field: None,
        reply_to_field: None,
    },
    ImageboardSchema {
        name: "lainchan",
        base_host: "lainchan.org",
        threads_endpoint: "threads.json",
        image_host: "lainchan.org",
        image_subdirectory: Some("src"),
        image_host_includes_board: true,
        delimiter: "res",
        post_fields: VICHAN_POST_FIELDS,
        image_fields: VICHAN_IMAGE_FIELDS,
        thread_fields: VICHAN_THREAD_FIELDS,
        replies_field: None,
        pivot_field: None,
        reply_to_field: Some("resto"),
    },
    ImageboardSchema {
        name: "nextchan",
        base_host: "nextchan.org",
        threads_endpoint: "catalog.json",
        image_host: "media.nextchan.org",
        image_subdirectory: None,
        image_host_includes_board: false,
        delimiter: "thread",
        post_fields: NEXT_POST_FIELDS,
        image_fields: NEXT_IMAGE_FIELDS,
        thread_fields: NEXT_THREAD_FIELDS,
        replies_field: Some("replies"),
        pivot_field: Some("pivot"),
        reply_to_field: Some("reply_to"),
    },
];

/// Looks up the schema for an imageboard by name
///
/// # Example
///
/// ```
/// use threadwatch::imageboard::schema_for;
///
/// let schema = schema_for("4chan").unwrap();
/// assert_eq!(schema.base_host, "a.4cdn.org");
/// assert!(schema_for("nonexistent").is_none());
/// ```
pub fn schema_for(name: &str) -> Option<&'static ImageboardSchema> {
    SCHEMAS.iter().find(|schema| schema.name == name)
}

/// Names of all supported imageboards, in table order
pub fn supported_imageboards() -> impl Iterator<Item = &'static str> {
    SCHEMAS.iter().map(|schema| schema.name)
}
