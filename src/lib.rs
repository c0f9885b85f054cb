//! Threadwatch: an imageboard thread poller
//!
//! This crate polls imageboard JSON endpoints, discovers threads from board
//! catalogs, incrementally refetches tracked threads and hands the posts it
//! finds to a download or archive sink.

pub mod config;
pub mod filter;
pub mod imageboard;
pub mod output;
pub mod poller;
pub mod target;

use thiserror::Error;

/// Main error type for Threadwatch operations
#[derive(Debug, Error)]
pub enum ChanError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid target: {0}")]
    Target(#[from] TargetError),

    #[error("Unknown imageboard: {0}")]
    UnknownImageboard(String),

    #[error("The given output path cannot be written to: {0}")]
    OutputPath(String),

    #[error("No valid targets provided")]
    NoTargets,

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown imageboard in config: {0}")]
    UnknownImageboard(String),
}

/// Errors raised while turning a raw target string into a request URI
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("target \"{0}\" does not name a board")]
    Empty(String),

    #[error("imageboard \"{0}\" is not supported")]
    UnknownImageboard(String),
}

/// Errors raised when a response body does not match an imageboard schema
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected shape: {0}")]
    Shape(String),
}

/// Errors raised by the archive writers
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type alias for Threadwatch operations
pub type Result<T> = std::result::Result<T, ChanError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for archive operations
pub type ArchiveResult<T> = std::result::Result<T, ArchiveError>;

// Re-export commonly used types
pub use config::Config;
pub use imageboard::{schema_for, ImageboardSchema, Post, PostFile};
pub use poller::{PollOptions, PollSummary, Poller};
pub use target::{build_request_uri, parse_target, Target, TargetRegistry, ThreadRef};
