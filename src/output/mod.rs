//! Output module for messages, archives and downloads
//!
//! This module handles:
//! - The user-facing message channel (`Output`)
//! - Resolving and validating the output path
//! - Writing posts to plaintext or SQLite archives
//! - The sink a poll run hands its posts to

mod console;
mod plaintext;
mod sqlite;

pub use console::{ConsoleOutput, Level, MemoryOutput, Output};
pub use plaintext::{archive_plaintext, comment_text, format_post};
pub use sqlite::{RunStatus, SqliteArchive, SCHEMA_SQL};

use crate::ArchiveResult;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// What a run does with the posts it finds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputMode {
    /// Download attached files
    #[serde(rename = "fd")]
    FileDownload,

    /// Archive post text
    #[serde(rename = "ar")]
    Archive,
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fd" => Ok(Self::FileDownload),
            "ar" => Ok(Self::Archive),
            other => Err(format!("unknown output mode \"{}\" (expected fd or ar)", other)),
        }
    }
}

/// Archive file format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFormat {
    #[default]
    Plaintext,
    Sqlite,
}

impl ArchiveFormat {
    /// File name used when the output path is a directory
    pub fn default_filename(&self) -> &'static str {
        match self {
            Self::Plaintext => "archive.txt",
            Self::Sqlite => "archive.db",
        }
    }
}

impl FromStr for ArchiveFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plaintext" => Ok(Self::Plaintext),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(format!(
                "unknown output format \"{}\" (expected plaintext or sqlite)",
                other
            )),
        }
    }
}

/// Resolves where a run writes to, or `None` if that place is not writable
///
/// * `fd`: `output` is a directory, created if missing.
/// * `ar`: `output` is the archive file. An existing directory gets
///   `archive.txt` or `archive.db` inside it.
pub fn resolve_output_path(
    output: &Path,
    mode: OutputMode,
    format: ArchiveFormat,
) -> Option<PathBuf> {
    match mode {
        OutputMode::FileDownload => {
            if !output.exists() && fs::create_dir_all(output).is_err() {
                return None;
            }
            (output.is_dir() && dir_is_writable(output)).then(|| output.to_path_buf())
        }
        OutputMode::Archive => {
            let path = if output.is_dir() {
                output.join(format.default_filename())
            } else {
                output.to_path_buf()
            };

            if path.exists() {
                let writable =
                    path.is_file() && OpenOptions::new().append(true).open(&path).is_ok();
                return writable.then_some(path);
            }

            let parent = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            (parent.is_dir() && dir_is_writable(parent)).then_some(path)
        }
    }
}

fn dir_is_writable(dir: &Path) -> bool {
    let scratch = dir.join(format!(".threadwatch-{}", std::process::id()));
    match OpenOptions::new().write(true).create_new(true).open(&scratch) {
        Ok(_) => fs::remove_file(&scratch).is_ok(),
        Err(_) => false,
    }
}

/// Where the posts of a poll run end up
#[derive(Debug)]
pub enum Sink {
    /// Attached files are saved into `dir`
    Download { dir: PathBuf },

    /// Posts are appended to a text file
    Plaintext { path: PathBuf },

    /// Posts are stored in a SQLite database
    Sqlite(SqliteArchive),
}

/// Prepares the archive (or download directory) and returns the sink for it
///
/// Calling this on an existing archive leaves its contents untouched.
pub fn create_archive(mode: OutputMode, format: ArchiveFormat, path: &Path) -> ArchiveResult<Sink> {
    match (mode, format) {
        (OutputMode::FileDownload, _) => {
            fs::create_dir_all(path)?;
            Ok(Sink::Download {
                dir: path.to_path_buf(),
            })
        }
        (OutputMode::Archive, ArchiveFormat::Plaintext) => {
            OpenOptions::new().create(true).append(true).open(path)?;
            Ok(Sink::Plaintext {
                path: path.to_path_buf(),
            })
        }
        (OutputMode::Archive, ArchiveFormat::Sqlite) => Ok(Sink::Sqlite(SqliteArchive::new(path)?)),
    }
}
