//! SQLite archive writer
//!
//! Posts are stored once per `(imageboard, board, post_id)`; re-archiving a
//! post that is already present is silently ignored. Each program run that
//! archives into the database is recorded in `runs` together with the
//! fingerprint of its settings.

use crate::imageboard::Post;
use crate::ArchiveResult;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQL schema for the archive database
pub const SCHEMA_SQL: &str = r#"
-- Program runs that wrote to this archive
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- Archived posts
CREATE TABLE IF NOT EXISTS posts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    imageboard TEXT NOT NULL,
    board TEXT NOT NULL,
    thread TEXT NOT NULL,
    post_id TEXT NOT NULL,
    timestamp INTEGER,
    name TEXT,
    tripcode TEXT,
    subject TEXT,
    comment TEXT,
    filename TEXT,
    archived_at TEXT NOT NULL,
    UNIQUE(imageboard, board, post_id)
);

CREATE INDEX IF NOT EXISTS idx_posts_thread ON posts(imageboard, board, thread);
"#;

/// Final status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
        }
    }
}

/// Connection to an archive database
pub struct SqliteArchive {
    conn: Connection,
}

impl std::fmt::Debug for SqliteArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteArchive")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl SqliteArchive {
    /// Opens (or creates) the archive at `path` and ensures the schema exists
    pub fn new(path: &Path) -> ArchiveResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        conn.execute_batch(SCHEMA_SQL)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory archive
    pub fn open_in_memory() -> ArchiveResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn })
    }

    /// Stores posts of one board; returns how many were new
    pub fn archive(
        &mut self,
        posts: &[Post],
        board: &str,
        imageboard: &str,
    ) -> ArchiveResult<usize> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO posts
                 (imageboard, board, thread, post_id, timestamp, name, tripcode, subject, comment, filename, archived_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for post in posts {
                let filename = post
                    .filename
                    .as_deref()
                    .or_else(|| post.files.first().map(|f| f.filename.as_str()));
                inserted += stmt.execute(params![
                    imageboard,
                    board,
                    post.thread,
                    post.id,
                    post.timestamp,
                    post.name,
                    post.tripcode,
                    post.subject,
                    post.comment,
                    filename,
                    now,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Records the start of a run; returns its id
    pub fn start_run(&mut self, config_hash: &str) -> ArchiveResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn finish_run(&mut self, run_id: i64, status: RunStatus) -> ArchiveResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        Ok(())
    }

    /// Status and fingerprint of a recorded run
    pub fn run(&self, run_id: i64) -> ArchiveResult<Option<(String, String)>> {
        let run = self
            .conn
            .query_row(
                "SELECT status, config_hash FROM runs WHERE id = ?1",
                params![run_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(run)
    }

    pub fn count_posts(&self) -> ArchiveResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn count_thread_posts(
        &self,
        imageboard: &str,
        board: &str,
        thread: &str,
    ) -> ArchiveResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM posts WHERE imageboard = ?1 AND board = ?2 AND thread = ?3",
            params![imageboard, board, thread],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
