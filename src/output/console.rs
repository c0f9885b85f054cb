//! User-facing message channel
//!
//! The poll loop reports progress and per-target failures through an
//! [`Output`]. The console implementation forwards everything to `tracing`;
//! the memory implementation records messages so tests can inspect them.

use std::sync::Mutex;

/// Sink for progress messages and diagnostics
///
/// None of the methods can fail.
pub trait Output {
    /// Reports normal progress
    fn write(&self, message: &str);

    /// Reports a failure the user should know about
    fn write_error(&self, message: &str);

    /// Reports detail only shown with debug logging
    fn write_debug(&self, message: &str);
}

/// [`Output`] backed by the global `tracing` subscriber
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleOutput;

impl Output for ConsoleOutput {
    fn write(&self, message: &str) {
        tracing::info!("{}", message);
    }

    fn write_error(&self, message: &str) {
        tracing::error!("{}", message);
    }

    fn write_debug(&self, message: &str) {
        tracing::debug!("{}", message);
    }
}

/// Message level recorded by [`MemoryOutput`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Error,
    Debug,
}

/// [`Output`] that keeps every message in memory
#[derive(Debug, Default)]
pub struct MemoryOutput {
    messages: Mutex<Vec<(Level, String)>>,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, level: Level, message: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push((level, message.to_string()));
        }
    }

    /// Every message recorded so far, in order
    pub fn messages(&self) -> Vec<(Level, String)> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }

    /// Messages of one level
    pub fn at(&self, level: Level) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, message)| message)
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.at(Level::Error)
    }
}

impl Output for MemoryOutput {
    fn write(&self, message: &str) {
        self.push(Level::Info, message);
    }

    fn write_error(&self, message: &str) {
        self.push(Level::Error, message);
    }

    fn write_debug(&self, message: &str) {
        self.push(Level::Debug, message);
    }
}

impl<O: Output + ?Sized> Output for &O {
    fn write(&self, message: &str) {
        (**self).write(message)
    }

    fn write_error(&self, message: &str) {
        (**self).write_error(message)
    }

    fn write_debug(&self, message: &str) {
        (**self).write_debug(message)
    }
}
