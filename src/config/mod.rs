//! Configuration module for Threadwatch
//!
//! This module handles loading, parsing, and validating the optional TOML
//! configuration file. Values from the file act as defaults that command-line
//! flags override.
//!
//! # Example
//!
//! ```no_run
//! use threadwatch::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("threadwatch.toml")).unwrap();
//! println!("Polling {}", config.poller.imageboard);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, FilterConfig, OutputConfig, PollerConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config};
pub use validation::validate;
