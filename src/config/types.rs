use crate::output::{ArchiveFormat, OutputMode};
use crate::poller::MAX_CONNECTIONS;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure for Threadwatch
///
/// Every section and field is optional in the file; missing values fall back
/// to the same defaults the command line uses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub poller: PollerConfig,
    pub output: OutputConfig,
    pub filters: FilterConfig,
}

/// Polling behavior configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Imageboard the targets live on
    pub imageboard: String,

    /// Talk to the imageboard over HTTPS
    pub ssl: bool,

    /// Limit the number of concurrent connections
    #[serde(rename = "cap-connections")]
    pub cap_connections: bool,

    /// Connection limit used when capping is enabled
    #[serde(rename = "max-connections")]
    pub max_connections: usize,

    /// Keep polling until interrupted
    pub continuous: bool,

    /// Seconds between iterations in continuous mode
    #[serde(rename = "refresh-interval")]
    pub refresh_interval: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            imageboard: "4chan".to_string(),
            ssl: false,
            cap_connections: false,
            max_connections: MAX_CONNECTIONS,
            continuous: false,
            refresh_interval: 30,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// `fd` or `ar`; absent means a connectivity check only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<OutputMode>,

    /// Archive format for `ar` mode
    pub format: ArchiveFormat,

    /// Download directory or archive path
    pub path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            mode: None,
            format: ArchiveFormat::Plaintext,
            path: PathBuf::from("."),
        }
    }
}

/// Post filter configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// `field:regex` or bare regex patterns
    pub patterns: Vec<String>,
}
