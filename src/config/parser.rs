use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 fingerprint of the effective settings
///
/// The configuration is serialized back to TOML first, so the fingerprint
/// covers command-line overrides and ignores formatting of the file.
pub fn compute_config_hash(config: &Config) -> Result<String, ConfigError> {
    let canonical = toml::to_string(config)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{ArchiveFormat, OutputMode};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[poller]
imageboard = "lainchan"
ssl = true
cap-connections = true
max-connections = 4
continuous = true
refresh-interval = 60

[output]
mode = "ar"
format = "sqlite"
path = "./archive"

[filters]
patterns = ["name:^Anonymous$"]
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.poller.imageboard, "lainchan");
        assert!(config.poller.ssl);
        assert_eq!(config.poller.max_connections, 4);
        assert_eq!(config.poller.refresh_interval, 60);
        assert_eq!(config.output.mode, Some(OutputMode::Archive));
        assert_eq!(config.output.format, ArchiveFormat::Sqlite);
        assert_eq!(config.filters.patterns.len(), 1);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let file = create_temp_config("[poller]\nssl = true\n");
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.poller.imageboard, "4chan");
        assert_eq!(config.poller.max_connections, 8);
        assert_eq!(config.output.mode, None);
        assert!(config.filters.patterns.is_empty());
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/threadwatch.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_bad_mode() {
        let file = create_temp_config("[output]\nmode = \"zz\"\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let file = create_temp_config("[poller]\nmax-connections = 0\n");
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_compute_config_hash() {
        let config = Config::default();

        let hash1 = compute_config_hash(&config).unwrap();
        let hash2 = compute_config_hash(&config.clone()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_settings_different_hash() {
        let mut other = Config::default();
        other.poller.continuous = true;

        let hash1 = compute_config_hash(&Config::default()).unwrap();
        let hash2 = compute_config_hash(&other).unwrap();

        assert_ne!(hash1, hash2);
    }
}
