use crate::config::types::{Config, PollerConfig};
use crate::imageboard::{schema_for, supported_imageboards};
use crate::ConfigError;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_poller_config(&config.poller)?;
    Ok(())
}

/// Validates polling configuration
fn validate_poller_config(config: &PollerConfig) -> Result<(), ConfigError> {
    if schema_for(&config.imageboard).is_none() {
        return Err(ConfigError::UnknownImageboard(format!(
            "{} (supported: {})",
            config.imageboard,
            supported_imageboards().collect::<Vec<_>>().join(", ")
        )));
    }

    if config.max_connections < 1 || config.max_connections > 100 {
        return Err(ConfigError::Validation(format!(
            "max-connections must be between 1 and 100, got {}",
            config.max_connections
        )));
    }

    if config.refresh_interval < 1 {
        return Err(ConfigError::Validation(format!(
            "refresh-interval must be >= 1 second, got {}",
            config.refresh_interval
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_unknown_imageboard() {
        let mut config = Config::default();
        config.poller.imageboard = "nochan".to_string();

        let result = validate(&config);
        assert!(matches!(
            result,
            Err(ConfigError::UnknownImageboard(msg)) if msg.starts_with("nochan")
        ));
    }

    #[test]
    fn test_max_connections_bounds() {
        let mut config = Config::default();
        config.poller.max_connections = 0;
        assert!(validate(&config).is_err());

        config.poller.max_connections = 101;
        assert!(validate(&config).is_err());

        config.poller.max_connections = 100;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_refresh_interval() {
        let mut config = Config::default();
        config.poller.refresh_interval = 0;
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_blank_filter_pattern_is_not_fatal() {
        let mut config = Config::default();
        config.filters.patterns = vec!["name:^Anon".to_string(), " ".to_string()];
        assert!(validate(&config).is_ok());
    }
}
