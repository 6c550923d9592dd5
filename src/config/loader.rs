//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use super::schema::DispatcherConfig;
use super::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<DispatcherConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: DispatcherConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::LbMethod;

    #[test]
    fn test_parse_from_toml() {
        let toml_src = r#"
            method = "min_pending"
            max_idle_per_host = 32
            connect_timeout_ms = 500

            [[backends]]
            address = "127.0.0.1:8081"
            alias = "a1"

            [rate_limit]
            enabled = true
            qps = 2000
            capacity = 4000
        "#;
        let config: DispatcherConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(config.method, LbMethod::MinPending);
        assert_eq!(config.max_idle_per_host, 32);
        assert_eq!(config.connect_timeout_ms, 500);
        assert_eq!(config.response_header_timeout_ms, 1_000);
        assert_eq!(config.backends.len(), 1);
        assert!(config.rate_limit.enabled);
        assert!(validate_config(&config).is_ok());
    }
}
