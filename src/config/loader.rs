//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::{Credentials, LoaderConfig};
use crate::config::validation::{validate_config, ValidationError};

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

/// Load, resolve and validate configuration.
///
/// Without a path the built-in defaults are used. Credentials always come
/// from the environment.
pub fn load_config(path: Option<&Path>) -> Result<LoaderConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
            toml::from_str(&content).map_err(ConfigError::Parse)?
        }
        None => LoaderConfig::default(),
    };

    apply_env(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Fill secrets from environment lookups. Both halves must be present.
pub fn apply_env<F>(config: &mut LoaderConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let username = lookup(&config.traces.username_env).filter(|u| !u.is_empty());
    let password = lookup(&config.traces.password_env).filter(|p| !p.is_empty());
    config.traces.credentials = match (username, password) {
        (Some(username), Some(password)) => Some(Credentials { username, password }),
        _ => None,
    };
}
