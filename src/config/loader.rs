//! Configuration loader with environment variable expansion

use super::{expand_env_vars, Config, ConfigError};
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration text
    pub fn from_yaml(content: &str) -> Result<Config, ConfigError> {
        let expanded = expand_env_vars(content);
        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` when given, otherwise fall back to the defaults
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Config, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Config::default()),
        }
    }
}
