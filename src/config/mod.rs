//! Configuration module for Asset Uploadr
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion and validation. Every section is optional;
//! a missing file means [`Config::default`].

use crate::retry::{BackoffPolicy, RetryPolicy};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

// ============================================================================
// Environment Variable Expansion
// ============================================================================

lazy_static! {
    static ref ENV_VAR: regex_lite::Regex =
        regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]+))?\}").unwrap();
}

/// Expand environment variables in a string.
///
/// Supports two syntaxes:
/// - `${VAR_NAME}` - Simple expansion, keeps placeholder if var not found
/// - `${VAR_NAME:-default}` - Expansion with default value
///
/// # Examples
///
/// ```ignore
/// std::env::set_var("MY_VAR", "value");
/// let result = expand_env_vars("prefix-${MY_VAR}-suffix");
/// assert_eq!(result, "prefix-value-suffix");
///
/// let result = expand_env_vars("${MISSING:-default}");
/// assert_eq!(result, "default");
/// ```
pub(crate) fn expand_env_vars(s: &str) -> String {
    ENV_VAR
        .replace_all(s, |cap: &regex_lite::Captures<'_>| {
            match std::env::var(&cap[1]) {
                Ok(val) => val,
                Err(_) => match cap.get(2) {
                    Some(default) => default.as_str().to_string(),
                    // No env var and no default. Keep the original placeholder.
                    None => cap[0].to_string(),
                },
            }
        })
        .into_owned()
}

/// Validate that a URL starts with http:// or https://
fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub product_search: ProductSearchConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_http_url(&self.api.base_url) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid api.base_url '{}': must start with http:// or https://",
                self.api.base_url
            )));
        }

        if self.api.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "api.timeout_seconds must be greater than zero".into(),
            ));
        }

        if self.upload.allowed_mime_types.is_empty() {
            return Err(ConfigError::ValidationError(
                "At least one MIME type must be allowed for upload".into(),
            ));
        }

        if self.retry.product_lookup.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.product_lookup.max_attempts must be at least 1".into(),
            ));
        }

        let rate_limit = &self.retry.rate_limit;
        if rate_limit.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.rate_limit.max_attempts must be at least 1".into(),
            ));
        }
        if rate_limit.unit_millis == 0 {
            return Err(ConfigError::ValidationError(
                "retry.rate_limit.unit_millis must be greater than zero".into(),
            ));
        }
        if rate_limit.max_delay_millis < rate_limit.unit_millis {
            return Err(ConfigError::ValidationError(format!(
                "retry.rate_limit.max_delay_millis ({}) is smaller than unit_millis ({})",
                rate_limit.max_delay_millis, rate_limit.unit_millis
            )));
        }

        Ok(())
    }
}

/// Remote asset service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

fn default_base_url() -> String {
    crate::client::DEFAULT_BASE_URL.to_string()
}

fn default_timeout_seconds() -> u64 {
    60
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_allowed_mime_types")]
    pub allowed_mime_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            allowed_mime_types: default_allowed_mime_types(),
        }
    }
}

fn default_allowed_mime_types() -> Vec<String> {
    vec!["image/jpeg".to_string(), "video/mp4".to_string()]
}

/// Retry configuration for both policies
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default)]
    pub product_lookup: LookupRetryConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl RetryConfig {
    pub fn lookup_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.product_lookup.max_attempts,
            delay: Duration::from_millis(self.product_lookup.delay_millis),
        }
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            max_attempts: self.rate_limit.max_attempts,
            unit: Duration::from_millis(self.rate_limit.unit_millis),
            max_delay: Duration::from_millis(self.rate_limit.max_delay_millis),
        }
    }
}

/// Fixed-interval retry while the product catalogue catches up
///
/// # Example
///
/// ```yaml
/// product_lookup:
///   max_attempts: 60
///   delay_millis: 1000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupRetryConfig {
    #[serde(default = "default_lookup_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_lookup_delay")]
    pub delay_millis: u64,
}

impl Default for LookupRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_lookup_attempts(),
            delay_millis: default_lookup_delay(),
        }
    }
}

fn default_lookup_attempts() -> u32 {
    60
}

fn default_lookup_delay() -> u64 {
    1000
}

/// Exponential backoff on rate-limit rejections
///
/// The delay before send `n` is `unit_millis * (e^n - 1)`, clamped to
/// `max_delay_millis`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_backoff_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_unit")]
    pub unit_millis: u64,
    #[serde(default = "default_backoff_max_delay")]
    pub max_delay_millis: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_backoff_attempts(),
            unit_millis: default_backoff_unit(),
            max_delay_millis: default_backoff_max_delay(),
        }
    }
}

fn default_backoff_attempts() -> u32 {
    8
}

fn default_backoff_unit() -> u64 {
    1000
}

fn default_backoff_max_delay() -> u64 {
    60_000
}

/// Product search configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductSearchConfig {
    /// Follow pagination links instead of scanning only the first page
    #[serde(default)]
    pub scan_all_pages: bool,
}
