//! Store configuration.

use std::env;

/// Base url used for `Location` values when none is configured.
pub const DEFAULT_BASE_URL: &str = "https://proofstore.local/fhir/";

/// Environment variable consulted by [`StoreConfig::from_env`].
pub const BASE_URL_ENV: &str = "PROOFSTORE_BASE_URL";

/// Configuration for a [`Store`](crate::Store).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Prefix for transaction `Location` values, always ending in `/`
    pub base_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl StoreConfig {
    /// Create a configuration with the given base url.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: normalize_base_url(base_url.into())?,
        })
    }

    /// Load configuration from environment variables.
    ///
    /// Unset variables fall back to the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        match env::var(BASE_URL_ENV) {
            Ok(base_url) => Self::new(base_url),
            Err(env::VarError::NotPresent) => Ok(Self::default()),
            Err(env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidBaseUrl),
        }
    }

    /// Build the `Location` value for a record.
    pub fn location(&self, resource_type: &str, id: &str) -> String {
        format!("{}{}/{}", self.base_url, resource_type, id)
    }
}

fn normalize_base_url(base_url: String) -> Result<String, ConfigError> {
    let trimmed = base_url.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidBaseUrl);
    }

    if trimmed.ends_with('/') {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{}/", trimmed))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("PROOFSTORE_BASE_URL must be a non-empty url")]
    InvalidBaseUrl,
}
