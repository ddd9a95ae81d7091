//! Configuration file parser for ~/.config/podshelf/config.toml.
//!
//! Every key is optional and the file itself may be absent: load falls back
//! to `Config::default()` per key. Unrecognized keys are kept non-fatal
//! (serde defaults, no `deny_unknown_fields`) but logged as likely typos.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::model::SortMode;

/// Environment variable consulted before the config file for the user data
/// API key.
pub const API_KEY_ENV: &str = "PODSHELF_API_KEY";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// `default_sort` deserializes straight into [`SortMode`], so a misspelled
/// mode fails the load instead of surviving as a raw string. The hand-written
/// `Debug` impl keeps `user_data_api_key` out of logs and error output.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the podcast catalog service.
    pub catalog_url: String,

    /// Base URL of the user data backend (PostgREST-style REST root).
    /// Preference commands are disabled while this is unset.
    pub user_data_url: Option<String>,

    /// API key for the user data backend (alternative to the
    /// PODSHELF_API_KEY env var). Env var takes precedence over config file.
    pub user_data_api_key: Option<String>,

    /// Default identity for preference commands; `--email` overrides it.
    pub email: Option<String>,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Catalog ordering applied before the user picks one.
    pub default_sort: SortMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_url: "https://podcast-api.netlify.app".to_string(),
            user_data_url: None,
            user_data_api_key: None,
            email: None,
            request_timeout_secs: 20,
            default_sort: SortMode::Recent,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("catalog_url", &self.catalog_url)
            .field("user_data_url", &self.user_data_url)
            .field(
                "user_data_api_key",
                &self.user_data_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("email", &self.email)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("default_sort", &self.default_sort)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// A missing or blank file yields `Config::default()`. Invalid TOML and
    /// wrongly typed values fail the load; unrecognized keys only warn.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Size check before reading; the file is user-editable
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted between the metadata call and the read
                tracing::debug!(path = %path.display(), "Config file vanished mid-load, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Blank config file, using defaults");
            return Ok(Self::default());
        }

        // Scan for probable typos before the typed parse drops them silently
        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = [
                "catalog_url",
                "user_data_url",
                "user_data_api_key",
                "email",
                "request_timeout_secs",
                "default_sort",
            ];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unrecognized config key, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            catalog_url = %config.catalog_url,
            default_sort = %config.default_sort,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// The user data API key, with the environment variable taking
    /// precedence over the config file.
    pub fn resolved_api_key(&self) -> Option<SecretString> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.is_empty())
            .or_else(|| self.user_data_api_key.clone())
            .map(SecretString::from)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ============================================================================
// Tests
// ============================================================================
