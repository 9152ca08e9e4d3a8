//! Configuration management for the PolicyPal client.
//!
//! The client reads a single configuration file at `~/.policypal/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Command line flags (applied by the binary)
//! 2. Environment variables (POLICYPAL_* prefix)
//! 3. Explicit config file values
//! 4. Default values
//!
//! # Environment Variable Mapping
//!
//! - `POLICYPAL_API_URL` → backend.endpoint
//! - `POLICYPAL_LOG_LEVEL` → observability.log_level
//! - `POLICYPAL_LOG_FORMAT` → observability.log_format

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, ResultExt};

/// Default answering service endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000";

/// Default number of turns retained in the conversation history.
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".policypal"),
        |dirs| dirs.home_dir().join(".policypal"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Backend Configuration
// ============================================================================

/// Answering service connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the answering service (`/chat` and `/health` live under it)
    #[serde(default = "default_endpoint", alias = "api_url")]
    pub endpoint: String,

    /// Fire a liveness probe at startup
    #[serde(default = "default_true")]
    pub health_check: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            health_check: true,
        }
    }
}

// ============================================================================
// Session Configuration
// ============================================================================

/// Conversation session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum number of turns kept in history and sent with each request
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
        }
    }
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    /// Aliases: "level" for backward compatibility with existing config files
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    /// Aliases: "format" for backward compatibility with existing config files
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Answering service connection
    #[serde(default)]
    pub backend: BackendConfig,

    /// Conversation session
    #[serde(default)]
    pub session: SessionConfig,

    /// Logging
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from `path` if the file exists.
    ///
    /// Runs before logging is initialized, so the caller reports which source was used.
    pub fn load_optional(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(path).map(Some)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .context(format!("Failed to parse config from {}", path.display()))
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides using an arbitrary variable lookup.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("POLICYPAL_API_URL") {
            self.backend.endpoint = url;
        }
        if let Some(level) = lookup("POLICYPAL_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("POLICYPAL_LOG_FORMAT") {
            self.observability.log_format = format;
        }
    }

    /// Backend endpoint without a trailing slash.
    pub fn endpoint(&self) -> &str {
        self.backend.endpoint.trim_end_matches('/')
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.into()
}
fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "pretty".into()
}
fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.backend.endpoint, "http://localhost:8000");
        assert!(config.backend.health_check);
        assert_eq!(config.session.history_capacity, 10);
        assert_eq!(config.observability.log_level, "info");
        assert_eq!(config.observability.log_format, "pretty");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"backend": {"endpoint": "https://pal.example.com/"}}"#)
                .unwrap();
        assert_eq!(config.endpoint(), "https://pal.example.com");
        assert!(config.backend.health_check);
        assert_eq!(config.session.history_capacity, 10);
    }

    #[test]
    fn test_observability_aliases() {
        let config: Config =
            serde_json::from_str(r#"{"observability": {"level": "debug", "format": "json"}}"#)
                .unwrap();
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.observability.log_format, "json");
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("POLICYPAL_API_URL", "http://10.0.0.5:9000"),
            ("POLICYPAL_LOG_LEVEL", "warn"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides_from(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.backend.endpoint, "http://10.0.0.5:9000");
        assert_eq!(config.observability.log_level, "warn");
        assert_eq!(config.observability.log_format, "pretty");
    }

    #[test]
    fn test_load_optional_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        assert!(Config::load_optional(&path).unwrap().is_none());
    }

    #[test]
    fn test_load_optional_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"session": {"history_capacity": 6}, "backend": {"health_check": false}}"#)
            .unwrap();

        let loaded = Config::load_optional(&path).unwrap().unwrap();
        assert_eq!(loaded.session.history_capacity, 6);
        assert!(!loaded.backend.health_check);
    }

    #[test]
    fn test_load_invalid_json_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }
}
