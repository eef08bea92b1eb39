//! Configuration management
//!
//! This module handles loading, validation, and management of the aula
//! configuration. Configuration is stored in TOML format at
//! ~/.aula/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Bind address, log level, data directory
//! - **classroom**: Course provider base URL, tracked courses, credentials
//! - **intent**: Intent-detection service binding (project, session, language)
//! - **sync**: Background reconciliation cadence
//!
//! Paths support ~ expansion; credential material never leaves this struct
//! except into the token cache.

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Errors produced while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Core server settings
    #[serde(default)]
    pub core: CoreConfig,

    /// Course provider settings
    #[serde(default)]
    pub classroom: ClassroomConfig,

    /// Intent-detection service settings
    #[serde(default)]
    pub intent: IntentConfig,

    /// Background sync settings
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Core server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Address the HTTP server binds to
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// Course provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassroomConfig {
    /// Base URL for the provider API
    #[serde(default = "default_classroom_base_url")]
    pub base_url: String,

    /// Course ids the reconciler keeps mirrored
    #[serde(default)]
    pub tracked_courses: Vec<String>,

    /// OAuth credential material
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

/// OAuth credentials for the course provider
///
/// Either `access_token` is set (fixed token, useful for development and
/// tests) or the refresh-token grant fields are.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CredentialsConfig {
    #[serde(default = "default_token_uri")]
    pub token_uri: String,

    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    #[serde(default)]
    pub refresh_token: String,

    /// Static token override; skips the refresh flow entirely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

/// Intent-detection service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentConfig {
    /// Base URL for the intent service API
    #[serde(default = "default_intent_base_url")]
    pub base_url: String,

    /// Project the agent lives in
    #[serde(default)]
    pub project_id: String,

    /// Fixed session every chat message is bound to
    #[serde(default = "default_session_id")]
    pub session_id: String,

    /// Query language code
    #[serde(default = "default_language")]
    pub language: String,

    /// Bearer token for the service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Background sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Whether the background loop runs at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between continuous passes
    #[serde(default = "default_sync_interval")]
    pub interval_secs: u64,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.aula")
}

fn default_classroom_base_url() -> String {
    "https://classroom.googleapis.com".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_intent_base_url() -> String {
    "https://dialogflow.googleapis.com".to_string()
}

fn default_session_id() -> String {
    "aula-session".to_string()
}

fn default_language() -> String {
    "es".to_string()
}

fn default_true() -> bool {
    true
}

fn default_sync_interval() -> u64 {
    30
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            log_level: default_log_level(),
            data_dir: default_data_dir(),
        }
    }
}

impl Default for ClassroomConfig {
    fn default() -> Self {
        Self {
            base_url: default_classroom_base_url(),
            tracked_courses: Vec::new(),
            credentials: CredentialsConfig::default(),
        }
    }
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            base_url: default_intent_base_url(),
            project_id: String::new(),
            session_id: default_session_id(),
            language: default_language(),
            token: None,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            interval_secs: default_sync_interval(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.aula/config.toml)
    ///
    /// If the configuration file doesn't exist, writes a default one so the
    /// operator has something to fill in.
    pub fn load_or_create() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            if let Some(parent) = config_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let default_config = Config::default();
            let content = toml::to_string_pretty(&default_config)
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
            fs::write(&config_path, content)?;
            tracing::info!("Wrote default configuration to {}", config_path.display());
            return Ok(default_config);
        }

        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Default configuration file location
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir()
            .ok_or_else(|| ConfigError::Invalid("Cannot determine home directory".to_string()))?;
        Ok(home.join(".aula").join("config.toml"))
    }

    /// Validate cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.core
            .bind_addr
            .parse::<SocketAddr>()
            .map_err(|_| {
                ConfigError::Invalid(format!("core.bind_addr is not an address: {}", self.core.bind_addr))
            })?;

        if self.sync.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sync.interval_secs must be at least 1".to_string(),
            ));
        }

        if self.sync.enabled && self.classroom.tracked_courses.is_empty() {
            tracing::warn!("Background sync enabled but classroom.tracked_courses is empty");
        }

        Ok(())
    }

    /// Expanded data directory
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        expand_home(&self.core.data_dir)
    }

    /// Path of the SQLite mirror database
    pub fn db_path(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.data_dir()?.join("aula.db"))
    }
}

/// Expand a leading ~ to the user's home directory
fn expand_home(path: &Path) -> Result<PathBuf, ConfigError> {
    if let Ok(rest) = path.strip_prefix("~") {
        let home = dirs::home_dir()
            .ok_or_else(|| ConfigError::Invalid("Cannot determine home directory".to_string()))?;
        return Ok(home.join(rest));
    }
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_applies_defaults() {
        let config: Config = toml::from_str(
            r#"
            [classroom]
            tracked_courses = ["820099525378"]
            "#,
        )
        .unwrap();

        assert_eq!(config.core.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.sync.interval_secs, 30);
        assert!(config.sync.enabled);
        assert_eq!(config.intent.language, "es");
        assert_eq!(config.classroom.tracked_courses, vec!["820099525378"]);
    }

    #[test]
    fn test_default_config_validates_and_roundtrips() {
        let config = Config::default();
        config.validate().unwrap();

        let serialized = toml::to_string_pretty(&config).unwrap();
        let reparsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(reparsed.core.bind_addr, config.core.bind_addr);
    }

    #[test]
    fn test_bad_bind_addr_is_rejected() {
        let config: Config = toml::from_str(
            r#"
            [core]
            bind_addr = "not-an-address"
            "#,
        )
        .unwrap();

        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let config: Config = toml::from_str(
            r#"
            [sync]
            interval_secs = 0
            "#,
        )
        .unwrap();

        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_static_access_token_parses() {
        let config: Config = toml::from_str(
            r#"
            [classroom.credentials]
            access_token = "dev-token"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.classroom.credentials.access_token.as_deref(),
            Some("dev-token")
        );
    }
}
