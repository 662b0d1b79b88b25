//! Configuration loading, validation, and management for inklink.
//!
//! Loads configuration from `~/.inklink/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use inklink_core::AutoContextOptions;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.inklink/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Active AI provider/model pairing
    #[serde(default)]
    pub ai: AiConfig,

    /// Context assembly settings
    #[serde(default)]
    pub context: ContextConfig,

    /// Where conversation reference lists are stored
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Location of the notes
    #[serde(default)]
    pub vault: VaultConfig,

    /// Context-window overrides keyed by `provider/model`
    #[serde(default)]
    pub model_limits: HashMap<String, usize>,
}

/// Provider and model used to resolve the context limit.
///
/// Both unset is a valid state: usage is then reported as zero against a
/// generic fallback limit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Pull documents the working document links to
    #[serde(default)]
    pub include_outgoing: bool,

    /// Pull documents linking to the working document
    #[serde(default)]
    pub include_backlinks: bool,

    /// Lines of the working document included in its excerpt
    #[serde(default = "default_excerpt_lines")]
    pub excerpt_lines: usize,

    /// Per-reference token cap; 0 disables truncation
    #[serde(default = "default_max_document_tokens")]
    pub max_document_tokens: usize,

    /// Text placed between rendered blocks
    #[serde(default = "default_separator")]
    pub separator: String,

    /// How long notices stay visible
    #[serde(default = "default_notice_duration_ms")]
    pub notice_duration_ms: u64,
}

fn default_excerpt_lines() -> usize {
    100
}
fn default_max_document_tokens() -> usize {
    8000
}
fn default_separator() -> String {
    "\n\n---\n\n".into()
}
fn default_notice_duration_ms() -> u64 {
    5000
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            include_outgoing: false,
            include_backlinks: false,
            excerpt_lines: default_excerpt_lines(),
            max_document_tokens: default_max_document_tokens(),
            separator: default_separator(),
            notice_duration_ms: default_notice_duration_ms(),
        }
    }
}

impl ContextConfig {
    pub fn auto_context_options(&self) -> AutoContextOptions {
        AutoContextOptions {
            include_outgoing: self.include_outgoing,
            include_backlinks: self.include_backlinks,
        }
    }

    pub fn notice_duration(&self) -> Duration {
        Duration::from_millis(self.notice_duration_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// "memory", "file", or "sqlite"
    #[serde(default = "default_persistence_backend")]
    pub backend: String,

    /// Override for the backend's storage path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_persistence_backend() -> String {
    "file".into()
}

const PERSISTENCE_BACKENDS: &[&str] = &["memory", "file", "sqlite"];

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: default_persistence_backend(),
            path: None,
        }
    }
}

impl PersistenceConfig {
    /// Storage path for the configured backend.
    pub fn resolved_path(&self) -> PathBuf {
        if let Some(path) = &self.path {
            return path.clone();
        }
        let file = match self.backend.as_str() {
            "sqlite" => "context.sqlite",
            _ => "context.jsonl",
        };
        AppConfig::config_dir().join(file)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.inklink/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `INKLINK_PROVIDER`
    /// - `INKLINK_MODEL`
    /// - `INKLINK_VAULT`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(provider) = std::env::var("INKLINK_PROVIDER") {
            config.ai.provider = Some(provider);
        }
        if let Ok(model) = std::env::var("INKLINK_MODEL") {
            config.ai.model = Some(model);
        }
        if let Ok(vault) = std::env::var("INKLINK_VAULT") {
            config.vault.path = Some(PathBuf::from(vault));
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".inklink")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.context.excerpt_lines == 0 {
            return Err(ConfigError::ValidationError(
                "context.excerpt_lines must be at least 1".into(),
            ));
        }

        if self.context.separator.is_empty() {
            return Err(ConfigError::ValidationError(
                "context.separator must not be empty".into(),
            ));
        }

        if !PERSISTENCE_BACKENDS.contains(&self.persistence.backend.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "persistence.backend must be one of {}, got '{}'",
                PERSISTENCE_BACKENDS.join(", "),
                self.persistence.backend
            )));
        }

        if let Some((key, _)) = self.model_limits.iter().find(|(_, limit)| **limit == 0) {
            return Err(ConfigError::ValidationError(format!(
                "model_limits.\"{key}\" must be greater than 0"
            )));
        }

        Ok(())
    }

    /// Whether a provider or model has been chosen.
    pub fn has_model(&self) -> bool {
        self.ai.provider.is_some() || self.ai.model.is_some()
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.context.excerpt_lines, 100);
        assert_eq!(config.persistence.backend, "file");
        assert!(!config.has_model());
        assert!(!config.context.auto_context_options().is_enabled());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.context.separator, config.context.separator);
        assert_eq!(parsed.persistence.backend, config.persistence.backend);
    }

    #[test]
    fn zero_excerpt_lines_rejected() {
        let mut config = AppConfig::default();
        config.context.excerpt_lines = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_backend_rejected() {
        let mut config = AppConfig::default();
        config.persistence.backend = "redis".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("redis"));
    }

    #[test]
    fn zero_model_limit_rejected() {
        let mut config = AppConfig::default();
        config.model_limits.insert("openai/tiny".into(), 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().persistence.backend, "file");
    }

    #[test]
    fn full_config_parsing() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(
            tmp,
            r#"
[ai]
provider = "anthropic"
model = "claude-sonnet-4"

[context]
include_outgoing = true
excerpt_lines = 40

[persistence]
backend = "sqlite"
path = "/tmp/ctx.sqlite"

[model_limits]
"anthropic/claude-sonnet-4" = 1000000
"#
        )
        .unwrap();

        let config = AppConfig::load_from(tmp.path()).unwrap();
        assert_eq!(config.ai.provider.as_deref(), Some("anthropic"));
        assert!(config.context.include_outgoing);
        assert!(!config.context.include_backlinks);
        assert_eq!(config.context.excerpt_lines, 40);
        assert_eq!(config.context.max_document_tokens, 8000);
        assert_eq!(
            config.persistence.resolved_path(),
            PathBuf::from("/tmp/ctx.sqlite")
        );
        assert_eq!(config.model_limits["anthropic/claude-sonnet-4"], 1_000_000);
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(tmp, "[context\nexcerpt_lines = ").unwrap();
        let err = AppConfig::load_from(tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("excerpt_lines = 100"));
        assert!(toml_str.contains("backend = \"file\""));
    }
}
