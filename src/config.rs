//! Configuration management for wsrelay.
//!
//! Secrets and the port come from the environment (`PORT`, `PASSWORD`,
//! `API_KEY`). Tunables for the completion call and the server live in an
//! optional settings file at `~/.config/wsrelay/config.toml`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable holding the port both sides use.
pub const PORT_VAR: &str = "PORT";
/// Environment variable holding the client's shared secret.
pub const PASSWORD_VAR: &str = "PASSWORD";
/// Environment variable holding the completion API credential.
pub const API_KEY_VAR: &str = "API_KEY";

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.You are a JSON-formatted AI assistant. \
For every question asked by the user, respond with a structured JSON object. The JSON object should:\
- Use the question as the key (in snake_case if applicable).\
- Provide a clear and concise answer as the value.\
Always return a valid JSON object. Do not include any text outside of the JSON format. ";

/// Errors raised while reading required values from the environment.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid {var} value {value:?}: expected a port number")]
    InvalidPort { var: &'static str, value: String },
}

/// Settings file contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Completion call parameters.
    #[serde(default)]
    pub completion: CompletionSettings,
    /// Server behaviour.
    #[serde(default)]
    pub server: ServerSettings,
}

/// Parameters of every completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionSettings {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Deadline for a single completion call.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            api_url: default_api_url(),
            timeout_secs: default_timeout_secs(),
            system_prompt: default_system_prompt(),
        }
    }
}

impl CompletionSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    150
}

fn default_api_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

/// How replies on one connection are scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyOrder {
    /// Every inbound message starts its own completion; replies may overtake
    /// each other.
    #[default]
    Concurrent,
    /// One completion at a time per connection; replies follow request order.
    Sequential,
}

/// Server behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_host")]
    pub bind_host: String,
    #[serde(default)]
    pub reply_order: ReplyOrder,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_host: default_bind_host(),
            reply_order: ReplyOrder::default(),
        }
    }
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

impl Settings {
    /// Get the config directory path.
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("wsrelay"))
            .context("Could not determine config directory")
    }

    /// Get the default settings file path.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load settings from `path`, or from the default location when `None`.
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    /// Write the settings to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }
}

/// Everything the client needs.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub port: u16,
    pub password: String,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            port: port_from(&lookup)?,
            password: required(&lookup, PASSWORD_VAR)?,
        })
    }
}

/// Everything the server needs.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub api_key: String,
    pub settings: Settings,
}

impl ServerConfig {
    pub fn from_env(settings: Settings) -> Result<Self, ConfigError> {
        Self::from_lookup(settings, |key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(settings: Settings, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            port: port_from(&lookup)?,
            api_key: required(&lookup, API_KEY_VAR)?,
            settings,
        })
    }

    /// Address the listener binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.settings.server.bind_host, self.port)
    }
}

fn required<F>(lookup: &F, var: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(var))
}

fn port_from<F>(lookup: &F) -> Result<u16, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = required(lookup, PORT_VAR)?;
    value.trim().parse().map_err(|_| ConfigError::InvalidPort {
        var: PORT_VAR,
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_client_config_from_env() {
        let config = ClientConfig::from_lookup(env(&[("PORT", "8080"), ("PASSWORD", "hunter2")])).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.password, "hunter2");
    }

    #[test]
    fn test_client_requires_password() {
        let err = ClientConfig::from_lookup(env(&[("PORT", "8080")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("PASSWORD"));
    }

    #[test]
    fn test_client_does_not_need_api_key() {
        assert!(ClientConfig::from_lookup(env(&[("PORT", "1"), ("PASSWORD", "x")])).is_ok());
    }

    #[test]
    fn test_server_requires_api_key() {
        let err = ServerConfig::from_lookup(Settings::default(), env(&[("PORT", "8080")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("API_KEY"));
    }

    #[test]
    fn test_missing_port() {
        let err = ServerConfig::from_lookup(Settings::default(), env(&[("API_KEY", "sk")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("PORT"));
    }

    #[test]
    fn test_invalid_port() {
        let err = ClientConfig::from_lookup(env(&[("PORT", "http"), ("PASSWORD", "x")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort { .. }));
        let err = ClientConfig::from_lookup(env(&[("PORT", "70000"), ("PASSWORD", "x")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort { .. }));
    }

    #[test]
    fn test_server_bind_addr() {
        let config = ServerConfig::from_lookup(Settings::default(), env(&[("PORT", "9000"), ("API_KEY", "sk")])).unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:9000");
        assert_eq!(config.api_key, "sk");
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.completion.model, "gpt-4o-mini");
        assert_eq!(settings.completion.max_tokens, 150);
        assert!((settings.completion.temperature - 0.7).abs() < f32::EPSILON);
        assert!(settings.completion.system_prompt.contains("JSON"));
        assert_eq!(settings.server.reply_order, ReplyOrder::Concurrent);
    }

    #[test]
    fn test_settings_deserialization() {
        let toml = r#"
[completion]
model = "gpt-4o"
timeout_secs = 5

[server]
reply_order = "sequential"
"#;
        let settings: Settings = toml::from_str(toml).unwrap();
        assert_eq!(settings.completion.model, "gpt-4o");
        assert_eq!(settings.completion.timeout(), Duration::from_secs(5));
        assert_eq!(settings.completion.max_tokens, 150);
        assert_eq!(settings.server.reply_order, ReplyOrder::Sequential);
        assert_eq!(settings.server.bind_host, "0.0.0.0");
    }

    #[test]
    fn test_unknown_reply_order_rejected() {
        let toml = "[server]\nreply_order = \"random\"\n";
        assert!(toml::from_str::<Settings>(toml).is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(settings.completion.model, "gpt-4o-mini");
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut settings = Settings::default();
        settings.server.reply_order = ReplyOrder::Sequential;
        settings.save(&path).unwrap();

        let loaded = Settings::load(Some(&path)).unwrap();
        assert_eq!(loaded.server.reply_order, ReplyOrder::Sequential);
    }
}
