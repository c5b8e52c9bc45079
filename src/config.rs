use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

use crate::ollama::DEFAULT_BASE_URL;

pub const DEFAULT_MODEL: &str = "llama3.2";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 512;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Send the whole conversation with each chat request instead of only the latest message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_history: Option<bool>,
}

/// Values from the command line that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Fully resolved settings the app runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub send_history: bool,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    pub fn save_default_model(config_path: &Path, model: &str) -> Result<()> {
        let mut config = Self::load_from(config_path).unwrap_or_else(|_| Self::new());
        config.default_model = Some(model.to_string());
        config.save_to(config_path)
    }

    pub fn resolve(&self, overrides: &Overrides) -> Settings {
        Settings {
            base_url: overrides
                .base_url
                .clone()
                .or_else(|| self.base_url.clone())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: overrides
                .model
                .clone()
                .or_else(|| self.default_model.clone())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: overrides
                .temperature
                .or(self.temperature)
                .unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: overrides
                .max_tokens
                .or(self.max_tokens)
                .unwrap_or(DEFAULT_MAX_TOKENS),
            send_history: self.send_history.unwrap_or(false),
        }
    }

    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("ollama-panel").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::new());

        let settings = config.resolve(&Overrides::default());
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
        assert_eq!(settings.model, DEFAULT_MODEL);
        assert_eq!(settings.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(settings.max_tokens, DEFAULT_MAX_TOKENS);
        assert!(!settings.send_history);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            base_url: Some("http://127.0.0.1:9000".to_string()),
            default_model: Some("mistral".to_string()),
            send_history: Some(true),
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_save_default_model_keeps_other_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        Config {
            base_url: Some("http://127.0.0.1:9000".to_string()),
            ..Config::default()
        }
        .save_to(&path)
        .unwrap();

        Config::save_default_model(&path, "mistral").unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.default_model.as_deref(), Some("mistral"));
        assert_eq!(loaded.base_url.as_deref(), Some("http://127.0.0.1:9000"));
    }

    #[test]
    fn test_cli_overrides_win() {
        let config = Config {
            base_url: Some("http://from-config:1".to_string()),
            default_model: Some("from-config".to_string()),
            temperature: Some(1.2),
            max_tokens: Some(128),
            send_history: None,
        };
        let overrides = Overrides {
            model: Some("from-cli".to_string()),
            max_tokens: Some(32),
            ..Overrides::default()
        };

        let settings = config.resolve(&overrides);
        assert_eq!(settings.base_url, "http://from-config:1");
        assert_eq!(settings.model, "from-cli");
        assert_eq!(settings.temperature, 1.2);
        assert_eq!(settings.max_tokens, 32);
    }

    #[test]
    fn test_invalid_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
