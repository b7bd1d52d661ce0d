use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{AssistantError, AssistantResult};

/// Lighter model used for normal chat turns and content generation.
pub const DEFAULT_CHAT_MODEL: &str = "gemini-3-flash-preview";
/// Higher-capability model enabled by deep-analysis mode.
pub const DEFAULT_DEEP_MODEL: &str = "gemini-3-pro-preview";
/// Native-audio model for the realtime voice session.
pub const DEFAULT_VOICE_MODEL: &str = "gemini-2.5-flash-native-audio-preview-09-2025";
/// Fixed voice identity for audio responses.
pub const DEFAULT_VOICE_NAME: &str = "Kore";

/// Configuration for the assistant
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AssistantConfig {
    pub api_key: Option<String>,
    pub chat_model: Option<String>,
    pub deep_model: Option<String>,
    pub voice_model: Option<String>,
    pub voice_name: Option<String>,
    /// Override for the API base URL, used by tests and proxies.
    pub api_base_url: Option<String>,
    pub max_retries: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
    pub save_history: Option<bool>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            chat_model: Some(DEFAULT_CHAT_MODEL.to_string()),
            deep_model: Some(DEFAULT_DEEP_MODEL.to_string()),
            voice_model: Some(DEFAULT_VOICE_MODEL.to_string()),
            voice_name: Some(DEFAULT_VOICE_NAME.to_string()),
            api_base_url: None,
            max_retries: Some(3),
            initial_backoff_ms: Some(2000),
            save_history: Some(true),
        }
    }
}

impl AssistantConfig {
    /// Loads configuration from a file if it exists, otherwise returns the
    /// default config.
    pub fn load_from_file(path: &Path) -> AssistantResult<Self> {
        if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                AssistantError::Config(format!("Failed to read config file: {}", e))
            })?;

            let config: Self = toml::from_str(&content).map_err(|e| {
                AssistantError::Config(format!("Failed to parse config file: {}", e))
            })?;

            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Saves configuration to a file, creating the parent directory if
    /// needed.
    pub fn save_to_file(&self, path: &Path) -> AssistantResult<()> {
        let content = toml::to_string(self)
            .map_err(|e| AssistantError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AssistantError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        fs::write(path, content)
            .map_err(|e| AssistantError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Merges this config with another, preferring values from `other` when
    /// present.
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            api_key: other.api_key.clone().or_else(|| self.api_key.clone()),
            chat_model: other.chat_model.clone().or_else(|| self.chat_model.clone()),
            deep_model: other.deep_model.clone().or_else(|| self.deep_model.clone()),
            voice_model: other
                .voice_model
                .clone()
                .or_else(|| self.voice_model.clone()),
            voice_name: other.voice_name.clone().or_else(|| self.voice_name.clone()),
            api_base_url: other
                .api_base_url
                .clone()
                .or_else(|| self.api_base_url.clone()),
            max_retries: other.max_retries.or(self.max_retries),
            initial_backoff_ms: other.initial_backoff_ms.or(self.initial_backoff_ms),
            save_history: other.save_history.or(self.save_history),
        }
    }

    /// Applies `GEMINI_API_KEY` from the environment (after a best-effort
    /// `.env` load) when the file config carries no key.
    pub fn with_env_overrides(mut self) -> Self {
        let _ = dotenvy::dotenv();
        if self.api_key.is_none() {
            self.api_key = std::env::var("GEMINI_API_KEY").ok();
        }
        self
    }

    /// Model name for a chat turn given the analysis mode.
    pub fn chat_model_for(&self, deep_analysis: bool) -> String {
        if deep_analysis {
            self.deep_model
                .clone()
                .unwrap_or_else(|| DEFAULT_DEEP_MODEL.to_string())
        } else {
            self.chat_model
                .clone()
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string())
        }
    }
}

/// Helper function to get the default config directory
pub fn get_default_config_dir(app_name: &str) -> AssistantResult<PathBuf> {
    let home_dir = dirs::home_dir().ok_or_else(|| {
        AssistantError::Config("Could not determine home directory".to_string())
    })?;

    Ok(home_dir.join(".config").join(app_name))
}

/// Helper function to get the default config file path
pub fn get_default_config_file(app_name: &str) -> AssistantResult<PathBuf> {
    let config_dir = get_default_config_dir(app_name)?;
    Ok(config_dir.join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_model_names() {
        let config = AssistantConfig::default();
        assert_eq!(config.chat_model.as_deref(), Some(DEFAULT_CHAT_MODEL));
        assert_eq!(config.voice_name.as_deref(), Some(DEFAULT_VOICE_NAME));
        assert!(config.api_key.is_none());
    }

    #[test]
    fn missing_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = AssistantConfig::load_from_file(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.max_retries, Some(3));
    }

    #[test]
    fn save_and_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = AssistantConfig {
            api_key: Some("secret".to_string()),
            max_retries: Some(1),
            ..AssistantConfig::default()
        };
        config.save_to_file(&path).unwrap();

        let loaded = AssistantConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.api_key.as_deref(), Some("secret"));
        assert_eq!(loaded.max_retries, Some(1));
    }

    #[test]
    fn merge_prefers_other() {
        let base = AssistantConfig::default();
        let override_cfg = AssistantConfig {
            api_key: Some("from-other".to_string()),
            chat_model: None,
            ..AssistantConfig::default()
        };
        let merged = base.merge(&override_cfg);
        assert_eq!(merged.api_key.as_deref(), Some("from-other"));
        assert_eq!(merged.chat_model.as_deref(), Some(DEFAULT_CHAT_MODEL));
    }

    #[test]
    fn model_selection_follows_analysis_mode() {
        let config = AssistantConfig::default();
        assert_eq!(config.chat_model_for(false), DEFAULT_CHAT_MODEL);
        assert_eq!(config.chat_model_for(true), DEFAULT_DEEP_MODEL);
    }
}
