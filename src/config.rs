use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, Result};
use crate::models::SessionContext;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Keep the last activated flow active across runs. When false every run
    /// opens a fresh session window and starts with no active flow.
    #[serde(default)]
    pub resume_active_flow: bool,

    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    #[serde(default = "default_preview_context")]
    pub preview_context: usize,

    #[serde(default = "default_rg_globs")]
    pub rg_globs: Vec<String>,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("waystation");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("waystation.db").to_string_lossy().to_string()
}

fn default_history_limit() -> usize {
    10
}

fn default_preview_context() -> usize {
    3
}

fn default_rg_globs() -> Vec<String> {
    vec!["!*lock".to_string()]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            resume_active_flow: false,
            history_limit: default_history_limit(),
            preview_context: default_preview_context(),
            rg_globs: default_rg_globs(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("waystation")
            .join("config.toml")
    }

    /// The session window this run resolves the active flow against.
    pub fn session(&self) -> SessionContext {
        if self.resume_active_flow {
            SessionContext::persistent()
        } else {
            SessionContext::starting_now()
        }
    }
}
