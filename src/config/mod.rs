//! Configuration management for Parley
//!
//! Configuration is loaded from `~/.parley/config.toml` with environment
//! variable overrides (`PARLEY_*`). A process-wide instance can be installed
//! once and read from anywhere.

mod types;

pub use types::*;

use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};

use crate::error::{ParleyError, Result};

/// Global configuration instance
static CONFIG: OnceCell<Config> = OnceCell::new();

impl Config {
    /// Returns the Parley configuration directory path (~/.parley).
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".parley")
    }

    /// Returns the path to the config file (~/.parley/config.toml).
    pub fn path() -> PathBuf {
        Self::dir().join("config.toml")
    }

    /// Load configuration from the default path with environment overrides.
    ///
    /// If the config file doesn't exist, returns default configuration.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::path())
    }

    /// Load configuration from a specific path with environment overrides.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)
                .map_err(|e| ParleyError::Config(format!("invalid config file: {}", e)))?
        } else {
            Config::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("PARLEY_AGENT_MODEL") {
            self.agent.model = val;
        }
        if let Ok(val) = std::env::var("PARLEY_AGENT_MAX_TOOL_ROUNDS") {
            if let Ok(v) = val.parse() {
                self.agent.max_tool_rounds = v;
            }
        }
        if let Ok(val) = std::env::var("PARLEY_AGENT_WORKSPACE") {
            self.agent.workspace = val;
        }
        if let Ok(val) = std::env::var("PARLEY_CONTEXT_MAX_TOKENS") {
            if let Ok(v) = val.parse() {
                self.context.max_context_tokens = v;
            }
        }
        if let Ok(val) = std::env::var("PARLEY_PROVIDER_API_BASE") {
            self.provider.api_base = Some(val);
        }
        if let Ok(val) = std::env::var("PARLEY_API_KEY").or_else(|_| std::env::var("OPENAI_API_KEY"))
        {
            self.provider.api_key = Some(val);
        }
    }

    /// Save this configuration to the default path.
    pub fn save(&self) -> Result<()> {
        std::fs::create_dir_all(Self::dir())?;
        let content = toml::to_string_pretty(self)
            .map_err(|e| ParleyError::Config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(Self::path(), content)?;
        Ok(())
    }

    /// The workspace path with a leading `~` expanded to the home directory.
    pub fn workspace_path(&self) -> PathBuf {
        expand_home(&self.agent.workspace)
    }

    /// The sessions directory, honoring the config override.
    pub fn sessions_dir(&self) -> PathBuf {
        match &self.sessions.dir {
            Some(dir) => expand_home(dir),
            None => Self::dir().join("sessions"),
        }
    }

    /// Install this configuration as the process-wide instance.
    ///
    /// Returns an error if one was already installed.
    pub fn set_global(self) -> Result<()> {
        CONFIG
            .set(self)
            .map_err(|_| ParleyError::Config("global config already installed".to_string()))
    }

    /// The process-wide configuration, if one has been installed.
    pub fn global() -> Option<&'static Config> {
        CONFIG.get()
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
