//! Configuration type definitions for Parley
//!
//! All types implement serde traits for TOML serialization and have sensible
//! defaults, so a missing or partial config file always yields a usable
//! configuration.

use serde::{Deserialize, Serialize};

/// Main configuration struct for Parley.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Agent loop settings (model, rounds, timeouts)
    pub agent: AgentDefaults,
    /// Context budget settings (window size, compaction)
    pub context: ContextDefaults,
    /// Provider settings (kind, credentials, endpoint)
    pub provider: ProviderConfig,
    /// Session persistence settings
    pub sessions: SessionsConfig,
}

/// Agent loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentDefaults {
    /// Default model to use
    pub model: String,
    /// Maximum tokens per model response
    pub max_tokens: u32,
    /// Temperature for generation
    pub temperature: f32,
    /// Maximum tool rounds per turn
    pub max_tool_rounds: u32,
    /// Timeout for a single model call, in seconds
    pub model_timeout_secs: u64,
    /// Timeout for a single tool invocation, in seconds
    pub tool_timeout_secs: u64,
    /// Workspace directory for tool execution ("~" expands to home)
    pub workspace: String,
    /// Override for the session system instruction
    pub system_prompt: Option<String>,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            max_tokens: 8192,
            temperature: 0.7,
            max_tool_rounds: 20,
            model_timeout_secs: 120,
            tool_timeout_secs: 60,
            workspace: "~/.parley/workspace".to_string(),
            system_prompt: None,
        }
    }
}

/// Context budget settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextDefaults {
    /// Maximum context window size in tokens
    pub max_context_tokens: usize,
    /// Fraction (0.0-1.0) of the window that triggers compaction
    pub compress_threshold: f64,
    /// How many recent messages keep full fidelity through compaction
    pub keep_recent_messages: usize,
}

impl Default for ContextDefaults {
    fn default() -> Self {
        Self {
            max_context_tokens: 100_000,
            compress_threshold: 0.8,
            keep_recent_messages: 8,
        }
    }
}

/// Provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider kind ("openai" is the only built-in adapter)
    pub kind: String,
    /// API key; falls back to the PARLEY_API_KEY / OPENAI_API_KEY env vars
    pub api_key: Option<String>,
    /// Custom API base URL for compatible backends
    pub api_base: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: "openai".to_string(),
            api_key: None,
            api_base: None,
        }
    }
}

/// Session persistence settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Directory for session files (default: ~/.parley/sessions)
    pub dir: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.agent.model, "gpt-4o");
        assert_eq!(config.agent.max_tool_rounds, 20);
        assert_eq!(config.context.max_context_tokens, 100_000);
        assert_eq!(config.provider.kind, "openai");
        assert!(config.sessions.dir.is_none());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [agent]
            model = "local-model"
            "#,
        )
        .unwrap();
        assert_eq!(config.agent.model, "local-model");
        // Everything else defaulted
        assert_eq!(config.agent.max_tokens, 8192);
        assert_eq!(config.context.keep_recent_messages, 8);
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default();
        let toml = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.agent.model, config.agent.model);
        assert_eq!(
            parsed.context.max_context_tokens,
            config.context.max_context_tokens
        );
    }
}
