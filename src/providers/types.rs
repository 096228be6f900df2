//! Provider types for Parley
//!
//! This module defines the model abstraction: the `ChatProvider` trait,
//! completion options, and the unified completion response.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::session::{Message, ToolCall};

/// Definition of a tool as presented to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The name of the tool (unique within a registry)
    pub name: String,
    /// Human-readable description of what the tool does
    pub description: String,
    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// Create a new tool definition.
    ///
    /// # Example
    /// ```
    /// use parley::providers::ToolDefinition;
    /// use serde_json::json;
    ///
    /// let def = ToolDefinition::new(
    ///     "web_search",
    ///     "Search the web for information",
    ///     json!({
    ///         "type": "object",
    ///         "properties": { "query": { "type": "string" } },
    ///         "required": ["query"]
    ///     }),
    /// );
    /// assert_eq!(def.name, "web_search");
    /// ```
    pub fn new(name: &str, description: &str, parameters: serde_json::Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }
}

/// Trait for model backends.
///
/// Implement this to add support for a new provider. The provider translates
/// between Parley's message format and the backend's wire format. Transport
/// and rate-limit failures are surfaced as errors; the agent loop does not
/// retry them — retry policy, if any, belongs to the adapter.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Request a completion for the given history and tool schema.
    async fn complete(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        options: &ChatOptions,
    ) -> Result<Completion>;

    /// Get the provider name (e.g. "openai").
    fn name(&self) -> &str;

    /// Get the default model for this provider.
    fn default_model(&self) -> &str;
}

/// Options for completion requests.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    /// Model override (provider default when None)
    pub model: Option<String>,
    /// Maximum number of tokens to generate
    pub max_tokens: Option<u32>,
    /// Temperature for sampling
    pub temperature: Option<f32>,
    /// Nucleus sampling parameter
    pub top_p: Option<f32>,
}

impl ChatOptions {
    /// Create new default chat options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the model to use.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    /// Set the maximum number of tokens to generate.
    ///
    /// # Example
    /// ```
    /// use parley::providers::ChatOptions;
    ///
    /// let options = ChatOptions::new().with_max_tokens(1000);
    /// assert_eq!(options.max_tokens, Some(1000));
    /// ```
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the temperature for sampling.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the top_p (nucleus sampling) parameter.
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }
}

/// Unified response from a completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    /// Text content of the response (may be empty alongside tool calls)
    pub content: String,
    /// Tool invocations requested by the model (if any)
    pub tool_calls: Vec<ToolCall>,
    /// Token usage information (if reported by the backend)
    pub usage: Option<Usage>,
}

impl Completion {
    /// Create a plain text completion with no tool calls.
    ///
    /// # Example
    /// ```
    /// use parley::providers::Completion;
    ///
    /// let completion = Completion::text("Hello, world!");
    /// assert!(!completion.has_tool_calls());
    /// ```
    pub fn text(content: &str) -> Self {
        Self {
            content: content.to_string(),
            tool_calls: vec![],
            usage: None,
        }
    }

    /// Create a completion that requests tool invocations.
    ///
    /// # Example
    /// ```
    /// use parley::providers::Completion;
    /// use parley::session::ToolCall;
    /// use serde_json::json;
    ///
    /// let call = ToolCall::new("call_1", "search", json!({"query": "rust"}));
    /// let completion = Completion::with_tools("Searching...", vec![call]);
    /// assert!(completion.has_tool_calls());
    /// ```
    pub fn with_tools(content: &str, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: content.to_string(),
            tool_calls,
            usage: None,
        }
    }

    /// Check if this completion requests any tool invocations.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Attach usage information (builder pattern).
    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// Token usage information from a completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    /// Number of tokens in the prompt
    pub prompt_tokens: u32,
    /// Number of tokens in the completion
    pub completion_tokens: u32,
    /// Total tokens used (prompt + completion)
    pub total_tokens: u32,
}

impl Usage {
    /// Create new usage information.
    ///
    /// # Example
    /// ```
    /// use parley::providers::Usage;
    ///
    /// let usage = Usage::new(100, 50);
    /// assert_eq!(usage.total_tokens, 150);
    /// ```
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}
