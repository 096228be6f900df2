//! OpenAI-compatible provider adapter
//!
//! Implements the `ChatProvider` trait against the Chat Completions wire
//! format, which is also spoken by many self-hosted and proxy backends.
//! Handles message conversion, tool schemas, and lenient parsing of
//! model-supplied tool-call arguments.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{ParleyError, Result};
use crate::session::{Message, Role, ToolCall};

use super::{ChatOptions, ChatProvider, Completion, ToolDefinition, Usage};

/// The default API endpoint URL.
const OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// The default model to use.
const DEFAULT_MODEL: &str = "gpt-4o";

// ============================================================================
// Wire Request Types
// ============================================================================

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    /// Content may be null for assistant messages that only carry tool calls
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCallRequest>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct WireToolCallRequest {
    id: String,
    r#type: String,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    /// JSON-encoded arguments, per the wire format
    arguments: String,
}

#[derive(Debug, Serialize)]
struct WireTool {
    r#type: String,
    function: WireFunctionDef,
}

#[derive(Debug, Serialize)]
struct WireFunctionDef {
    name: String,
    description: String,
    parameters: Value,
}

// ============================================================================
// Wire Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCallResponse>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCallResponse {
    id: String,
    function: WireFunctionCall,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

// ============================================================================
// Provider
// ============================================================================

/// Provider adapter for OpenAI-compatible chat-completions backends.
pub struct OpenAiProvider {
    /// API key for authentication
    api_key: String,
    /// API base URL
    api_base: String,
    /// HTTP client for making requests
    client: Client,
}

impl OpenAiProvider {
    /// Create a new provider with the given API key and the default endpoint.
    ///
    /// # Example
    /// ```
    /// use parley::providers::{ChatProvider, OpenAiProvider};
    ///
    /// let provider = OpenAiProvider::new("sk-xxx");
    /// assert_eq!(provider.name(), "openai");
    /// ```
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_base: OPENAI_API_URL.to_string(),
            client: Client::new(),
        }
    }

    /// Create a provider with a custom base URL.
    ///
    /// Useful for compatible APIs (Azure, proxies, local models).
    ///
    /// # Example
    /// ```
    /// use parley::providers::OpenAiProvider;
    ///
    /// let provider = OpenAiProvider::with_base_url("sk-xxx", "https://my-api.com/v1/");
    /// ```
    pub fn with_base_url(api_key: &str, api_base: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    fn convert_messages(messages: Vec<Message>) -> Vec<WireMessage> {
        messages
            .into_iter()
            .map(|msg| {
                let tool_calls = msg.tool_calls.as_ref().map(|calls| {
                    calls
                        .iter()
                        .map(|tc| WireToolCallRequest {
                            id: tc.id.clone(),
                            r#type: "function".to_string(),
                            function: WireFunctionCall {
                                name: tc.name.clone(),
                                arguments: tc.arguments.to_string(),
                            },
                        })
                        .collect()
                });

                // Assistant messages that only carry tool calls send null content
                let content = if msg.role == Role::Assistant
                    && msg.content.is_empty()
                    && tool_calls.is_some()
                {
                    None
                } else {
                    Some(msg.content.clone())
                };

                WireMessage {
                    role: msg.role.to_string(),
                    content,
                    tool_calls,
                    tool_call_id: msg.tool_call_id.clone(),
                }
            })
            .collect()
    }

    fn convert_tools(tools: Vec<ToolDefinition>) -> Option<Vec<WireTool>> {
        if tools.is_empty() {
            return None;
        }
        Some(
            tools
                .into_iter()
                .map(|t| WireTool {
                    r#type: "function".to_string(),
                    function: WireFunctionDef {
                        name: t.name,
                        description: t.description,
                        parameters: t.parameters,
                    },
                })
                .collect(),
        )
    }

    /// Parse wire arguments leniently.
    ///
    /// Models occasionally emit malformed JSON; the loop treats that as an
    /// expected condition, so an unparseable payload degrades to an empty
    /// object rather than failing the whole completion.
    fn parse_arguments(name: &str, raw: &str) -> Value {
        if raw.trim().is_empty() {
            return json!({});
        }
        match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(tool = name, error = %e, "Malformed tool-call arguments from model");
                json!({})
            }
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    async fn complete(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        options: &ChatOptions,
    ) -> Result<Completion> {
        let model = options
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let request = WireRequest {
            model,
            messages: Self::convert_messages(messages),
            tools: Self::convert_tools(tools),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            top_p: options.top_p,
        };

        let url = format!("{}/chat/completions", self.api_base);
        debug!(url = %url, "Requesting completion");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| {
                    v.pointer("/error/message")
                        .and_then(|m| m.as_str())
                        .map(String::from)
                })
                .unwrap_or(body);
            return Err(ParleyError::Provider(format!(
                "completion request failed with status {}: {}",
                status, detail
            )));
        }

        let wire: WireResponse = response.json().await?;
        let choice = wire
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ParleyError::Provider("response contained no choices".to_string()))?;

        let content = choice.message.content.unwrap_or_default();
        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| {
                let arguments = Self::parse_arguments(&tc.function.name, &tc.function.arguments);
                ToolCall::new(&tc.id, &tc.function.name, arguments)
            })
            .collect();

        let mut completion = Completion {
            content,
            tool_calls,
            usage: None,
        };
        if let Some(usage) = wire.usage {
            completion = completion.with_usage(Usage::new(usage.prompt_tokens, usage.completion_tokens));
        }
        Ok(completion)
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> &str {
        DEFAULT_MODEL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_name_and_default_model() {
        let provider = OpenAiProvider::new("sk-test");
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.default_model(), "gpt-4o");
    }

    #[test]
    fn test_with_base_url_trims_trailing_slash() {
        let provider = OpenAiProvider::with_base_url("sk-test", "https://example.com/v1/");
        assert_eq!(provider.api_base, "https://example.com/v1");
    }

    #[test]
    fn test_convert_messages_plain() {
        let messages = vec![Message::system("Be helpful."), Message::user("Hi")];
        let wire = OpenAiProvider::convert_messages(messages);

        assert_eq!(wire.len(), 2);
        assert_eq!(wire[0].role, "system");
        assert_eq!(wire[0].content.as_deref(), Some("Be helpful."));
        assert_eq!(wire[1].role, "user");
    }

    #[test]
    fn test_convert_messages_tool_roundtrip_shape() {
        let messages = vec![
            Message::assistant_with_tools(
                "",
                vec![ToolCall::new("call_1", "add", json!({"a": 1, "b": 2}))],
            ),
            Message::tool_result("call_1", "3"),
        ];
        let wire = OpenAiProvider::convert_messages(messages);

        // Tool-call-only assistant messages send null content
        assert_eq!(wire[0].role, "assistant");
        assert!(wire[0].content.is_none());
        let calls = wire[0].tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].function.name, "add");
        let parsed: Value = serde_json::from_str(&calls[0].function.arguments).unwrap();
        assert_eq!(parsed["b"], 2);

        assert_eq!(wire[1].role, "tool");
        assert_eq!(wire[1].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(wire[1].content.as_deref(), Some("3"));
    }

    #[test]
    fn test_convert_tools_empty_is_none() {
        assert!(OpenAiProvider::convert_tools(vec![]).is_none());
    }

    #[test]
    fn test_convert_tools_shape() {
        let tools = vec![ToolDefinition::new(
            "echo",
            "Echo a message",
            json!({"type": "object", "properties": {}}),
        )];
        let wire = OpenAiProvider::convert_tools(tools).unwrap();
        assert_eq!(wire.len(), 1);
        assert_eq!(wire[0].r#type, "function");
        assert_eq!(wire[0].function.name, "echo");
    }

    #[test]
    fn test_parse_arguments_valid() {
        let parsed = OpenAiProvider::parse_arguments("add", r#"{"a": 2}"#);
        assert_eq!(parsed["a"], 2);
    }

    #[test]
    fn test_parse_arguments_malformed_degrades_to_empty() {
        let parsed = OpenAiProvider::parse_arguments("add", "{not json");
        assert_eq!(parsed, json!({}));
    }

    #[test]
    fn test_parse_arguments_empty_string() {
        let parsed = OpenAiProvider::parse_arguments("ping", "");
        assert_eq!(parsed, json!({}));
    }

    #[test]
    fn test_wire_request_serialization_skips_none() {
        let request = WireRequest {
            model: "gpt-4o".to_string(),
            messages: vec![],
            tools: None,
            max_tokens: None,
            temperature: None,
            top_p: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("tools"));
        assert!(!json.contains("max_tokens"));
    }

    #[test]
    fn test_wire_response_parsing() {
        let body = r#"{
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "echo", "arguments": "{\"message\": \"hi\"}"}
                    }]
                }
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"#;
        let wire: WireResponse = serde_json::from_str(body).unwrap();
        let choice = &wire.choices[0];
        assert!(choice.message.content.is_none());
        assert_eq!(
            choice.message.tool_calls.as_ref().unwrap()[0].function.name,
            "echo"
        );
        assert_eq!(wire.usage.unwrap().prompt_tokens, 10);
    }
}
