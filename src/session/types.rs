//! Session types for Parley
//!
//! This module defines the core types for conversation state: messages,
//! roles, tool calls, and the per-session runtime bundle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default system instruction for a freshly created session.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Parley, a conversational assistant.\n\n\
You have access to tools to help accomplish tasks. Use them when needed.\n\n\
Be concise but helpful. Focus on completing the user's request efficiently.";

/// A single message in a conversation.
///
/// Messages can be from users, assistants, system prompts, or tool results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message sender
    pub role: Role,
    /// The text content of the message (may be empty when the message only
    /// carries tool calls)
    pub content: String,
    /// Tool calls made by the assistant (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// ID of the tool call this message is responding to (tool role only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// Create a new user message.
    ///
    /// # Example
    /// ```
    /// use parley::session::{Message, Role};
    ///
    /// let msg = Message::user("Hello, assistant!");
    /// assert_eq!(msg.role, Role::User);
    /// ```
    pub fn user(content: &str) -> Self {
        Self {
            role: Role::User,
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: &str) -> Self {
        Self {
            role: Role::Assistant,
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a new system message.
    ///
    /// System messages carry prompts and instructions.
    pub fn system(content: &str) -> Self {
        Self {
            role: Role::System,
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a new tool result message answering a specific call.
    ///
    /// # Example
    /// ```
    /// use parley::session::{Message, Role};
    ///
    /// let msg = Message::tool_result("call_123", "42");
    /// assert_eq!(msg.role, Role::Tool);
    /// assert_eq!(msg.tool_call_id.as_deref(), Some("call_123"));
    /// ```
    pub fn tool_result(tool_call_id: &str, content: &str) -> Self {
        Self {
            role: Role::Tool,
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.to_string()),
        }
    }

    /// Create an assistant message carrying tool calls.
    ///
    /// # Example
    /// ```
    /// use parley::session::{Message, ToolCall};
    /// use serde_json::json;
    ///
    /// let call = ToolCall::new("call_1", "search", json!({"query": "rust"}));
    /// let msg = Message::assistant_with_tools("Let me look that up.", vec![call]);
    /// assert!(msg.has_tool_calls());
    /// ```
    pub fn assistant_with_tools(content: &str, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.to_string(),
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    /// Check if this message carries at least one tool call.
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls
            .as_ref()
            .map(|tc| !tc.is_empty())
            .unwrap_or(false)
    }

    /// Check if this is a tool result message.
    pub fn is_tool_result(&self) -> bool {
        self.role == Role::Tool && self.tool_call_id.is_some()
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompts and instructions
    System,
    /// Messages from the user
    User,
    /// Messages from the AI assistant
    Assistant,
    /// Results from tool executions
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A tool invocation requested by the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call
    pub id: String,
    /// Name of the tool to call
    pub name: String,
    /// Structured argument payload for the tool
    pub arguments: Value,
}

impl ToolCall {
    /// Create a new tool call.
    ///
    /// # Example
    /// ```
    /// use parley::session::ToolCall;
    /// use serde_json::json;
    ///
    /// let call = ToolCall::new("call_123", "web_search", json!({"query": "rust"}));
    /// assert_eq!(call.name, "web_search");
    /// ```
    pub fn new(id: &str, name: &str, arguments: Value) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            arguments,
        }
    }

    /// Parse the arguments into a concrete type.
    pub fn parse_arguments<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.arguments.clone())
    }
}

/// Per-session state bundle: identity, history, capabilities, and metadata.
///
/// This is plain data with no behavior beyond construction; all mutation
/// flows through the `ContextStore` that currently owns it. Runtimes are
/// persisted and loaded wholesale by the session store and swapped wholesale
/// on session switch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRuntime {
    /// Stable identifier for this session
    pub session_id: String,
    /// Ordered conversation history (append-only via the context store)
    pub history: Vec<Message>,
    /// Names of the capabilities currently loaded for this session
    #[serde(default)]
    pub loaded_tools: Vec<String>,
    /// Free-form system instruction presented ahead of the history
    pub system_prompt: String,
    /// Running token estimate for the history
    #[serde(default)]
    pub token_estimate: usize,
    /// When this session was created
    pub created_at: DateTime<Utc>,
    /// When this session was last modified
    pub updated_at: DateTime<Utc>,
}

impl SessionRuntime {
    /// Create a new empty runtime with the given session id.
    ///
    /// # Example
    /// ```
    /// use parley::session::SessionRuntime;
    ///
    /// let runtime = SessionRuntime::new("cli:main");
    /// assert!(runtime.history.is_empty());
    /// assert_eq!(runtime.session_id, "cli:main");
    /// ```
    pub fn new(session_id: &str) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.to_string(),
            history: Vec::new(),
            loaded_tools: Vec::new(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            token_estimate: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a new runtime with a generated UUID v4 session id.
    pub fn generate() -> Self {
        Self::new(&uuid::Uuid::new_v4().to_string())
    }

    /// Set the system instruction (builder pattern).
    pub fn with_system_prompt(mut self, prompt: &str) -> Self {
        self.system_prompt = prompt.to_string();
        self
    }

    /// Record a modification timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Get the number of messages in this session's history.
    pub fn message_count(&self) -> usize {
        self.history.len()
    }

    /// Check if this session has no history.
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_user() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello");
        assert!(msg.tool_calls.is_none());
        assert!(msg.tool_call_id.is_none());
    }

    #[test]
    fn test_message_assistant() {
        let msg = Message::assistant("Hi there");
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.content, "Hi there");
    }

    #[test]
    fn test_message_system() {
        let msg = Message::system("You are helpful");
        assert_eq!(msg.role, Role::System);
        assert_eq!(msg.content, "You are helpful");
    }

    #[test]
    fn test_message_tool_result() {
        let msg = Message::tool_result("call_123", "Success");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.content, "Success");
        assert_eq!(msg.tool_call_id, Some("call_123".to_string()));
        assert!(msg.is_tool_result());
    }

    #[test]
    fn test_message_with_tool_calls() {
        let call = ToolCall::new("call_1", "search", json!({"q": "test"}));
        let msg = Message::assistant_with_tools("Searching...", vec![call]);

        assert!(msg.has_tool_calls());
        let calls = msg.tool_calls.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "search");
    }

    #[test]
    fn test_empty_tool_calls_not_counted() {
        let msg = Message::assistant_with_tools("no calls", vec![]);
        assert!(!msg.has_tool_calls());
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::System.to_string(), "system");
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.to_string(), "assistant");
        assert_eq!(Role::Tool.to_string(), "tool");
    }

    #[test]
    fn test_role_serialize() {
        let json = serde_json::to_string(&Role::User).unwrap();
        assert_eq!(json, r#""user""#);

        let parsed: Role = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Role::User);
    }

    #[test]
    fn test_tool_call_parse_arguments() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct SearchArgs {
            query: String,
        }

        let call = ToolCall::new("call_1", "search", json!({"query": "rust"}));
        let args: SearchArgs = call.parse_arguments().unwrap();
        assert_eq!(args.query, "rust");
    }

    #[test]
    fn test_message_serialization_skips_none() {
        let msg = Message::user("Hello");
        let json = serde_json::to_string(&msg).unwrap();

        // tool_calls and tool_call_id should not be in JSON when None
        assert!(!json.contains("tool_calls"));
        assert!(!json.contains("tool_call_id"));
    }

    #[test]
    fn test_runtime_new() {
        let runtime = SessionRuntime::new("test-session");
        assert_eq!(runtime.session_id, "test-session");
        assert!(runtime.history.is_empty());
        assert!(runtime.loaded_tools.is_empty());
        assert_eq!(runtime.token_estimate, 0);
        assert_eq!(runtime.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert!(runtime.created_at <= runtime.updated_at);
    }

    #[test]
    fn test_runtime_generate_unique_ids() {
        let a = SessionRuntime::generate();
        let b = SessionRuntime::generate();
        assert_ne!(a.session_id, b.session_id);
    }

    #[test]
    fn test_runtime_with_system_prompt() {
        let runtime = SessionRuntime::new("test").with_system_prompt("Be terse.");
        assert_eq!(runtime.system_prompt, "Be terse.");
    }

    #[test]
    fn test_runtime_serialization_roundtrip() {
        let mut runtime = SessionRuntime::new("round-trip");
        runtime.history.push(Message::user("Hello"));
        runtime.history.push(Message::assistant_with_tools(
            "",
            vec![ToolCall::new("call_1", "echo", json!({"message": "hi"}))],
        ));
        runtime.history.push(Message::tool_result("call_1", "hi"));
        runtime.loaded_tools.push("echo".to_string());

        let json = serde_json::to_string(&runtime).unwrap();
        let parsed: SessionRuntime = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.session_id, "round-trip");
        assert_eq!(parsed.history.len(), 3);
        assert!(parsed.history[1].has_tool_calls());
        assert!(parsed.history[2].is_tool_result());
        assert_eq!(parsed.loaded_tools, vec!["echo".to_string()]);
    }

    #[test]
    fn test_runtime_helpers() {
        let mut runtime = SessionRuntime::new("test");
        assert!(runtime.is_empty());
        assert_eq!(runtime.message_count(), 0);

        runtime.history.push(Message::user("Hello"));
        assert!(!runtime.is_empty());
        assert_eq!(runtime.message_count(), 1);
    }
}
