//! Lifecycle events emitted by the agent loop
//!
//! Each chat turn produces a typed stream of events describing its progress:
//! the user's input, any "thinking" text the model produced alongside tool
//! calls, each tool call and its result, the final assistant response, and
//! turn-level errors. Channels subscribe to this stream to render the
//! conversation; emission is fire-and-forget and never affects the loop.

use serde::Serialize;
use serde_json::Value;

use crate::tools::ToolResult;

/// An event in the lifecycle of one chat turn.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// The raw user utterance that started the turn.
    UserInput { content: String },
    /// Assistant text produced alongside tool calls (before any tool runs).
    Thinking { content: String },
    /// The model requested a tool invocation.
    ToolCall {
        call_id: String,
        tool: String,
        arguments: Value,
    },
    /// A tool invocation finished.
    ToolResult { result: ToolResult },
    /// The final assistant answer for the turn.
    AssistantResponse { content: String },
    /// The turn failed or was truncated.
    Error { message: String },
}

impl AgentEvent {
    /// Create a user input event.
    pub fn user_input(content: &str) -> Self {
        Self::UserInput {
            content: content.to_string(),
        }
    }

    /// Create a thinking event (assistant text preceding tool calls).
    pub fn thinking(content: &str) -> Self {
        Self::Thinking {
            content: content.to_string(),
        }
    }

    /// Create a tool call event.
    pub fn tool_call(call_id: &str, tool: &str, arguments: Value) -> Self {
        Self::ToolCall {
            call_id: call_id.to_string(),
            tool: tool.to_string(),
            arguments,
        }
    }

    /// Create a tool result event.
    pub fn tool_result(result: ToolResult) -> Self {
        Self::ToolResult { result }
    }

    /// Create a final assistant response event.
    pub fn assistant_response(content: &str) -> Self {
        Self::AssistantResponse {
            content: content.to_string(),
        }
    }

    /// Create an error event.
    pub fn error(message: &str) -> Self {
        Self::Error {
            message: message.to_string(),
        }
    }
}
