//! Parley - conversational agent runtime
//!
//! Parley drives multi-turn exchanges between a user, a language-model
//! backend, and a set of callable tools, keeping a bounded, consistent
//! conversation history per session.

pub mod agent;
pub mod config;
pub mod error;
pub mod events;
pub mod providers;
pub mod session;
pub mod tools;

pub use agent::{AgentLoop, ContextStore, TokenBudget};
pub use config::Config;
pub use error::{ParleyError, Result};
pub use events::AgentEvent;
pub use providers::{ChatOptions, ChatProvider, Completion, OpenAiProvider, ToolDefinition, Usage};
pub use session::{Message, Role, SessionRuntime, SessionStore, ToolCall};
pub use tools::{Tool, ToolContext, ToolRegistry, ToolResult, ToolSpec};
