//! Providers module - model backend abstraction
//!
//! The agent core talks to a `ChatProvider`: given the conversation history
//! and the tool schema, it returns text and/or tool-call requests. Concrete
//! adapters translate to a backend's wire format; the core treats every
//! provider as an untrusted black box.
//!
//! - `OpenAiProvider`: OpenAI-compatible chat-completions adapter (reqwest)
//! - `ScriptedProvider`: in-memory replay provider for tests

mod mock;
pub mod openai;
mod types;

pub use mock::ScriptedProvider;
pub use openai::OpenAiProvider;
pub use types::{ChatOptions, ChatProvider, Completion, ToolDefinition, Usage};
