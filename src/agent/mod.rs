//! Agent module - the conversation core
//!
//! This module holds the agent loop and the context management it drives:
//!
//! - Processing a user utterance into tool rounds and a final answer
//! - Owning the per-session history through the `ContextStore`
//! - Enforcing the tool-call ordering invariant on every append
//! - Compacting history against the token budget
//! - Emitting the turn's lifecycle events to an observer
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌──────────────┐
//! │   caller    │────>│  AgentLoop  │────>│ ChatProvider │
//! │ (channel)   │     │             │     │  (backend)   │
//! └─────────────┘     └─────────────┘     └──────────────┘
//!        ▲                   │
//!        │ events            ▼
//! ┌─────────────┐     ┌─────────────┐     ┌──────────────┐
//! │  observer   │<────│ ContextStore│     │ ToolRegistry │
//! │  (mpsc rx)  │     │ (1 runtime) │     │  (executor)  │
//! └─────────────┘     └─────────────┘     └──────────────┘
//! ```

pub mod compaction;
mod r#loop;
mod store;
pub mod tokens;

pub use r#loop::AgentLoop;
pub use store::{ContextStore, TokenBudget};
