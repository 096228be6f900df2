//! Tools module - capability definitions and execution
//!
//! This module provides the infrastructure for defining and executing tools
//! the model can call during conversations.
//!
//! # Overview
//!
//! - `Tool` trait: the interface all tools implement
//! - `ToolSpec`/`ParamSpec`: declarative parameter schemas, validated before
//!   a tool body ever runs
//! - `ToolResult`: the outcome handed back to the loop and the observer
//! - `ToolRegistry`: registration, schema presentation, isolated execution
//!
//! # Built-in Tools
//!
//! - `EchoTool`: simple echo tool for testing
//! - `ReadFileTool` / `WriteFileTool` / `ListDirTool` / `FindFilesTool`:
//!   workspace filesystem operations
//! - `ShellTool`: shell command execution
//!
//! # Example
//!
//! ```
//! use parley::tools::{EchoTool, ToolContext, ToolRegistry};
//! use parley::session::ToolCall;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let mut registry = ToolRegistry::new();
//! registry.register(Box::new(EchoTool)).unwrap();
//!
//! let call = ToolCall::new("call_1", "echo", json!({"message": "Hello!"}));
//! let result = registry.execute(&call, &ToolContext::new()).await;
//! assert_eq!(result.render(), "Hello!");
//! # });
//! ```

pub mod filesystem;
mod registry;
pub mod shell;
mod types;

pub use filesystem::{FindFilesTool, ListDirTool, ReadFileTool, WriteFileTool};
pub use registry::{ToolObserver, ToolRegistry};
pub use shell::ShellTool;
pub use types::{ParamKind, ParamSpec, Tool, ToolContext, ToolResult, ToolSpec};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// A simple echo tool for testing purposes.
///
/// # Example
///
/// ```
/// use parley::tools::{EchoTool, Tool, ToolContext};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let result = EchoTool
///     .execute(json!({"message": "Hello"}), &ToolContext::new())
///     .await;
/// assert_eq!(result.unwrap(), json!("Hello"));
/// # });
/// ```
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "echo",
            "Echoes back the provided message",
            vec![ParamSpec::required(
                "message",
                ParamKind::String,
                "The message to echo",
            )],
        )
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<Value> {
        let message = args
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("(no message)");
        Ok(Value::String(message.to_string()))
    }
}
