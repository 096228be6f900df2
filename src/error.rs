//! Error types for Parley
//!
//! This module defines all error types used throughout the runtime.
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.

use thiserror::Error;

/// The primary error type for Parley operations.
#[derive(Error, Debug)]
pub enum ParleyError {
    /// Configuration-related errors (invalid config, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider errors (API failures, rate limits, timeouts, etc.)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Tool execution errors raised by tool bodies.
    ///
    /// The executor converts these into failed `ToolResult`s at its boundary;
    /// they never escape a `ToolRegistry::execute` call.
    #[error("Tool error: {0}")]
    Tool(String),

    /// A tool with the same name is already registered.
    #[error("Duplicate tool: {0}")]
    DuplicateTool(String),

    /// Conversation ordering invariant violation: a tool message that does
    /// not answer a pending call of the nearest preceding assistant message.
    /// These indicate integration defects and fail fast.
    #[error("Invalid message sequence: {0}")]
    InvalidSequence(String),

    /// Session management errors (invalid state, persistence failures, etc.)
    #[error("Session error: {0}")]
    Session(String),

    /// Resource not found (sessions, tools, etc.)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A specialized `Result` type for Parley operations.
pub type Result<T> = std::result::Result<T, ParleyError>;
