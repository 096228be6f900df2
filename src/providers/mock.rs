//! Scripted in-memory provider for tests and offline runs
//!
//! `ScriptedProvider` replays a fixed sequence of completions and records
//! every request it receives, so tests can drive the agent loop through
//! multi-round tool conversations without a network.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{ParleyError, Result};
use crate::session::Message;

use super::{ChatOptions, ChatProvider, Completion, ToolDefinition};

/// A provider that returns pre-scripted completions in order.
///
/// Once the script is exhausted, further calls fail with a provider error —
/// which doubles as a way to exercise the loop's error path.
///
/// # Example
///
/// ```
/// use parley::providers::{ChatOptions, ChatProvider, Completion, ScriptedProvider};
///
/// # tokio_test::block_on(async {
/// let provider = ScriptedProvider::new(vec![Completion::text("4")]);
/// let completion = provider
///     .complete(vec![], vec![], &ChatOptions::default())
///     .await
///     .unwrap();
/// assert_eq!(completion.content, "4");
/// # });
/// ```
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Completion>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedProvider {
    /// Create a provider that replays the given completions in order.
    pub fn new(completions: Vec<Completion>) -> Self {
        Self {
            script: Mutex::new(completions.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a provider whose script is already exhausted: every call fails.
    pub fn failing() -> Self {
        Self::new(vec![])
    }

    /// The message snapshots of every request received so far.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    async fn complete(
        &self,
        messages: Vec<Message>,
        _tools: Vec<ToolDefinition>,
        _options: &ChatOptions,
    ) -> Result<Completion> {
        self.requests.lock().unwrap().push(messages);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ParleyError::Provider("scripted provider exhausted".to_string()))
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted-model"
    }
}
