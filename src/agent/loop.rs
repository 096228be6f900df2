//! Agent loop implementation
//!
//! The loop drives one chat turn: it sends the session history and the tool
//! schema to the model, interprets the response, executes requested tools,
//! appends the results, and repeats until the model produces a plain answer
//! or the round budget runs out.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{ParleyError, Result};
use crate::events::AgentEvent;
use crate::providers::{ChatOptions, ChatProvider};
use crate::session::{Message, SessionRuntime, ToolCall};
use crate::tools::{ToolContext, ToolRegistry};

use super::store::{ContextStore, TokenBudget};

/// Deterministic answer when the model returns neither text nor tool calls.
const EMPTY_RESPONSE_ANSWER: &str = "The model returned an empty response.";

/// Deterministic answer when the tool round budget runs out mid-turn.
const TRUNCATION_ANSWER: &str =
    "Maximum tool rounds reached without a final answer; stopping here.";

/// The agent loop: one active session, one turn at a time.
///
/// The loop owns a `ContextStore` behind a turn mutex, so `chat` calls for
/// the same session are strictly serialized; independent loops (independent
/// sessions) proceed concurrently. The tool registry is immutable after
/// startup and shared without locking.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use parley::agent::AgentLoop;
/// use parley::config::Config;
/// use parley::providers::{Completion, ScriptedProvider};
/// use parley::session::SessionRuntime;
/// use parley::tools::ToolRegistry;
///
/// # tokio_test::block_on(async {
/// let provider = Arc::new(ScriptedProvider::new(vec![Completion::text("4")]));
/// let agent = AgentLoop::new(
///     &Config::default(),
///     provider,
///     Arc::new(ToolRegistry::new()),
///     SessionRuntime::new("demo"),
/// );
///
/// let answer = agent.chat("What is 2+2?").await.unwrap();
/// assert_eq!(answer, "4");
/// # });
/// ```
pub struct AgentLoop {
    /// The model backend
    provider: Arc<dyn ChatProvider>,
    /// Registered tools; immutable after startup
    tools: Arc<ToolRegistry>,
    /// The context store, behind the turn lock
    store: Mutex<ContextStore>,
    /// Zero-or-one event observer for the current turn stream
    observer: RwLock<Option<mpsc::UnboundedSender<AgentEvent>>>,
    /// Completion options sent with every model call
    chat_options: ChatOptions,
    /// Maximum tool rounds per turn
    max_tool_rounds: u32,
    /// Timeout for a single model call
    model_timeout: Duration,
    /// Workspace handed to executing tools
    workspace: Option<String>,
}

impl AgentLoop {
    /// Create a new agent loop bound to the given session runtime.
    ///
    /// The runtime's loaded-capability set is synced to the registry, and a
    /// configured system-prompt override replaces the runtime's instruction.
    pub fn new(
        config: &Config,
        provider: Arc<dyn ChatProvider>,
        tools: Arc<ToolRegistry>,
        runtime: SessionRuntime,
    ) -> Self {
        let budget = TokenBudget {
            max_context_tokens: config.context.max_context_tokens,
            compress_threshold: config.context.compress_threshold,
            keep_recent: config.context.keep_recent_messages,
        };
        let mut store = ContextStore::new(runtime, budget);
        store.set_loaded_tools(tools.names().iter().map(|s| s.to_string()).collect());
        if let Some(prompt) = &config.agent.system_prompt {
            store.set_system_prompt(prompt);
        }

        let chat_options = ChatOptions::new()
            .with_model(&config.agent.model)
            .with_max_tokens(config.agent.max_tokens)
            .with_temperature(config.agent.temperature);

        Self {
            provider,
            tools,
            store: Mutex::new(store),
            observer: RwLock::new(None),
            chat_options,
            max_tool_rounds: config.agent.max_tool_rounds,
            model_timeout: Duration::from_secs(config.agent.model_timeout_secs),
            workspace: Some(config.workspace_path().to_string_lossy().to_string()),
        }
    }

    /// Subscribe to the loop's event stream.
    ///
    /// At most one observer is registered at a time; subscribing again
    /// replaces the previous one. Emission is fire-and-forget: dropping the
    /// receiver never affects the loop.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<AgentEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut guard = self
            .observer
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = Some(tx);
        rx
    }

    fn emit(&self, event: AgentEvent) {
        let guard = self
            .observer
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(tx) = guard.as_ref() {
            let _ = tx.send(event);
        }
    }

    /// Process one chat turn to completion.
    ///
    /// Appends the user message, then alternates model calls and tool batches
    /// until the model answers in plain text or the round budget runs out.
    /// Tool failures are narrated back to the model as tool messages and
    /// never abort the turn; model transport failures abort the turn with an
    /// `Error` event and no dangling tool-call message.
    pub async fn chat(&self, user_text: &str) -> Result<String> {
        // Turn lock: turns for this session never interleave
        let mut store = self.store.lock().await;
        let session_id = store.session_id().to_string();
        info!(session_id = %session_id, "Processing turn");

        self.emit(AgentEvent::user_input(user_text));
        store.append(Message::user(user_text))?;

        let definitions = self.tools.definitions();
        let tool_ctx = {
            let mut ctx = ToolContext::new().with_session(&session_id);
            if let Some(workspace) = &self.workspace {
                ctx = ctx.with_workspace(workspace);
            }
            ctx
        };

        let mut round: u32 = 0;
        loop {
            let completion = match tokio::time::timeout(
                self.model_timeout,
                self.provider
                    .complete(store.history(), definitions.clone(), &self.chat_options),
            )
            .await
            {
                Ok(Ok(completion)) => completion,
                Ok(Err(e)) => {
                    error!(session_id = %session_id, error = %e, "Model completion failed");
                    self.emit(AgentEvent::error(&e.to_string()));
                    return Err(e);
                }
                Err(_elapsed) => {
                    let e = ParleyError::Provider(format!(
                        "model call timed out after {}s",
                        self.model_timeout.as_secs()
                    ));
                    error!(session_id = %session_id, error = %e, "Model completion timed out");
                    self.emit(AgentEvent::error(&e.to_string()));
                    return Err(e);
                }
            };

            if !completion.has_tool_calls() {
                let answer = if completion.content.is_empty() {
                    warn!(session_id = %session_id, "Model returned an empty response");
                    EMPTY_RESPONSE_ANSWER.to_string()
                } else {
                    completion.content
                };
                store.append(Message::assistant(&answer))?;
                self.emit(AgentEvent::assistant_response(&answer));
                if store.should_compress() {
                    store.compress();
                }
                return Ok(answer);
            }

            round += 1;
            if round > self.max_tool_rounds {
                info!(
                    session_id = %session_id,
                    rounds = self.max_tool_rounds,
                    "Tool round limit reached; truncating turn"
                );
                self.emit(AgentEvent::error("maximum tool rounds reached"));
                store.append(Message::assistant(TRUNCATION_ANSWER))?;
                self.emit(AgentEvent::assistant_response(TRUNCATION_ANSWER));
                return Ok(TRUNCATION_ANSWER.to_string());
            }

            if !completion.content.is_empty() {
                self.emit(AgentEvent::thinking(&completion.content));
            }

            let calls = sanitize_calls(completion.tool_calls);
            store.append(Message::assistant_with_tools(&completion.content, calls.clone()))?;
            for call in &calls {
                info!(session_id = %session_id, tool = %call.name, id = %call.id, "Executing tool");
                self.emit(AgentEvent::tool_call(
                    &call.id,
                    &call.name,
                    call.arguments.clone(),
                ));
            }

            // The batch runs concurrently but is awaited as a whole; no
            // partial results are fed back to the model.
            let results = self.tools.execute_many(&calls, &tool_ctx).await;
            for result in &results {
                store.append(Message::tool_result(&result.call_id, &result.render()))?;
                self.emit(AgentEvent::tool_result(result.clone()));
            }

            if store.should_compress() {
                store.compress();
            }
        }
    }

    /// The bound session's identifier.
    pub async fn session_id(&self) -> String {
        self.store.lock().await.session_id().to_string()
    }

    /// A snapshot of the bound runtime, for persistence.
    pub async fn runtime_snapshot(&self) -> SessionRuntime {
        self.store.lock().await.snapshot()
    }

    /// Clear the session history, preserving identity and capabilities.
    pub async fn reset(&self) {
        self.store.lock().await.reset();
    }

    /// Swap in a different session runtime, returning the previous one for
    /// the caller to persist. Waits for any in-flight turn to finish.
    pub async fn update_runtime(&self, runtime: SessionRuntime) -> SessionRuntime {
        let mut store = self.store.lock().await;
        let previous = store.update_runtime(runtime);
        store.set_loaded_tools(self.tools.names().iter().map(|s| s.to_string()).collect());
        previous
    }

    /// Get a reference to the tool registry.
    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Get a reference to the provider.
    pub fn provider(&self) -> &Arc<dyn ChatProvider> {
        &self.provider
    }
}

/// Defend the history against hallucinated call ids: blank ids are replaced
/// with generated ones and duplicate ids are dropped, keeping the first.
fn sanitize_calls(calls: Vec<ToolCall>) -> Vec<ToolCall> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut sanitized = Vec::with_capacity(calls.len());
    for mut call in calls {
        if call.id.is_empty() {
            call.id = format!("call_{}", uuid::Uuid::new_v4().simple());
            warn!(tool = %call.name, id = %call.id, "Model omitted tool call id; generated one");
        }
        if !seen.insert(call.id.clone()) {
            warn!(tool = %call.name, id = %call.id, "Dropping duplicate tool call id from model");
            continue;
        }
        sanitized.push(call);
    }
    sanitized
}
