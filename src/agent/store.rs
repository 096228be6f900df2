//! Context store - owns one session runtime and its conversation history
//!
//! The store is the only writer of a session's history. It enforces the
//! tool-call ordering invariant on every append, keeps the running token
//! estimate in step with the history, compacts the history when it outgrows
//! the configured budget, and swaps whole runtimes on session switch.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::error::{ParleyError, Result};
use crate::session::{Message, Role, SessionRuntime};

use super::{compaction, tokens};

/// Token budget governing when and how history is compacted.
#[derive(Debug, Clone)]
pub struct TokenBudget {
    /// Maximum context window size in tokens
    pub max_context_tokens: usize,
    /// Fraction of the window that triggers compaction
    pub compress_threshold: f64,
    /// How many recent messages keep full fidelity through compaction
    pub keep_recent: usize,
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self {
            max_context_tokens: 100_000,
            compress_threshold: 0.8,
            keep_recent: 8,
        }
    }
}

impl TokenBudget {
    /// The estimate at which compaction kicks in.
    pub fn trigger(&self) -> usize {
        (self.max_context_tokens as f64 * self.compress_threshold) as usize
    }
}

/// Store binding one `SessionRuntime` to append/read/compress/reset
/// operations.
///
/// Exactly one runtime is bound at a time; `update_runtime` replaces it in
/// O(1) and hands the previous one back untouched for the caller to persist.
///
/// # Example
///
/// ```
/// use parley::agent::{ContextStore, TokenBudget};
/// use parley::session::{Message, SessionRuntime};
///
/// let runtime = SessionRuntime::new("demo");
/// let mut store = ContextStore::new(runtime, TokenBudget::default());
///
/// store.append(Message::user("Hello")).unwrap();
/// // history() prefixes the system instruction
/// let history = store.history();
/// assert_eq!(history.len(), 2);
/// assert_eq!(history[1].content, "Hello");
/// ```
pub struct ContextStore {
    runtime: SessionRuntime,
    budget: TokenBudget,
}

impl ContextStore {
    /// Create a store bound to the given runtime.
    ///
    /// The running token estimate is recomputed from the runtime's history so
    /// a stale persisted estimate can never drift from reality.
    pub fn new(mut runtime: SessionRuntime, budget: TokenBudget) -> Self {
        runtime.token_estimate = tokens::estimate_messages(&runtime.history);
        Self { runtime, budget }
    }

    /// The bound session's identifier.
    pub fn session_id(&self) -> &str {
        &self.runtime.session_id
    }

    /// A snapshot of the bound runtime, for persistence.
    pub fn snapshot(&self) -> SessionRuntime {
        self.runtime.clone()
    }

    /// Replace the system instruction.
    pub fn set_system_prompt(&mut self, prompt: &str) {
        self.runtime.system_prompt = prompt.to_string();
        self.runtime.touch();
    }

    /// Record which capabilities are loaded for this session.
    pub fn set_loaded_tools(&mut self, tools: Vec<String>) {
        self.runtime.loaded_tools = tools;
        self.runtime.touch();
    }

    /// Append a message, enforcing the ordering invariant.
    ///
    /// # Errors
    /// Fails with `ParleyError::InvalidSequence` when the message would
    /// corrupt the tool-call pairing: a tool message whose `tool_call_id`
    /// does not match a pending call of the nearest preceding assistant
    /// message, a duplicate answer to a call, a `tool_call_id` on a non-tool
    /// role, or duplicate call ids within one assistant message.
    pub fn append(&mut self, message: Message) -> Result<()> {
        self.validate_append(&message)?;
        self.runtime.token_estimate += tokens::estimate_message(&message);
        self.runtime.history.push(message);
        self.runtime.touch();
        Ok(())
    }

    fn validate_append(&self, message: &Message) -> Result<()> {
        match message.role {
            Role::Tool => {
                let id = message.tool_call_id.as_deref().ok_or_else(|| {
                    ParleyError::InvalidSequence("tool message missing tool_call_id".to_string())
                })?;

                // Walk back over any tool results already answering the same
                // assistant message.
                let mut answered: HashSet<&str> = HashSet::new();
                let mut anchor = None;
                for prior in self.runtime.history.iter().rev() {
                    if prior.role == Role::Tool {
                        if let Some(prior_id) = prior.tool_call_id.as_deref() {
                            answered.insert(prior_id);
                        }
                        continue;
                    }
                    anchor = Some(prior);
                    break;
                }

                let anchor = anchor.ok_or_else(|| {
                    ParleyError::InvalidSequence(format!(
                        "tool message '{}' has no preceding assistant message",
                        id
                    ))
                })?;

                let pending = anchor
                    .tool_calls
                    .as_ref()
                    .filter(|_| anchor.role == Role::Assistant);
                let requested = pending
                    .map(|calls| calls.iter().any(|c| c.id == id))
                    .unwrap_or(false);
                if !requested {
                    return Err(ParleyError::InvalidSequence(format!(
                        "tool message '{}' does not answer a call of the preceding assistant message",
                        id
                    )));
                }
                if answered.contains(id) {
                    return Err(ParleyError::InvalidSequence(format!(
                        "tool call '{}' was already answered",
                        id
                    )));
                }
                Ok(())
            }
            _ => {
                if message.tool_call_id.is_some() {
                    return Err(ParleyError::InvalidSequence(
                        "tool_call_id is only valid on tool messages".to_string(),
                    ));
                }
                if let Some(calls) = &message.tool_calls {
                    if message.role != Role::Assistant {
                        return Err(ParleyError::InvalidSequence(
                            "tool_calls are only valid on assistant messages".to_string(),
                        ));
                    }
                    let mut ids = HashSet::new();
                    for call in calls {
                        if !ids.insert(call.id.as_str()) {
                            return Err(ParleyError::InvalidSequence(format!(
                                "duplicate tool call id '{}' in assistant message",
                                call.id
                            )));
                        }
                    }
                }
                Ok(())
            }
        }
    }

    /// The ordered history, prefixed by the system instruction as a synthetic
    /// leading system message when one is set.
    pub fn history(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.runtime.history.len() + 1);
        if !self.runtime.system_prompt.is_empty() {
            messages.push(Message::system(&self.runtime.system_prompt));
        }
        messages.extend(self.runtime.history.iter().cloned());
        messages
    }

    /// The current running token estimate for the history.
    ///
    /// Always equals `tokens::estimate_messages` recomputed over the raw
    /// history — incremental updates never drift.
    pub fn estimate_tokens(&self) -> usize {
        self.runtime.token_estimate
    }

    /// Whether the history has outgrown the compaction trigger.
    pub fn should_compress(&self) -> bool {
        self.runtime.token_estimate > self.budget.trigger()
    }

    /// Compact the history down toward the budget.
    ///
    /// No-op when already compliant (idempotent). Otherwise the oldest
    /// messages are replaced by a single digest message while the most recent
    /// `keep_recent` messages survive byte-identical; the kept window is
    /// widened so tool results are never separated from the assistant message
    /// that requested them. When nothing but a previous digest remains to
    /// drop, the store warns and proceeds with the oversized context.
    ///
    /// Returns the post-compaction token estimate.
    pub fn compress(&mut self) -> usize {
        let before = self.runtime.token_estimate;
        if before <= self.budget.trigger() {
            return before;
        }

        let split = compaction::split_point(&self.runtime.history, self.budget.keep_recent);
        let old = &self.runtime.history[..split];
        if old.iter().all(compaction::is_summary) {
            warn!(
                session_id = %self.runtime.session_id,
                estimate = before,
                budget = self.budget.max_context_tokens,
                "History cannot be reduced below budget; proceeding oversized"
            );
            return before;
        }

        // Size the digest to the headroom left after the kept tail, so the
        // digest itself can never hold the history above budget.
        let kept_estimate = tokens::estimate_messages(&self.runtime.history[split..]);
        let headroom = self.budget.trigger().saturating_sub(kept_estimate);
        let allowed_words = tokens::words_within(headroom).saturating_sub(3);
        let digest = compaction::truncate_words(&compaction::digest_messages(old), allowed_words);

        let mut compacted = Vec::with_capacity(1 + self.runtime.history.len() - split);
        compacted.push(compaction::summary_message(&digest));
        compacted.extend_from_slice(&self.runtime.history[split..]);

        self.runtime.history = compacted;
        self.runtime.token_estimate = tokens::estimate_messages(&self.runtime.history);
        self.runtime.touch();

        let after = self.runtime.token_estimate;
        info!(
            session_id = %self.runtime.session_id,
            before,
            after,
            dropped = split,
            "Compacted conversation history"
        );
        if after > self.budget.trigger() {
            warn!(
                session_id = %self.runtime.session_id,
                estimate = after,
                "History remains above budget after compaction"
            );
        }
        after
    }

    /// Clear the history while preserving session identity, loaded
    /// capabilities, and the system instruction.
    pub fn reset(&mut self) {
        debug!(session_id = %self.runtime.session_id, "Resetting session history");
        self.runtime.history.clear();
        self.runtime.token_estimate = 0;
        self.runtime.touch();
    }

    /// Atomically swap the bound runtime, returning the previous one.
    ///
    /// The previous runtime is neither read nor mutated afterwards; the new
    /// runtime's token estimate is recomputed from its history.
    pub fn update_runtime(&mut self, mut runtime: SessionRuntime) -> SessionRuntime {
        info!(
            from = %self.runtime.session_id,
            to = %runtime.session_id,
            "Switching session runtime"
        );
        runtime.token_estimate = tokens::estimate_messages(&runtime.history);
        std::mem::replace(&mut self.runtime, runtime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ToolCall;
    use serde_json::json;

    fn store() -> ContextStore {
        ContextStore::new(SessionRuntime::new("test"), TokenBudget::default())
    }

    fn small_budget(max: usize, keep: usize) -> TokenBudget {
        TokenBudget {
            max_context_tokens: max,
            compress_threshold: 0.8,
            keep_recent: keep,
        }
    }

    fn tool_exchange() -> Vec<Message> {
        vec![
            Message::user("What is 2+2?"),
            Message::assistant_with_tools(
                "",
                vec![ToolCall::new("call_1", "add", json!({"a": 2, "b": 2}))],
            ),
            Message::tool_result("call_1", "4"),
            Message::assistant("The answer is 4."),
        ]
    }

    #[test]
    fn test_append_and_history() {
        let mut store = store();
        store.append(Message::user("Hello")).unwrap();
        store.append(Message::assistant("Hi!")).unwrap();

        let history = store.history();
        assert_eq!(history.len(), 3); // synthetic system + 2
        assert_eq!(history[0].role, Role::System);
        assert_eq!(history[1].content, "Hello");
        assert_eq!(history[2].content, "Hi!");
    }

    #[test]
    fn test_history_without_system_prompt() {
        let runtime = SessionRuntime::new("test").with_system_prompt("");
        let mut store = ContextStore::new(runtime, TokenBudget::default());
        store.append(Message::user("Hello")).unwrap();
        assert_eq!(store.history().len(), 1);
    }

    #[test]
    fn test_history_does_not_mutate() {
        let mut store = store();
        store.append(Message::user("Hello")).unwrap();
        let estimate = store.estimate_tokens();
        let _ = store.history();
        let _ = store.history();
        assert_eq!(store.estimate_tokens(), estimate);
        assert_eq!(store.snapshot().history.len(), 1);
    }

    #[test]
    fn test_append_valid_tool_sequence() {
        let mut store = store();
        for msg in tool_exchange() {
            store.append(msg).unwrap();
        }
        assert_eq!(store.snapshot().history.len(), 4);
    }

    #[test]
    fn test_append_multiple_tool_results_one_assistant() {
        let mut store = store();
        store.append(Message::user("both please")).unwrap();
        store
            .append(Message::assistant_with_tools(
                "",
                vec![
                    ToolCall::new("c1", "add", json!({})),
                    ToolCall::new("c2", "echo", json!({})),
                ],
            ))
            .unwrap();
        store.append(Message::tool_result("c2", "hi")).unwrap();
        store.append(Message::tool_result("c1", "4")).unwrap();
    }

    #[test]
    fn test_append_tool_without_pending_call_fails() {
        let mut store = store();
        store.append(Message::user("Hello")).unwrap();
        let err = store.append(Message::tool_result("call_x", "4")).unwrap_err();
        assert!(matches!(err, ParleyError::InvalidSequence(_)));
    }

    #[test]
    fn test_append_tool_wrong_id_fails() {
        let mut store = store();
        store.append(Message::user("hi")).unwrap();
        store
            .append(Message::assistant_with_tools(
                "",
                vec![ToolCall::new("c1", "add", json!({}))],
            ))
            .unwrap();
        let err = store.append(Message::tool_result("c9", "4")).unwrap_err();
        assert!(matches!(err, ParleyError::InvalidSequence(_)));
    }

    #[test]
    fn test_append_duplicate_answer_fails() {
        let mut store = store();
        store.append(Message::user("hi")).unwrap();
        store
            .append(Message::assistant_with_tools(
                "",
                vec![ToolCall::new("c1", "add", json!({}))],
            ))
            .unwrap();
        store.append(Message::tool_result("c1", "4")).unwrap();
        let err = store.append(Message::tool_result("c1", "4")).unwrap_err();
        assert!(matches!(err, ParleyError::InvalidSequence(_)));
    }

    #[test]
    fn test_append_tool_on_empty_history_fails() {
        let mut store = store();
        let err = store.append(Message::tool_result("c1", "4")).unwrap_err();
        assert!(matches!(err, ParleyError::InvalidSequence(_)));
    }

    #[test]
    fn test_append_tool_call_id_on_user_fails() {
        let mut store = store();
        let mut msg = Message::user("hi");
        msg.tool_call_id = Some("c1".to_string());
        let err = store.append(msg).unwrap_err();
        assert!(matches!(err, ParleyError::InvalidSequence(_)));
    }

    #[test]
    fn test_append_duplicate_ids_within_assistant_fails() {
        let mut store = store();
        let err = store
            .append(Message::assistant_with_tools(
                "",
                vec![
                    ToolCall::new("c1", "add", json!({})),
                    ToolCall::new("c1", "echo", json!({})),
                ],
            ))
            .unwrap_err();
        assert!(matches!(err, ParleyError::InvalidSequence(_)));
    }

    #[test]
    fn test_failed_append_leaves_state_unchanged() {
        let mut store = store();
        store.append(Message::user("hi")).unwrap();
        let estimate = store.estimate_tokens();

        assert!(store.append(Message::tool_result("cx", "4")).is_err());
        assert_eq!(store.snapshot().history.len(), 1);
        assert_eq!(store.estimate_tokens(), estimate);
    }

    #[test]
    fn test_estimate_matches_recompute() {
        let mut store = store();
        for msg in tool_exchange() {
            store.append(msg).unwrap();
        }
        assert_eq!(
            store.estimate_tokens(),
            tokens::estimate_messages(&store.snapshot().history)
        );
    }

    #[test]
    fn test_compress_noop_when_compliant() {
        let mut store = store();
        store.append(Message::user("Hello")).unwrap();
        let before = store.snapshot().history;

        let estimate = store.compress();
        assert_eq!(estimate, store.estimate_tokens());
        assert_eq!(store.snapshot().history, before);
    }

    #[test]
    fn test_compress_reduces_below_budget_keeps_recent_verbatim() {
        let mut store =
            ContextStore::new(SessionRuntime::new("test"), small_budget(200, 2));
        for i in 0..20 {
            store
                .append(Message::user(&format!(
                    "message number {} with quite a few extra words in it",
                    i
                )))
                .unwrap();
            store
                .append(Message::assistant(&format!(
                    "reply number {} with quite a few extra words in it",
                    i
                )))
                .unwrap();
        }
        assert!(store.should_compress());
        let recent_before: Vec<Message> =
            store.snapshot().history.iter().rev().take(2).cloned().collect();

        let after = store.compress();
        assert_eq!(after, store.estimate_tokens());
        assert!(after < 200);

        let history = store.snapshot().history;
        // digest + 2 recent
        assert_eq!(history.len(), 3);
        assert!(compaction::is_summary(&history[0]));
        let recent_after: Vec<Message> =
            history.iter().rev().take(2).cloned().collect();
        assert_eq!(recent_before, recent_after);
    }

    #[test]
    fn test_compress_is_idempotent() {
        let mut store =
            ContextStore::new(SessionRuntime::new("test"), small_budget(200, 2));
        for i in 0..20 {
            store
                .append(Message::user(&format!(
                    "message number {} with quite a few extra words in it",
                    i
                )))
                .unwrap();
        }
        let first = store.compress();
        let once = store.snapshot().history;

        let second = store.compress();
        assert_eq!(first, second);
        assert_eq!(once, store.snapshot().history);
    }

    #[test]
    fn test_compress_never_orphans_tool_results() {
        let mut store =
            ContextStore::new(SessionRuntime::new("test"), small_budget(150, 2));
        // Padding turns, then a tool exchange at the tail
        for i in 0..10 {
            store
                .append(Message::user(&format!(
                    "padding message number {} with several additional words",
                    i
                )))
                .unwrap();
        }
        store
            .append(Message::assistant_with_tools(
                "",
                vec![ToolCall::new("c1", "add", json!({"a": 2, "b": 2}))],
            ))
            .unwrap();
        store.append(Message::tool_result("c1", "4")).unwrap();

        store.compress();
        let history = store.snapshot().history;
        for (i, msg) in history.iter().enumerate() {
            if msg.role == Role::Tool {
                // The requesting assistant message must still precede it
                let anchor = &history[i - 1];
                assert_eq!(anchor.role, Role::Assistant);
                assert!(anchor.has_tool_calls());
            }
        }
    }

    #[test]
    fn test_compress_stuck_history_warns_and_keeps_state() {
        // keep_recent larger than history: nothing can be dropped
        let mut store =
            ContextStore::new(SessionRuntime::new("test"), small_budget(10, 50));
        store
            .append(Message::user(
                "a fairly long message that blows the tiny budget immediately",
            ))
            .unwrap();
        assert!(store.should_compress());

        let before = store.snapshot().history;
        let estimate = store.compress();
        assert_eq!(estimate, store.estimate_tokens());
        assert_eq!(before, store.snapshot().history);
    }

    #[test]
    fn test_reset_preserves_identity_and_tools() {
        let mut store = store();
        store.set_loaded_tools(vec!["echo".to_string()]);
        store.append(Message::user("Hello")).unwrap();

        store.reset();

        let runtime = store.snapshot();
        assert!(runtime.history.is_empty());
        assert_eq!(runtime.token_estimate, 0);
        assert_eq!(runtime.session_id, "test");
        assert_eq!(runtime.loaded_tools, vec!["echo".to_string()]);
        assert!(!runtime.system_prompt.is_empty());
    }

    #[test]
    fn test_update_runtime_swaps_wholesale() {
        let mut store = store();
        store.append(Message::user("old session message")).unwrap();

        let mut incoming = SessionRuntime::new("other");
        incoming.history.push(Message::user("new session message"));

        let previous = store.update_runtime(incoming);

        // Previous runtime untouched
        assert_eq!(previous.session_id, "test");
        assert_eq!(previous.history.len(), 1);
        assert_eq!(previous.history[0].content, "old session message");

        // No residue from the previous runtime
        assert_eq!(store.session_id(), "other");
        let history = store.history();
        assert!(history.iter().all(|m| m.content != "old session message"));
        assert!(history.iter().any(|m| m.content == "new session message"));
    }

    #[test]
    fn test_update_runtime_recomputes_estimate() {
        let mut store = store();
        let mut incoming = SessionRuntime::new("other");
        incoming.history.push(Message::user("some words in here"));
        incoming.token_estimate = 999_999; // stale persisted value

        store.update_runtime(incoming);
        assert_eq!(
            store.estimate_tokens(),
            tokens::estimate_messages(&store.snapshot().history)
        );
    }

    #[test]
    fn test_set_system_prompt_reflected_in_history() {
        let mut store = store();
        store.set_system_prompt("Answer in French.");
        let history = store.history();
        assert_eq!(history[0].content, "Answer in French.");
    }
}
