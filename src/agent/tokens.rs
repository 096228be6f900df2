//! Token estimation heuristics for conversation history
//!
//! A deterministic word-count heuristic stands in for model-specific
//! tokenizers: each message costs `words * 1.3 + 4` tokens, counting the
//! names and arguments of any tool calls it carries. The estimate only needs
//! to be stable and monotonically recomputable — the running estimate kept by
//! the context store always equals `estimate_messages` over the same history.

use crate::session::Message;

/// Per-message fixed overhead (role framing, separators).
const MESSAGE_OVERHEAD: usize = 4;

/// Average tokens per whitespace-separated word.
const TOKENS_PER_WORD: f64 = 1.3;

/// Estimate the token cost of a single message.
///
/// # Example
/// ```
/// use parley::agent::tokens::estimate_message;
/// use parley::session::Message;
///
/// // 10 words -> 10 * 1.3 + 4 = 17
/// let msg = Message::user("one two three four five six seven eight nine ten");
/// assert_eq!(estimate_message(&msg), 17);
/// ```
pub fn estimate_message(message: &Message) -> usize {
    let mut words = message.content.split_whitespace().count();
    if let Some(calls) = &message.tool_calls {
        for call in calls {
            words += call.name.split_whitespace().count();
            words += call.arguments.to_string().split_whitespace().count();
        }
    }
    (words as f64 * TOKENS_PER_WORD) as usize + MESSAGE_OVERHEAD
}

/// Estimate the total token cost of a message sequence.
pub fn estimate_messages(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message).sum()
}

/// How many words fit inside a token budget for a single message.
///
/// Inverse of `estimate_message` for plain content; used to size compaction
/// digests so the digest itself cannot blow the budget it is restoring.
pub fn words_within(token_budget: usize) -> usize {
    (token_budget.saturating_sub(MESSAGE_OVERHEAD) as f64 / TOKENS_PER_WORD) as usize
}
