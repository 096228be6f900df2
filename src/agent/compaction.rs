//! History compaction helpers
//!
//! Pure functions used by the context store to reduce an over-budget history:
//! choosing a split point that keeps recent messages at full fidelity without
//! orphaning tool results, and digesting the older region into a single
//! summary message.
//!
//! The summary is produced locally from the transcript rather than by a
//! model call: compaction must always make progress, synchronously, even
//! when no provider is reachable.

use crate::session::{Message, Role};

/// Prefix marking a digest message produced by compaction.
const SUMMARY_PREFIX: &str = "[Conversation summary]";

/// Maximum characters retained per transcript line in a digest.
const DIGEST_LINE_BUDGET: usize = 160;

/// Check whether a message is a digest produced by a previous compaction.
pub fn is_summary(message: &Message) -> bool {
    message.role == Role::System && message.content.starts_with(SUMMARY_PREFIX)
}

/// Build the digest message wrapping a transcript summary.
pub fn summary_message(digest: &str) -> Message {
    Message::system(&format!("{}\n{}", SUMMARY_PREFIX, digest))
}

/// Choose the index splitting droppable history from the kept tail.
///
/// Keeps the `keep_recent` most recent messages, then widens the kept window
/// backwards until it does not begin with a tool result — a tool message is
/// never retained without the assistant message that requested it, and the
/// pair is always dropped together.
///
/// # Example
/// ```
/// use parley::agent::compaction::split_point;
/// use parley::session::{Message, ToolCall};
/// use serde_json::json;
///
/// let history = vec![
///     Message::user("old question"),
///     Message::assistant("old answer"),
///     Message::assistant_with_tools("", vec![ToolCall::new("c1", "add", json!({}))]),
///     Message::tool_result("c1", "4"),
///     Message::assistant("It is 4."),
/// ];
/// // keep_recent = 2 would start the kept window at the tool result;
/// // the split widens to include the requesting assistant message.
/// assert_eq!(split_point(&history, 2), 2);
/// ```
pub fn split_point(history: &[Message], keep_recent: usize) -> usize {
    let mut split = history.len().saturating_sub(keep_recent);
    while split > 0 && history[split].role == Role::Tool {
        split -= 1;
    }
    split
}

/// Digest a message region into a compact transcript.
///
/// Tool chatter is elided: tool results are skipped entirely, and assistant
/// messages that carried tool calls are annotated instead of reproduced.
/// Lines are truncated to keep the digest strictly smaller than its source.
pub fn digest_messages(messages: &[Message]) -> String {
    let mut lines = Vec::new();
    for msg in messages {
        if msg.role == Role::Tool {
            continue;
        }
        let mut text = msg.content.trim().to_string();
        if text.is_empty() && !msg.has_tool_calls() {
            continue;
        }
        if text.len() > DIGEST_LINE_BUDGET {
            text.truncate(DIGEST_LINE_BUDGET);
            while !text.is_char_boundary(text.len()) {
                text.pop();
            }
            text.push('…');
        }
        if msg.has_tool_calls() {
            let count = msg.tool_calls.as_ref().map(|c| c.len()).unwrap_or(0);
            if text.is_empty() {
                lines.push(format!("{}: [ran {} tool(s)]", msg.role, count));
            } else {
                lines.push(format!("{}: {} [ran {} tool(s)]", msg.role, text, count));
            }
        } else {
            lines.push(format!("{}: {}", msg.role, text));
        }
    }
    lines.join("\n")
}

/// Truncate a digest to at most `max_words` whitespace-separated words,
/// keeping the most recent (trailing) part of the transcript.
pub fn truncate_words(digest: &str, max_words: usize) -> String {
    let words: Vec<&str> = digest.split_whitespace().collect();
    if words.len() <= max_words {
        return digest.to_string();
    }
    if max_words == 0 {
        return String::new();
    }
    let tail = &words[words.len() - max_words..];
    format!("… {}", tail.join(" "))
}
