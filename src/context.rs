//! Advisory context-window helpers. These do not participate in the turn
//! or run state machines; callers consult them before starting a turn if
//! they want to manage history size themselves.

use crate::types::Message;

/// Characters-per-token used for the rough estimate below. Deliberately
/// crude — a real tokenizer is out of scope here, same as the character
/// count heuristic it is grounded on.
const CHARS_PER_TOKEN: usize = 4;

/// A character-count-based estimate of the token cost of `messages`. Not
/// exact; useful only for deciding whether to truncate before a turn.
pub fn estimate_tokens(messages: &[Message]) -> usize {
    messages.iter().map(message_chars).sum::<usize>() / CHARS_PER_TOKEN
}

fn message_chars(message: &Message) -> usize {
    match message {
        Message::User { content } => content.as_flat_text().chars().count(),
        Message::Assistant { content, .. } => content
            .iter()
            .map(|b| match b {
                crate::types::AssistantBlock::Text(t) => t.chars().count(),
                crate::types::AssistantBlock::Thinking(t) => t.chars().count(),
                crate::types::AssistantBlock::ToolUse { name, arguments, .. } => {
                    name.chars().count() + serde_json::to_string(arguments).map(|s| s.len()).unwrap_or(0)
                }
            })
            .sum(),
        Message::ToolResult { content, .. } => content.as_flat_text().chars().count(),
    }
}

/// Whether `messages` are within `ratio` of `limit` tokens (e.g. `0.9` for
/// "within 90% of the limit").
pub fn is_approaching_limit(messages: &[Message], limit: usize, ratio: f32) -> bool {
    let threshold = (limit as f32 * ratio) as usize;
    estimate_tokens(messages) >= threshold
}

/// Drop the oldest turns until `messages` fits within `max_messages`,
/// optionally preserving a leading system/context message (index 0) no
/// matter how much truncation is needed.
pub fn truncate_messages(messages: &[Message], max_messages: usize, preserve_first: bool) -> Vec<Message> {
    if messages.len() <= max_messages {
        return messages.to_vec();
    }

    if preserve_first && !messages.is_empty() {
        let mut kept = vec![messages[0].clone()];
        let remaining_budget = max_messages.saturating_sub(1);
        let tail_start = messages.len().saturating_sub(remaining_budget).max(1);
        kept.extend(messages[tail_start..].iter().cloned());
        kept
    } else {
        let tail_start = messages.len() - max_messages;
        messages[tail_start..].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Content;

    #[test]
    fn estimate_tokens_is_roughly_proportional_to_length() {
        let messages = vec![Message::user(Content::text("a".repeat(40)))];
        assert_eq!(estimate_tokens(&messages), 10);
    }

    #[test]
    fn is_approaching_limit_detects_near_threshold() {
        let messages = vec![Message::user(Content::text("a".repeat(400)))];
        assert!(is_approaching_limit(&messages, 100, 0.5));
        assert!(!is_approaching_limit(&messages, 1000, 0.5));
    }

    #[test]
    fn truncate_messages_keeps_most_recent() {
        let messages: Vec<Message> = (0..10).map(|i| Message::user(Content::text(format!("m{i}")))).collect();
        let truncated = truncate_messages(&messages, 3, false);
        assert_eq!(truncated.len(), 3);
        assert_eq!(truncated[2], messages[9]);
    }

    #[test]
    fn truncate_messages_preserves_first_when_requested() {
        let messages: Vec<Message> = (0..10).map(|i| Message::user(Content::text(format!("m{i}")))).collect();
        let truncated = truncate_messages(&messages, 4, true);
        assert_eq!(truncated[0], messages[0]);
        assert_eq!(truncated.last().unwrap(), &messages[9]);
    }

    #[test]
    fn truncate_messages_is_noop_under_budget() {
        let messages: Vec<Message> = (0..3).map(|i| Message::user(Content::text(format!("m{i}")))).collect();
        let truncated = truncate_messages(&messages, 10, true);
        assert_eq!(truncated, messages);
    }
}
