//! Token estimation for context budgeting.
//!
//! Character heuristic: about 4 characters per token, rounded up, plus a
//! fixed per-message overhead for role and framing on the wire.

use stepwise_core::message::Message;

/// Tokens charged per message for role name and delimiters.
pub const MESSAGE_OVERHEAD_TOKENS: usize = 4;

/// Estimate the token count for a string.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Estimate tokens for one message, including any tool call arguments it carries.
pub fn estimate_message_tokens(message: &Message) -> usize {
    let calls: usize = message
        .tool_calls
        .iter()
        .map(|tc| estimate_tokens(&tc.name) + estimate_tokens(&tc.arguments))
        .sum();
    MESSAGE_OVERHEAD_TOKENS + estimate_tokens(&message.content) + calls
}

/// Estimate tokens for a slice of messages.
pub fn estimate_messages_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwise_core::tool::ToolCall;

    #[test]
    fn rounds_up_per_four_chars() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens(&"x".repeat(100)), 25);
    }

    #[test]
    fn plan_messages_count_their_calls() {
        let plain = Message::assistant("ok");
        let calls = vec![ToolCall::new("c1", "calc", serde_json::json!({"expression": "1+1"}))];
        let plan = Message::assistant_plan("ok", &calls);
        assert_eq!(estimate_message_tokens(&plain), 5);
        assert!(estimate_message_tokens(&plan) > estimate_message_tokens(&plain));
    }

    #[test]
    fn slice_sums_messages() {
        let msgs = vec![Message::user("hello"), Message::assistant("world")];
        assert_eq!(estimate_messages_tokens(&msgs), 12);
    }
}
