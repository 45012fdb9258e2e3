//! Task memory: the append-only transcript of one task.
//!
//! Holds the goal, every plan the assistant produced, and one tool message
//! per dispatched call. Owned by exactly one task and never shared.
//!
//! Bounded views (`last_n`, `window`) work on whole turns. A turn is a user
//! message, or an assistant message together with the tool results that
//! follow it. Oldest turns are dropped first; the goal and the newest turn
//! are always kept, so a view never starts with an orphaned tool result.

use stepwise_core::message::{Message, Role};
use stepwise_core::tool::ToolOutcome;

use crate::token::estimate_message_tokens;

#[derive(Debug, Clone, Default)]
pub struct TaskMemory {
    messages: Vec<Message>,
}

/// A tool outcome as seen in the transcript, paired with the tool that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservedOutcome<'a> {
    pub tool_name: &'a str,
    pub outcome: &'a ToolOutcome,
}

impl TaskMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a memory whose first message is the goal.
    pub fn with_goal(goal: impl Into<String>) -> Self {
        let mut memory = Self::new();
        memory.append(Message::user(goal));
        memory
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Read-only view of the full transcript, oldest first.
    pub fn transcript(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The original goal statement (the first user message).
    pub fn goal(&self) -> Option<&Message> {
        self.goal_index().map(|i| &self.messages[i])
    }

    /// Goal plus the newest turns holding at most `k` messages.
    ///
    /// The newest turn is kept even when it alone is longer than `k`.
    pub fn last_n(&self, k: usize) -> Vec<Message> {
        self.bounded(k, |_| 1)
    }

    /// Goal plus the newest turns that fit in `max_tokens` (estimated).
    ///
    /// Returns the full transcript when it already fits.
    pub fn window(&self, max_tokens: usize) -> Vec<Message> {
        self.bounded(max_tokens, estimate_message_tokens)
    }

    /// Tool outcomes recorded after the most recent user message, in order.
    pub fn outcomes_since_last_user(&self) -> Vec<ObservedOutcome<'_>> {
        let start = self
            .messages
            .iter()
            .rposition(|m| m.role == Role::User)
            .map_or(0, |i| i + 1);
        self.observed_from(start)
    }

    /// Every tool outcome in the transcript, in order.
    pub fn outcomes(&self) -> Vec<ObservedOutcome<'_>> {
        self.observed_from(0)
    }

    /// Content of the last assistant message that has any.
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .filter(|m| m.role == Role::Assistant)
            .map(|m| m.content.trim())
            .find(|c| !c.is_empty())
    }

    fn goal_index(&self) -> Option<usize> {
        self.messages.iter().position(|m| m.role == Role::User)
    }

    fn observed_from(&self, start: usize) -> Vec<ObservedOutcome<'_>> {
        self.messages[start.min(self.messages.len())..]
            .iter()
            .filter(|m| m.role == Role::Tool)
            .filter_map(|m| {
                let outcome = m.outcome.as_ref()?;
                let tool_name = m
                    .tool_call_id
                    .as_deref()
                    .and_then(|id| self.tool_name_for(id))
                    .unwrap_or("unknown");
                Some(ObservedOutcome { tool_name, outcome })
            })
            .collect()
    }

    fn tool_name_for(&self, call_id: &str) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .flat_map(|m| m.tool_calls.iter())
            .find(|tc| tc.id == call_id)
            .map(|tc| tc.name.as_str())
    }

    fn bounded(&self, budget: usize, cost: impl Fn(&Message) -> usize) -> Vec<Message> {
        let n = self.messages.len();
        let goal = self.goal_index();
        let first_turn = goal.map_or(0, |g| g + 1);

        let turn_starts: Vec<usize> = (first_turn..n)
            .filter(|&i| i == first_turn || self.messages[i].role != Role::Tool)
            .collect();

        let mut remaining = budget.saturating_sub(goal.map_or(0, |g| cost(&self.messages[g])));
        let mut keep_from = n;
        for &start in turn_starts.iter().rev() {
            let turn_cost: usize = self.messages[start..keep_from].iter().map(&cost).sum();
            // The newest turn is always kept.
            if keep_from != n && turn_cost > remaining {
                break;
            }
            remaining = remaining.saturating_sub(turn_cost);
            keep_from = start;
        }

        let mut view = Vec::with_capacity(n - keep_from + 1);
        if let Some(g) = goal {
            view.push(self.messages[g].clone());
        }
        view.extend_from_slice(&self.messages[keep_from.max(first_turn)..]);
        view
    }
}
