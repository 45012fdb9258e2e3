//! Result aggregation: renders a finished task's memory into its answer.
//!
//! Pure formatting. Running it twice over the same memory gives the same
//! result.

use serde::{Deserialize, Serialize};

use crate::loop_runner::TerminationReason;
use crate::memory::TaskMemory;

/// Longest rendering of one outcome in the transcript summary, in characters.
const SUMMARY_LINE_CHARS: usize = 160;

/// What a task hands back to its caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResult {
    pub text: String,
    pub transcript_summary: String,
    pub termination_reason: TerminationReason,
    pub steps: u32,
    pub task_id: String,
}

impl FinalResult {
    /// Whether the task ended on its own terms rather than by a failure.
    pub fn is_success(&self) -> bool {
        !self.termination_reason.is_failure()
    }
}

pub fn aggregate(
    memory: &TaskMemory,
    reason: TerminationReason,
    steps: u32,
    task_id: &str,
) -> FinalResult {
    FinalResult {
        text: final_text(memory),
        transcript_summary: transcript_summary(memory, reason, steps),
        termination_reason: reason,
        steps,
        task_id: task_id.to_string(),
    }
}

/// The last thing the assistant said, or a digest of the latest tool results.
pub fn final_text(memory: &TaskMemory) -> String {
    if let Some(text) = memory.last_assistant_text() {
        return text.to_string();
    }

    let outcomes = memory.outcomes_since_last_user();
    if outcomes.is_empty() {
        return "No answer was produced.".into();
    }
    outcomes
        .iter()
        .map(|o| format!("{}: {}", o.tool_name, o.outcome.render()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Step count, call tallies, and one line per tool outcome.
pub fn transcript_summary(memory: &TaskMemory, reason: TerminationReason, steps: u32) -> String {
    let outcomes = memory.outcomes();
    let succeeded = outcomes.iter().filter(|o| o.outcome.is_success()).count();

    let mut summary = format!(
        "Terminated: {reason}\nSteps: {steps}\nTool calls: {} ({succeeded} succeeded, {} failed)",
        outcomes.len(),
        outcomes.len() - succeeded,
    );
    for (i, o) in outcomes.iter().enumerate() {
        summary.push_str(&format!(
            "\n{}. {} -> {}",
            i + 1,
            o.tool_name,
            one_line(&o.outcome.render())
        ));
    }
    summary
}

fn one_line(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= SUMMARY_LINE_CHARS {
        return flat;
    }
    let mut cut: String = flat.chars().take(SUMMARY_LINE_CHARS).collect();
    cut.push_str("...");
    cut
}
