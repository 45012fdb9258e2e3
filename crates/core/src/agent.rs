//! Agent loop configuration.

use serde::{Deserialize, Serialize};

/// Settings for the plan/execute/observe loop.
///
/// Maps to the `[agent]` section of the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Maximum planning steps per task (safety limit)
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Consecutive stale steps before the task is stopped; 0 disables the check
    #[serde(default = "default_stagnation_window")]
    pub stagnation_window: u32,

    /// Tool calls from one plan that may run at the same time
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Upper bound on a single model invocation
    #[serde(default = "default_planner_timeout_secs")]
    pub planner_timeout_secs: u64,

    /// Upper bound on a single tool call; unset means no limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_timeout_secs: Option<u64>,

    /// Approximate token budget for the transcript sent to the planner
    #[serde(default = "default_context_budget_tokens")]
    pub context_budget_tokens: usize,

    /// Name of the tool whose presence in a plan ends the task
    #[serde(default = "default_finish_tool")]
    pub finish_tool: String,

    /// Offer tools through the provider's native function calling
    #[serde(default)]
    pub native_tool_calls: bool,

    /// System instructions placed at the top of every planning context
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_max_steps() -> u32 {
    15
}
fn default_stagnation_window() -> u32 {
    3
}
fn default_max_concurrency() -> usize {
    4
}
fn default_planner_timeout_secs() -> u64 {
    120
}
fn default_context_budget_tokens() -> usize {
    8000
}
fn default_finish_tool() -> String {
    "terminate".into()
}
fn default_system_prompt() -> String {
    "You are a careful agent that completes the user's task with the tools provided. \
     Work step by step: each step may call tools, and you will see their results \
     before planning the next one. Choose tools that fit the task and supply every \
     required argument."
        .into()
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            stagnation_window: default_stagnation_window(),
            max_concurrency: default_max_concurrency(),
            planner_timeout_secs: default_planner_timeout_secs(),
            tool_timeout_secs: None,
            context_budget_tokens: default_context_budget_tokens(),
            finish_tool: default_finish_tool(),
            native_tool_calls: false,
            system_prompt: default_system_prompt(),
        }
    }
}
