//! The agent loop: the heart of Stepwise.
//!
//! A task follows a **Plan → Execute → Observe** cycle:
//!
//! 1. **Plan**: the [`Planner`] asks the model for the next tool calls
//! 2. **Execute**: the [`Dispatcher`] runs them, each inside a fault boundary
//! 3. **Observe**: outcomes land in [`TaskMemory`]; the [`AgentLoop`] decides
//!    whether to finish, stop on budget or stagnation, or plan again
//!
//! When the task ends, every tool is torn down and the transcript is
//! rendered into a [`FinalResult`].

pub mod aggregator;
pub mod dispatcher;
pub mod loop_runner;
pub mod memory;
pub mod plan_parser;
pub mod planner;
pub mod token;

#[cfg(test)]
mod test_helpers;

use std::sync::Arc;

use stepwise_core::event::EventBus;
use stepwise_core::provider::{DEFAULT_MODEL, DEFAULT_TEMPERATURE, Provider};
use stepwise_core::tool::ToolRegistry;

pub use aggregator::FinalResult;
pub use dispatcher::{DispatchRecord, Dispatcher};
pub use loop_runner::{AgentLoop, AgentState, Phase, StagnationDetector, TerminationReason};
pub use memory::TaskMemory;
pub use planner::{Plan, Planner};

/// Run one task with default settings and the given step budget.
pub async fn run(
    goal: &str,
    max_steps: u32,
    tools: Arc<ToolRegistry>,
    provider: Arc<dyn Provider>,
) -> FinalResult {
    AgentLoop::new(
        provider,
        DEFAULT_MODEL,
        DEFAULT_TEMPERATURE,
        tools,
        Arc::new(EventBus::default()),
    )
    .with_max_steps(max_steps)
    .run(goal)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;

    #[tokio::test]
    async fn free_function_runs_a_task() {
        let provider = Arc::new(SequentialMockProvider::new(vec![plan_response(
            "",
            &[("say_hello", serde_json::json!({"input_text": "Hi Bo"}))],
        ), plan_response("Greeted Bo.", &[])]));
        let result = run("greet Bo", 5, Arc::new(fixture_registry()), provider.clone()).await;

        assert_eq!(result.termination_reason, TerminationReason::NoAction);
        assert_eq!(result.steps, 2);
        assert_eq!(result.text, "Greeted Bo.");
        assert_eq!(provider.requests()[0].model, DEFAULT_MODEL);
    }

    #[tokio::test]
    async fn zero_budget_makes_no_provider_calls() {
        let provider = Arc::new(SequentialMockProvider::repeating(plan_response("", &[])));
        let result = run("g", 0, Arc::new(fixture_registry()), provider.clone()).await;

        assert_eq!(result.termination_reason, TerminationReason::StepBudgetExceeded);
        assert_eq!(result.steps, 0);
        assert_eq!(provider.call_count(), 0);
    }
}
