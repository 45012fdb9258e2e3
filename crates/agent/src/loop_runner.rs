//! The iteration controller: drives one task through plan, execute, observe.
//!
//! ```text
//! START -> PLANNING -> EXECUTING -> OBSERVING -> PLANNING | TERMINATED
//! ```
//!
//! Every exit path, including planner failures, cancellation, and panics,
//! runs the registry's teardown exactly once before the result is built.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use stepwise_core::agent::LoopConfig;
use stepwise_core::error::PlanError;
use stepwise_core::event::{DomainEvent, EventBus};
use stepwise_core::message::Message;
use stepwise_core::provider::Provider;
use stepwise_core::tool::{ToolCall, ToolRegistry};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::aggregator::{FinalResult, aggregate};
use crate::dispatcher::{DispatchRecord, Dispatcher, panic_message};
use crate::memory::TaskMemory;
use crate::planner::{Plan, Planner};

/// Why a task stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TerminationReason {
    /// A plan called the finish tool
    Finished,
    /// A plan had no calls; the model answered directly
    NoAction,
    StepBudgetExceeded,
    Stagnated,
    /// The planner could not produce a readable plan, even after retrying
    MalformedPlan,
    /// The provider behind the planner failed
    PlannerError,
    Cancelled,
    /// A panic escaped the loop
    Fault,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Finished => "finished",
            Self::NoAction => "no-action",
            Self::StepBudgetExceeded => "step-budget-exceeded",
            Self::Stagnated => "stagnated",
            Self::MalformedPlan => "malformed-plan",
            Self::PlannerError => "planner-error",
            Self::Cancelled => "cancelled",
            Self::Fault => "fault",
        }
    }

    /// Budget and stagnation stops are reported, not failures.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::MalformedPlan | Self::PlannerError | Self::Cancelled | Self::Fault
        )
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&PlanError> for TerminationReason {
    fn from(err: &PlanError) -> Self {
        match err {
            e if e.is_malformed() => Self::MalformedPlan,
            PlanError::Cancelled => Self::Cancelled,
            _ => Self::PlannerError,
        }
    }
}

/// State-machine position of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    Planning,
    Executing,
    Observing,
    Terminated,
}

/// Detects steps that add nothing new.
///
/// A step is stale when its calls (names and arguments) and all of its
/// outcomes (kind and text) were already seen in this task. `window`
/// consecutive stale steps mean the task is stuck.
#[derive(Debug, Clone, Default)]
pub struct StagnationDetector {
    window: u32,
    seen_plans: HashSet<String>,
    seen_outcomes: HashSet<String>,
    stale_streak: u32,
}

impl StagnationDetector {
    /// `window == 0` disables detection.
    pub fn new(window: u32) -> Self {
        Self {
            window,
            ..Self::default()
        }
    }

    /// Record a step. Returns true once the stale streak reaches the window.
    pub fn observe(&mut self, calls: &[ToolCall], records: &[DispatchRecord]) -> bool {
        let plan_fingerprint = serde_json::Value::Array(
            calls
                .iter()
                .map(|c| serde_json::json!([c.name, c.arguments]))
                .collect(),
        )
        .to_string();
        let new_plan = self.seen_plans.insert(plan_fingerprint);

        let mut new_outcome = false;
        for record in records {
            let kind = record
                .outcome
                .failure_kind()
                .map_or("success", |k| k.as_str());
            let fingerprint = format!("{kind}\u{1f}{}", record.outcome.render());
            new_outcome |= self.seen_outcomes.insert(fingerprint);
        }

        if new_plan || new_outcome {
            self.stale_streak = 0;
        } else {
            self.stale_streak += 1;
        }
        self.window > 0 && self.stale_streak >= self.window
    }

    pub fn stale_streak(&self) -> u32 {
        self.stale_streak
    }
}

/// Everything one task owns while it runs.
#[derive(Debug)]
pub struct AgentState {
    pub task_id: String,
    pub goal: String,
    pub memory: TaskMemory,
    pub step: u32,
    pub phase: Phase,
    pub stagnation: StagnationDetector,
}

impl AgentState {
    pub fn new(goal: impl Into<String>, stagnation_window: u32) -> Self {
        let goal = goal.into();
        Self {
            task_id: Uuid::new_v4().to_string(),
            memory: TaskMemory::with_goal(goal.clone()),
            goal,
            step: 0,
            phase: Phase::Start,
            stagnation: StagnationDetector::new(stagnation_window),
        }
    }
}

/// The agent loop: plans with a provider, acts through the tool registry.
///
/// One `AgentLoop` can run many tasks, concurrently if wanted; each run gets
/// its own [`AgentState`]. The registry is shared read-only.
pub struct AgentLoop {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    /// Temperature setting
    temperature: f32,

    /// Max tokens per model response
    max_tokens: Option<u32>,

    /// Tool registry
    tools: Arc<ToolRegistry>,

    /// Loop limits and planning settings
    config: LoopConfig,

    /// Event bus for domain events
    event_bus: Arc<EventBus>,
}

impl AgentLoop {
    /// Create a new agent loop with default loop settings.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: None,
            tools,
            config: LoopConfig::default(),
            event_bus,
        }
    }

    /// Replace the loop settings.
    pub fn with_config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the maximum number of steps per task.
    pub fn with_max_steps(mut self, max: u32) -> Self {
        self.config.max_steps = max;
        self
    }

    /// Set the default max tokens per LLM response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Run a task to completion.
    pub async fn run(&self, goal: &str) -> FinalResult {
        self.run_with_cancel(goal, CancellationToken::new()).await
    }

    /// Run a task that stops early once `cancel` fires.
    pub async fn run_with_cancel(&self, goal: &str, cancel: CancellationToken) -> FinalResult {
        let mut state = AgentState::new(goal, self.config.stagnation_window);

        info!(
            task_id = %state.task_id,
            max_steps = self.config.max_steps,
            tools = self.tools.len(),
            "Task started"
        );
        self.event_bus.publish(DomainEvent::TaskStarted {
            task_id: state.task_id.clone(),
            goal_preview: goal.chars().take(80).collect(),
            timestamp: chrono::Utc::now(),
        });

        let reason = match AssertUnwindSafe(self.drive(&mut state, &cancel))
            .catch_unwind()
            .await
        {
            Ok(reason) => reason,
            Err(panic) => {
                error!(
                    task_id = %state.task_id,
                    step = state.step,
                    panic = panic_message(panic.as_ref()),
                    "Agent loop panicked"
                );
                TerminationReason::Fault
            }
        };
        state.phase = Phase::Terminated;

        self.teardown(&state.task_id).await;

        info!(
            task_id = %state.task_id,
            steps = state.step,
            reason = %reason,
            "Task terminated"
        );
        self.event_bus.publish(DomainEvent::TaskTerminated {
            task_id: state.task_id.clone(),
            reason: reason.to_string(),
            steps: state.step,
            timestamp: chrono::Utc::now(),
        });

        aggregate(&state.memory, reason, state.step, &state.task_id)
    }

    async fn drive(&self, state: &mut AgentState, cancel: &CancellationToken) -> TerminationReason {
        let planner = Planner::new(self.provider.clone(), self.model.clone(), &self.config)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        let dispatcher = Dispatcher::new(self.tools.clone(), self.event_bus.clone())
            .with_max_concurrency(self.config.max_concurrency)
            .with_tool_timeout(self.config.tool_timeout_secs.map(Duration::from_secs));

        loop {
            if cancel.is_cancelled() {
                return TerminationReason::Cancelled;
            }
            if state.step >= self.config.max_steps {
                warn!(task_id = %state.task_id, steps = state.step, "Step budget exhausted");
                return TerminationReason::StepBudgetExceeded;
            }

            state.phase = Phase::Planning;
            let planned = if state.step == 0 {
                planner
                    .produce_initial_plan(&state.goal, &self.tools, cancel)
                    .await
            } else {
                planner
                    .produce_next_plan(&state.memory, &self.tools, cancel)
                    .await
            };
            let plan = match planned {
                Ok(plan) => plan,
                Err(e) => {
                    warn!(task_id = %state.task_id, step = state.step + 1, error = %e, "Planning failed");
                    return TerminationReason::from(&e);
                }
            };

            debug!(
                task_id = %state.task_id,
                step = state.step + 1,
                calls = plan.calls.len(),
                "Plan produced"
            );
            self.event_bus.publish(DomainEvent::PlanProduced {
                task_id: state.task_id.clone(),
                step: state.step + 1,
                tool_calls: plan.tool_names(),
                timestamp: chrono::Utc::now(),
            });
            state.memory.append(plan.to_message());

            if cancel.is_cancelled() {
                return TerminationReason::Cancelled;
            }

            let records = if plan.is_empty() {
                Vec::new()
            } else {
                state.phase = Phase::Executing;
                dispatcher.execute(&state.task_id, &plan.calls, cancel).await
            };
            for record in &records {
                state
                    .memory
                    .append(Message::tool_result(&record.call.id, record.outcome.clone()));
            }

            if cancel.is_cancelled() {
                return TerminationReason::Cancelled;
            }

            state.phase = Phase::Observing;
            state.step += 1;
            if let Some(reason) = self.observe(state, &plan, &records) {
                return reason;
            }
        }
    }

    /// Decide whether the task ends after this step.
    fn observe(
        &self,
        state: &mut AgentState,
        plan: &Plan,
        records: &[DispatchRecord],
    ) -> Option<TerminationReason> {
        if plan.is_empty() {
            return Some(TerminationReason::NoAction);
        }
        if plan.calls_tool(&self.config.finish_tool) {
            return Some(TerminationReason::Finished);
        }
        if state.step >= self.config.max_steps {
            warn!(
                task_id = %state.task_id,
                steps = state.step,
                "Step budget exhausted"
            );
            return Some(TerminationReason::StepBudgetExceeded);
        }
        if state.stagnation.observe(&plan.calls, records) {
            warn!(
                task_id = %state.task_id,
                stale_steps = state.stagnation.stale_streak(),
                "No new information, stopping"
            );
            return Some(TerminationReason::Stagnated);
        }
        None
    }

    async fn teardown(&self, task_id: &str) {
        match AssertUnwindSafe(self.tools.teardown_all())
            .catch_unwind()
            .await
        {
            Ok(0) => debug!(task_id, "Tools torn down"),
            Ok(failures) => warn!(task_id, failures, "Some tools failed to tear down"),
            Err(panic) => error!(
                task_id,
                panic = panic_message(panic.as_ref()),
                "Tool teardown panicked"
            ),
        }
    }
}
