//! The dispatcher: runs a plan's tool calls and normalizes every result.
//!
//! Each call goes through resolve, validate, execute. Nothing a tool does
//! escapes as an error or a panic; every call yields exactly one
//! [`ToolOutcome`]. Calls run concurrently up to a limit, and records come
//! back in plan order.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{FutureExt, StreamExt};
use serde::{Deserialize, Serialize};
use stepwise_core::error::ToolError;
use stepwise_core::event::{DomainEvent, EventBus};
use stepwise_core::schema::validate_arguments;
use stepwise_core::tool::{FailureKind, ToolCall, ToolOutcome, ToolRegistry};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// One executed call and what came of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub call: ToolCall,
    pub outcome: ToolOutcome,
    pub duration_ms: u64,
}

pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    event_bus: Arc<EventBus>,
    max_concurrency: usize,
    tool_timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>, event_bus: Arc<EventBus>) -> Self {
        Self {
            registry,
            event_bus,
            max_concurrency: 1,
            tool_timeout: None,
        }
    }

    /// Calls from one plan allowed in flight at once. 1 means sequential.
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = limit.max(1);
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Execute every call, returning one record per call in the order given.
    pub async fn execute(
        &self,
        task_id: &str,
        calls: &[ToolCall],
        cancel: &CancellationToken,
    ) -> Vec<DispatchRecord> {
        let pending: Vec<_> = calls
            .iter()
            .map(|call| self.dispatch_one(task_id, call, cancel))
            .collect();
        futures::stream::iter(pending)
            .buffered(self.max_concurrency)
            .collect()
            .await
    }

    async fn dispatch_one(
        &self,
        task_id: &str,
        call: &ToolCall,
        cancel: &CancellationToken,
    ) -> DispatchRecord {
        let start = Instant::now();
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => ToolOutcome::failure(
                FailureKind::Cancelled,
                "task was cancelled before the call completed",
            ),
            outcome = self.invoke(call) => outcome,
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome.failure_kind() {
            None => debug!(task_id, tool = %call.name, duration_ms, "Tool call succeeded"),
            Some(kind) => warn!(
                task_id,
                tool = %call.name,
                duration_ms,
                kind = %kind,
                "Tool call failed"
            ),
        }

        self.event_bus.publish(DomainEvent::ToolExecuted {
            task_id: task_id.to_string(),
            tool_name: call.name.clone(),
            success: outcome.is_success(),
            duration_ms,
            timestamp: chrono::Utc::now(),
        });

        DispatchRecord {
            call: call.clone(),
            outcome,
            duration_ms,
        }
    }

    /// Run one call inside the fault boundary and the optional time limit.
    async fn invoke(&self, call: &ToolCall) -> ToolOutcome {
        let guarded = AssertUnwindSafe(self.resolve_and_execute(call)).catch_unwind();
        let result = match self.tool_timeout {
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(result) => result,
                Err(_) => {
                    let e = ToolError::Timeout {
                        tool_name: call.name.clone(),
                        timeout_secs: limit.as_secs(),
                    };
                    return ToolOutcome::failure(FailureKind::ExecutionError, e.to_string());
                }
            },
            None => guarded.await,
        };

        result.unwrap_or_else(|panic| {
            ToolOutcome::failure(
                FailureKind::ExecutionError,
                format!("tool '{}' panicked: {}", call.name, panic_message(panic.as_ref())),
            )
        })
    }

    /// Resolve, validate, and execute. Runs inside [`Self::invoke`]'s guard.
    async fn resolve_and_execute(&self, call: &ToolCall) -> ToolOutcome {
        let tool = match self.registry.resolve(&call.name) {
            Ok(tool) => tool,
            Err(e) => return ToolOutcome::failure(FailureKind::ToolNotFound, e.to_string()),
        };

        let arguments = if call.arguments.is_null() {
            serde_json::json!({})
        } else {
            call.arguments.clone()
        };
        if let Err(e) = validate_arguments(&tool.parameters_schema(), &arguments) {
            return ToolOutcome::failure(FailureKind::ToolArgumentError, e.to_string());
        }

        match tool.execute(arguments).await {
            Ok(output) => output.into(),
            Err(e) => ToolOutcome::failure(FailureKind::ExecutionError, e.to_string()),
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
