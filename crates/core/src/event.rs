//! Domain event system: decoupled observation of running tasks.
//!
//! The agent loop publishes events as a task moves through its phases.
//! Anything interested (a CLI progress line, a metrics exporter, a test)
//! subscribes without the loop knowing about it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A task was started for a goal
    TaskStarted {
        task_id: String,
        goal_preview: String,
        timestamp: DateTime<Utc>,
    },

    /// The planner produced a plan for a step
    PlanProduced {
        task_id: String,
        step: u32,
        tool_calls: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// A tool call was dispatched and finished
    ToolExecuted {
        task_id: String,
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A task reached a terminal state
    TaskTerminated {
        task_id: String,
        reason: String,
        steps: u32,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
