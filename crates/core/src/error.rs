//! Error types for the Stepwise domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use std::time::Duration;
use thiserror::Error;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Errors raised by tools and by the registry that holds them.
///
/// None of these escape the dispatcher: each is folded into a
/// [`ToolOutcome::Failure`](crate::tool::ToolOutcome) before it reaches memory.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool already registered: {0}")]
    Duplicate(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },
}

/// Step-level planning failures.
#[derive(Debug, Clone, Error)]
pub enum PlanError {
    /// The model response could not be turned into a plan, even after the
    /// corrective retry.
    #[error("Malformed plan after {attempts} attempt(s): {reason}")]
    Malformed { reason: String, attempts: u32 },

    #[error("Planner timed out after {0:?}")]
    Timeout(Duration),

    #[error("Planner provider failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Planning cancelled")]
    Cancelled,
}

impl PlanError {
    /// Whether this failure counts as a malformed plan for termination purposes.
    ///
    /// Timeouts are treated like unparseable responses.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. } | Self::Timeout(_))
    }
}
