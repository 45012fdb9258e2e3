//! # Stepwise Core
//!
//! Domain types, traits, and error definitions for the Stepwise agent loop.
//! This crate has **no network or storage dependencies**: it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the loop is a trait here. Implementations live in
//! their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;
pub mod schema;
pub mod agent;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{PlanError, ProviderError, ToolError};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use tool::{FailureKind, Tool, ToolCall, ToolOutcome, ToolOutput, ToolRegistry};
pub use agent::LoopConfig;
pub use event::{DomainEvent, EventBus};
