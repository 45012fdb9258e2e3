//! Built-in tool implementations for Stepwise.
//!
//! A small set of general-purpose tools: the `terminate` finish tool, two
//! text tools, and a calculator. Applications register their own tools next
//! to these before the registry is shared.

pub mod calculator;
pub mod say_hello;
pub mod terminate;
pub mod uppercase;

use stepwise_core::error::ToolError;
use stepwise_core::tool::ToolRegistry;

pub use calculator::CalculatorTool;
pub use say_hello::SayHelloTool;
pub use terminate::TerminateTool;
pub use uppercase::UppercaseTool;

/// Create a registry holding every built-in tool.
///
/// `terminate` is registered first so it heads the capability list.
pub fn default_registry() -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(TerminateTool))?;
    registry.register(Box::new(SayHelloTool))?;
    registry.register(Box::new(UppercaseTool))?;
    registry.register(Box::new(CalculatorTool))?;
    Ok(registry)
}

/// Read a required string argument.
///
/// Arguments are schema-checked before a tool runs; this covers direct calls
/// that bypass the dispatcher.
pub(crate) fn string_arg<'a>(
    arguments: &'a serde_json::Value,
    field: &str,
) -> Result<&'a str, ToolError> {
    arguments[field]
        .as_str()
        .ok_or_else(|| ToolError::InvalidArguments(format!("missing string field '{field}'")))
}
