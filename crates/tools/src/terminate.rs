//! The finish tool. A plan that calls it ends the task after the step.

use async_trait::async_trait;
use stepwise_core::error::ToolError;
use stepwise_core::tool::{Tool, ToolOutput};

pub struct TerminateTool;

#[async_trait]
impl Tool for TerminateTool {
    fn name(&self) -> &str {
        "terminate"
    }

    fn description(&self) -> &str {
        "Call this when the task is complete or cannot make further progress. \
         Put the final answer for the user in 'reason'."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "reason": {
                    "type": "string",
                    "description": "Final answer or the reason for stopping"
                }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let reason = arguments["reason"].as_str().unwrap_or("Task finished");
        Ok(ToolOutput::text(reason))
    }
}
