//! Greeting tool, mostly useful for wiring checks against a live model.

use async_trait::async_trait;
use stepwise_core::error::ToolError;
use stepwise_core::tool::{Tool, ToolOutput};

pub struct SayHelloTool;

#[async_trait]
impl Tool for SayHelloTool {
    fn name(&self) -> &str {
        "say_hello"
    }

    fn description(&self) -> &str {
        "Greet someone by name."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "input_text": {
                    "type": "string",
                    "description": "Who or what to greet"
                }
            },
            "required": ["input_text"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let input = crate::string_arg(&arguments, "input_text")?;
        Ok(ToolOutput::text(format!(
            "{input}! I'm say_hello, nice to meet you"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn greets() {
        let out = SayHelloTool
            .execute(serde_json::json!({"input_text": "Hello Ada"}))
            .await
            .unwrap();
        assert_eq!(out.text, "Hello Ada! I'm say_hello, nice to meet you");
    }

    #[tokio::test]
    async fn missing_input_is_invalid() {
        let err = SayHelloTool.execute(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
