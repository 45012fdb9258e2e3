use async_trait::async_trait;
use stepwise_core::error::ToolError;
use stepwise_core::tool::{Tool, ToolOutput};

/// Converts text to upper case.
pub struct UppercaseTool;

#[async_trait]
impl Tool for UppercaseTool {
    fn name(&self) -> &str {
        "uppercase"
    }

    fn description(&self) -> &str {
        "Convert the given text to upper case."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "input_text": {
                    "type": "string",
                    "description": "Text to convert"
                }
            },
            "required": ["input_text"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let input = crate::string_arg(&arguments, "input_text")?;
        Ok(ToolOutput::text(input.to_uppercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn uppercases_unicode() {
        let out = UppercaseTool
            .execute(serde_json::json!({"input_text": "straße ok"}))
            .await
            .unwrap();
        assert_eq!(out.text, "STRASSE OK");
    }
}
