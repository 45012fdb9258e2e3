//! Shared test helpers: a scripted provider and a few fixture tools.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use stepwise_core::error::{ProviderError, ToolError};
use stepwise_core::message::Message;
use stepwise_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use stepwise_core::tool::{Tool, ToolOutput, ToolRegistry};

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue.
/// Panics if more calls are made than responses provided, unless built
/// with [`SequentialMockProvider::repeating`].
pub struct SequentialMockProvider {
    responses: Vec<Result<ProviderResponse, ProviderError>>,
    repeat_last: bool,
    delay: Option<Duration>,
    call_count: AtomicUsize,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    pub fn with_results(responses: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            responses,
            repeat_last: false,
            delay: None,
            call_count: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Returns the same response forever.
    pub fn repeating(response: ProviderResponse) -> Self {
        Self {
            repeat_last: true,
            ..Self::new(vec![response])
        }
    }

    /// Sleep before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let call = self.call_count.fetch_add(1, Ordering::SeqCst);

        let index = if self.repeat_last {
            call.min(self.responses.len().saturating_sub(1))
        } else {
            call
        };
        let Some(response) = self.responses.get(index).cloned() else {
            panic!(
                "SequentialMockProvider: no more responses (call #{call}, have {})",
                self.responses.len()
            );
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        response
    }
}

/// Wrap a message in a provider response.
pub fn response_with(message: Message) -> ProviderResponse {
    ProviderResponse {
        message,
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// A reply with no plan object at all.
pub fn text_response(text: &str) -> ProviderResponse {
    response_with(Message::assistant(text))
}

/// A text-mode reply: commentary followed by a fenced plan object.
pub fn plan_response(commentary: &str, calls: &[(&str, serde_json::Value)]) -> ProviderResponse {
    let calls: Vec<serde_json::Value> = calls
        .iter()
        .map(|(name, arguments)| serde_json::json!({"name": name, "arguments": arguments}))
        .collect();
    let object = serde_json::json!({ "tool_calls": calls });
    response_with(Message::assistant(format!(
        "{commentary}\n```json\n{object}\n```"
    )))
}

/// `terminate`, `say_hello`, and a fresh [`LookupTool`].
pub fn fixture_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry
        .register(Box::new(stepwise_tools::TerminateTool))
        .unwrap();
    registry
        .register(Box::new(stepwise_tools::SayHelloTool))
        .unwrap();
    registry.register(Box::new(LookupTool::default())).unwrap();
    registry
}

/// Looks up a record by id. Counts how often it actually runs.
#[derive(Default)]
pub struct LookupTool {
    executions: AtomicUsize,
}

impl LookupTool {
    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for LookupTool {
    fn name(&self) -> &str {
        "lookup"
    }
    fn description(&self) -> &str {
        "Fetch a record by id"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": { "id": { "type": "string" } },
            "required": ["id"]
        })
    }
    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        let id = arguments["id"].as_str().unwrap_or_default();
        Ok(ToolOutput::text(format!("record {id}")))
    }
}

/// Panics whenever it runs.
pub struct PanickingTool;

#[async_trait]
impl Tool for PanickingTool {
    fn name(&self) -> &str {
        "explode"
    }
    fn description(&self) -> &str {
        "Always panics"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }
    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        panic!("boom");
    }
}

/// Returns an error whenever it runs.
pub struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "broken"
    }
    fn description(&self) -> &str {
        "Always fails"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }
    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        Err(ToolError::ExecutionFailed {
            tool_name: "broken".into(),
            reason: "disk full".into(),
        })
    }
}

/// Sleeps for `ms` milliseconds.
pub struct SleepyTool;

#[async_trait]
impl Tool for SleepyTool {
    fn name(&self) -> &str {
        "sleepy"
    }
    fn description(&self) -> &str {
        "Sleeps, then reports how long"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": { "ms": { "type": "integer" } },
            "required": ["ms"]
        })
    }
    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let ms = arguments["ms"].as_u64().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(ToolOutput::text(format!("slept {ms}ms")))
    }
}

/// Holds a pretend resource and counts teardowns.
#[derive(Default)]
pub struct TeardownCounter {
    teardowns: AtomicUsize,
}

impl TeardownCounter {
    pub fn count(&self) -> usize {
        self.teardowns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for TeardownCounter {
    fn name(&self) -> &str {
        "resource"
    }
    fn description(&self) -> &str {
        "Owns a connection that must be released"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }
    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        Ok(ToolOutput::text("connected"))
    }
    async fn teardown(&self) -> Result<(), ToolError> {
        self.teardowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
