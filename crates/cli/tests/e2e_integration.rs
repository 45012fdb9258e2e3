//! End-to-end integration tests for the Stepwise agent loop.
//!
//! These tests exercise the full pipeline from goal to final result using
//! the built-in tool registry and a scripted provider.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use stepwise_agent::{AgentLoop, TerminationReason};
use stepwise_core::LoopConfig;
use stepwise_core::error::ProviderError;
use stepwise_core::event::EventBus;
use stepwise_core::message::{Message, Role};
use stepwise_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use stepwise_tools::default_registry;

// ── Mock Provider ────────────────────────────────────────────────────────

/// A mock provider that returns scripted responses in sequence.
/// The last response repeats once the script runs out.
struct ScriptedProvider {
    responses: Vec<ProviderResponse>,
    call_count: AtomicUsize,
    last_request: std::sync::Mutex<Option<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses,
            call_count: AtomicUsize::new(0),
            last_request: std::sync::Mutex::new(None),
        }
    }

    fn calls(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn last_request(&self) -> ProviderRequest {
        self.last_request.lock().unwrap().clone().unwrap()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        *self.last_request.lock().unwrap() = Some(request);
        let n = self.call_count.fetch_add(1, Ordering::SeqCst);
        let index = n.min(self.responses.len() - 1);
        Ok(self.responses[index].clone())
    }
}

fn reply(text: String) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock".into(),
    }
}

fn plan(commentary: &str, calls: serde_json::Value) -> ProviderResponse {
    let object = serde_json::json!({ "reasoning": "scripted", "tool_calls": calls });
    reply(format!("{commentary}\n{object}"))
}

fn agent(provider: Arc<ScriptedProvider>) -> AgentLoop {
    AgentLoop::new(
        provider,
        "mock",
        0.0,
        Arc::new(default_registry().unwrap()),
        Arc::new(EventBus::default()),
    )
}

// ── E2E: Full pipeline ───────────────────────────────────────────────────

#[tokio::test]
async fn e2e_calculator_then_terminate() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        plan(
            "Let me compute that.",
            serde_json::json!([{"name": "calculator", "arguments": {"expression": "6 * 7"}}]),
        ),
        plan(
            "6 times 7 is 42.",
            serde_json::json!([{"name": "terminate", "arguments": {"reason": "42"}}]),
        ),
    ]));

    let result = agent(provider.clone()).run("What is 6 times 7?").await;

    assert_eq!(result.termination_reason, TerminationReason::Finished);
    assert_eq!(result.steps, 2);
    assert_eq!(result.text, "6 times 7 is 42.");
    assert_eq!(provider.calls(), 2);

    // The second planning request carried the calculator result.
    let request = provider.last_request();
    let tool_msg = request
        .messages
        .iter()
        .find(|m| m.role == Role::Tool)
        .expect("tool result in transcript");
    assert_eq!(tool_msg.content, "42");
    assert!(result.transcript_summary.contains("calculator -> 42"));
}

#[tokio::test]
async fn e2e_direct_answer_without_tools() {
    let provider = Arc::new(ScriptedProvider::new(vec![reply(
        "Hello there! {\"tool_calls\": []}".into(),
    )]));

    let result = agent(provider.clone()).run("Say hello").await;

    assert_eq!(result.termination_reason, TerminationReason::NoAction);
    assert_eq!(result.steps, 1);
    assert_eq!(result.text, "Hello there!");
}

#[tokio::test]
async fn e2e_argument_error_is_corrected() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        plan(
            "Greeting.",
            serde_json::json!([{"name": "say_hello", "arguments": {}}]),
        ),
        plan(
            "Greeting properly.",
            serde_json::json!([{"name": "say_hello", "arguments": {"input_text": "Hi Sam"}}]),
        ),
        plan("Done greeting Sam.", serde_json::json!([])),
    ]));

    let result = agent(provider).run("Greet Sam").await;

    assert_eq!(result.termination_reason, TerminationReason::NoAction);
    assert_eq!(result.steps, 3);
    assert!(result.transcript_summary.contains("say_hello -> Error [ToolArgumentError]"));
    assert!(
        result
            .transcript_summary
            .contains("say_hello -> Hi Sam! I'm say_hello, nice to meet you")
    );
}

#[tokio::test]
async fn e2e_step_budget_is_reported() {
    let provider = Arc::new(ScriptedProvider::new(vec![plan(
        "Shouting again.",
        serde_json::json!([{"name": "uppercase", "arguments": {"input_text": "again"}}]),
    )]));

    let result = agent(provider.clone())
        .with_max_steps(3)
        .run("Keep going")
        .await;

    assert_eq!(result.termination_reason, TerminationReason::StepBudgetExceeded);
    assert_eq!(result.steps, 3);
    assert_eq!(provider.calls(), 3);
    assert!(result.transcript_summary.contains("Tool calls: 3 (3 succeeded, 0 failed)"));
}

#[tokio::test]
async fn e2e_garbage_replies_end_as_malformed_plan() {
    let provider = Arc::new(ScriptedProvider::new(vec![reply("I am not sure.".into())]));

    let result = agent(provider.clone()).run("Anything").await;

    assert_eq!(result.termination_reason, TerminationReason::MalformedPlan);
    assert_eq!(result.steps, 0);
    assert_eq!(provider.calls(), 2);
    // The correction never reaches memory, so nothing else was recorded.
    assert_eq!(result.text, "No answer was produced.");
}

#[tokio::test]
async fn e2e_stagnation_stops_a_stuck_task() {
    let provider = Arc::new(ScriptedProvider::new(vec![plan(
        "Trying once more.",
        serde_json::json!([{"name": "calculator", "arguments": {"expression": "1 / 0"}}]),
    )]));

    let config = LoopConfig {
        stagnation_window: 2,
        ..LoopConfig::default()
    };
    let result = agent(provider).with_config(config).run("Divide by zero").await;

    assert_eq!(result.termination_reason, TerminationReason::Stagnated);
    assert_eq!(result.steps, 3);
    assert!(result.transcript_summary.contains("division by zero"));
}

#[tokio::test]
async fn e2e_free_function_surface() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        plan(
            "",
            serde_json::json!([{"name": "uppercase", "arguments": {"input_text": "quiet"}}]),
        ),
        plan("", serde_json::json!([])),
    ]));

    let result = stepwise_agent::run(
        "Make it loud",
        5,
        Arc::new(default_registry().unwrap()),
        provider,
    )
    .await;

    // Plans carried only reasoning, which becomes the assistant text.
    assert_eq!(result.termination_reason, TerminationReason::NoAction);
    assert_eq!(result.text, "scripted");
    assert!(result.transcript_summary.contains("uppercase -> QUIET"));
}

#[tokio::test]
async fn e2e_result_serializes_for_json_output() {
    let provider = Arc::new(ScriptedProvider::new(vec![plan(
        "All done.",
        serde_json::json!([{"name": "terminate", "arguments": {}}]),
    )]));

    let result = agent(provider).run("Finish").await;
    let value = serde_json::to_value(&result).unwrap();

    assert_eq!(value["termination_reason"], "finished");
    assert_eq!(value["steps"], 1);
    assert_eq!(value["text"], "All done.");
    assert!(value["task_id"].as_str().is_some_and(|id| !id.is_empty()));
}

#[tokio::test]
async fn e2e_parallel_tasks_share_the_registry() {
    let registry = Arc::new(default_registry().unwrap());

    let mut handles = Vec::new();
    for i in 0..8 {
        let provider = Arc::new(ScriptedProvider::new(vec![
            plan(
                "",
                serde_json::json!([{"name": "calculator", "arguments": {"expression": format!("{i} * 10")}}]),
            ),
            plan(&format!("Result {}", i * 10), serde_json::json!([])),
        ]));
        let agent = AgentLoop::new(
            provider,
            "mock",
            0.0,
            registry.clone(),
            Arc::new(EventBus::default()),
        );
        handles.push(tokio::spawn(async move { agent.run(&format!("compute {i}")).await }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let result = handle.await.unwrap();
        assert_eq!(result.text, format!("Result {}", i * 10));
        assert_eq!(result.termination_reason, TerminationReason::NoAction);
    }
}
