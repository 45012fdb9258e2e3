//! The planner: turns a goal or a transcript into the next plan.
//!
//! Each invocation sends the system instructions, the capability list, and
//! the (possibly windowed) transcript to the provider, then reads a plan out
//! of the reply. An unreadable reply or a timeout gets one corrective retry.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stepwise_core::agent::LoopConfig;
use stepwise_core::error::PlanError;
use stepwise_core::message::{Message, MessageToolCall};
use stepwise_core::provider::{DEFAULT_TEMPERATURE, Provider, ProviderRequest};
use stepwise_core::tool::{ToolCall, ToolRegistry};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::memory::TaskMemory;
use crate::plan_parser::{ParseFailure, normalize_arguments, parse_plan};

const MAX_ATTEMPTS: u32 = 2;

/// One iteration's worth of tool calls, with the text the model wrote around them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub calls: Vec<ToolCall>,
    pub commentary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl Plan {
    /// No calls: the model answered directly.
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Whether any call names the finish tool.
    pub fn calls_tool(&self, name: &str) -> bool {
        self.calls.iter().any(|c| c.name == name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.calls.iter().map(|c| c.name.clone()).collect()
    }

    /// The assistant turn recorded in memory for this plan.
    pub fn to_message(&self) -> Message {
        let content = if self.commentary.is_empty() {
            self.reasoning.clone().unwrap_or_default()
        } else {
            self.commentary.clone()
        };
        Message::assistant_plan(content, &self.calls)
    }
}

pub struct Planner {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    system_prompt: String,
    finish_tool: String,
    native_tool_calls: bool,
    timeout: Duration,
    context_budget_tokens: usize,
}

impl Planner {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, config: &LoopConfig) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            system_prompt: config.system_prompt.clone(),
            finish_tool: config.finish_tool.clone(),
            native_tool_calls: config.native_tool_calls,
            timeout: Duration::from_secs(config.planner_timeout_secs),
            context_budget_tokens: config.context_budget_tokens,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Plan the first step from the goal alone.
    pub async fn produce_initial_plan(
        &self,
        goal: &str,
        registry: &ToolRegistry,
        cancel: &CancellationToken,
    ) -> Result<Plan, PlanError> {
        self.plan_from(vec![Message::user(goal)], HashSet::new(), registry, cancel)
            .await
    }

    /// Plan the next step from what the task has seen so far.
    ///
    /// Falls back to a bounded window when the transcript exceeds the
    /// context budget.
    pub async fn produce_next_plan(
        &self,
        memory: &TaskMemory,
        registry: &ToolRegistry,
        cancel: &CancellationToken,
    ) -> Result<Plan, PlanError> {
        let transcript = memory.window(self.context_budget_tokens);
        if transcript.len() < memory.len() {
            debug!(
                kept = transcript.len(),
                total = memory.len(),
                "Transcript windowed to fit context budget"
            );
        }
        let used_ids = memory
            .transcript()
            .iter()
            .flat_map(|m| m.tool_calls.iter().map(|tc| tc.id.clone()))
            .collect();
        self.plan_from(transcript, used_ids, registry, cancel).await
    }

    /// The system message: instructions, capabilities, and the reply contract.
    pub fn context_document(&self, registry: &ToolRegistry) -> String {
        let mut doc = self.system_prompt.trim_end().to_string();

        doc.push_str("\n\n## Available tools\n");
        if registry.is_empty() {
            doc.push_str("(none)\n");
        }
        for tool in registry.list() {
            doc.push_str(&format!(
                "\n### {}\n{}\nParameters: {}\n",
                tool.name(),
                tool.description(),
                tool.parameters_schema()
            ));
        }

        doc.push_str("\n## Response format\n");
        if self.native_tool_calls {
            doc.push_str(
                "Call tools through function calling. When no further tool use is needed, \
                 reply with your answer in plain text and no tool calls.\n",
            );
        } else {
            doc.push_str(
                "Reply with exactly one JSON object of this form, optionally surrounded by \
                 plain text for the user:\n\
                 {\"reasoning\": \"...\", \"tool_calls\": [{\"name\": \"<tool>\", \"arguments\": {...}}]}\n\
                 Use an empty \"tool_calls\" list when no further tool use is needed, and put \
                 your answer in the text around the object.\n",
            );
        }
        if registry.contains(&self.finish_tool) {
            doc.push_str(&format!(
                "Call `{}` once the task is complete.\n",
                self.finish_tool
            ));
        }
        doc
    }

    /// `used_ids` holds call ids already in the task; provider-supplied ids
    /// that collide with them are replaced.
    async fn plan_from(
        &self,
        transcript: Vec<Message>,
        used_ids: HashSet<String>,
        registry: &ToolRegistry,
        cancel: &CancellationToken,
    ) -> Result<Plan, PlanError> {
        let mut messages = Vec::with_capacity(transcript.len() + 3);
        messages.push(Message::system(self.context_document(registry)));
        messages.extend(transcript);

        let tools = if self.native_tool_calls {
            registry.definitions()
        } else {
            Vec::new()
        };

        let mut failure = PlanError::Timeout(self.timeout);
        for attempt in 1..=MAX_ATTEMPTS {
            let request = ProviderRequest {
                model: self.model.clone(),
                messages: messages.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: tools.clone(),
            };

            let reply = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PlanError::Cancelled),
                reply = tokio::time::timeout(self.timeout, self.provider.complete(request)) => reply,
            };

            let response = match reply {
                Err(_) => {
                    warn!(attempt, timeout = ?self.timeout, "Planner timed out");
                    failure = PlanError::Timeout(self.timeout);
                    continue;
                }
                Ok(Err(e)) => {
                    warn!(provider = %self.provider.name(), error = %e, "Planner provider failed");
                    return Err(PlanError::Provider(e));
                }
                Ok(Ok(response)) => response,
            };

            match self.read_plan(&response.message, &used_ids) {
                Ok(plan) => {
                    debug!(attempt, calls = plan.calls.len(), "Plan produced");
                    return Ok(plan);
                }
                Err(reason) => {
                    warn!(attempt, %reason, "Model reply is not a usable plan");
                    // Only the request sees the bad reply and the correction.
                    messages.push(response.message);
                    messages.push(Message::user(self.correction(&reason)));
                    failure = PlanError::Malformed {
                        reason,
                        attempts: attempt,
                    };
                }
            }
        }
        Err(failure)
    }

    fn correction(&self, reason: &str) -> String {
        if self.native_tool_calls {
            format!(
                "Your previous reply could not be used ({reason}). Call the tools again with \
                 valid names and JSON arguments, or answer in plain text."
            )
        } else {
            format!(
                "Your previous reply could not be used ({reason}). Reply again with exactly one \
                 JSON object of the form {{\"reasoning\": \"...\", \"tool_calls\": [{{\"name\": \
                 \"<tool>\", \"arguments\": {{...}}}}]}}."
            )
        }
    }

    fn read_plan(&self, message: &Message, used_ids: &HashSet<String>) -> Result<Plan, String> {
        if self.native_tool_calls && !message.tool_calls.is_empty() {
            let mut seen = used_ids.clone();
            let calls = message
                .tool_calls
                .iter()
                .map(|tc| native_call(tc, &mut seen))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Plan {
                calls,
                commentary: message.content.trim().to_string(),
                reasoning: None,
            });
        }

        match parse_plan(&message.content) {
            Ok(parsed) => Ok(Plan {
                calls: parsed
                    .calls
                    .into_iter()
                    .map(|raw| ToolCall::new(new_call_id(), raw.name, raw.arguments))
                    .collect(),
                commentary: parsed.commentary,
                reasoning: parsed.reasoning,
            }),
            // A plain answer is an empty plan when tools travel natively.
            Err(ParseFailure::NoPlanObject) if self.native_tool_calls => Ok(Plan {
                calls: Vec::new(),
                commentary: message.content.trim().to_string(),
                reasoning: None,
            }),
            Err(failure) => Err(failure.to_string()),
        }
    }
}

/// Convert a provider tool call, minting an id when it is missing or
/// already in `seen`.
fn native_call(tc: &MessageToolCall, seen: &mut HashSet<String>) -> Result<ToolCall, String> {
    let name = tc.name.trim();
    if name.is_empty() {
        return Err("a native tool call has no name".into());
    }
    let id = if tc.id.is_empty() || !seen.insert(tc.id.clone()) {
        new_call_id()
    } else {
        tc.id.clone()
    };
    let arguments = normalize_arguments(serde_json::Value::String(tc.arguments.clone()));
    Ok(ToolCall::new(id, name, arguments))
}

fn new_call_id() -> String {
    format!("call_{}", Uuid::new_v4().simple())
}
