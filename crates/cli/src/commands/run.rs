//! `stepwise run`: Run one task to completion.

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use stepwise_agent::{AgentLoop, FinalResult};
use stepwise_config::AppConfig;
use stepwise_core::event::{DomainEvent, EventBus};
use stepwise_providers::OpenAiCompatProvider;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub async fn run(
    goal: Option<String>,
    max_steps: Option<u32>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Fail early with setup instructions when no key is set
    let Some(api_key) = config.api_key.clone() else {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    STEPWISE_API_KEY=...");
        eprintln!("    OPENAI_API_KEY=sk-...");
        eprintln!();
        eprintln!("  Or add `api_key` to your config file:");
        eprintln!("    {}", AppConfig::config_path().display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    };

    let goal = resolve_goal(goal, std::io::stdin())?;

    if let Some(max_steps) = max_steps {
        if max_steps == 0 {
            return Err("--max-steps must be at least 1".into());
        }
        config.agent.max_steps = max_steps;
    }

    let provider = Arc::new(provider_from(&config, api_key));
    let tools = Arc::new(stepwise_tools::default_registry()?);
    let event_bus = Arc::new(EventBus::default());

    if !json {
        spawn_progress_printer(&event_bus);
    }

    let agent = AgentLoop::new(
        provider,
        config.provider.model.clone(),
        config.provider.temperature,
        tools,
        event_bus,
    )
    .with_config(config.agent.clone())
    .with_max_tokens(config.provider.max_tokens);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling task");
            on_interrupt.cancel();
        }
    });

    let result = agent.run_with_cancel(&goal, cancel).await;
    print_result(&result, json)?;

    if result.is_success() {
        Ok(())
    } else {
        Err(format!("task ended: {}", result.termination_reason).into())
    }
}

/// The configured OpenAI-compatible provider.
pub(crate) fn provider_from(config: &AppConfig, api_key: String) -> OpenAiCompatProvider {
    OpenAiCompatProvider::with_timeout(
        config.provider.name.clone(),
        config.provider.base_url.clone(),
        api_key,
        Duration::from_secs(config.provider.timeout_secs),
    )
}

/// Take the goal from the argument, or read it from `input`.
fn resolve_goal(arg: Option<String>, mut input: impl Read) -> Result<String, String> {
    let goal = match arg {
        Some(goal) => goal,
        None => {
            let mut buf = String::new();
            input
                .read_to_string(&mut buf)
                .map_err(|e| format!("Failed to read goal from stdin: {e}"))?;
            buf
        }
    };
    let goal = goal.trim();
    if goal.is_empty() {
        return Err("The goal is empty".into());
    }
    Ok(goal.to_string())
}

/// One stderr line per plan while the task runs.
fn spawn_progress_printer(event_bus: &EventBus) {
    let mut rx = event_bus.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            if let DomainEvent::PlanProduced {
                step, tool_calls, ..
            } = event.as_ref()
            {
                if tool_calls.is_empty() {
                    eprintln!("  step {step}: answering");
                } else {
                    eprintln!("  step {step}: {}", tool_calls.join(", "));
                }
            }
        }
    });
}

fn print_result(result: &FinalResult, json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        println!("{}", result.text);
        eprintln!();
        for line in result.transcript_summary.lines() {
            eprintln!("  {line}");
        }
    }
    Ok(())
}
