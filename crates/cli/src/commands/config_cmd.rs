//! `stepwise config`: Show the effective configuration.

use stepwise_config::AppConfig;
use stepwise_core::provider::Provider;

use super::run::provider_from;

pub fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    println!("# {}", AppConfig::config_path().display());
    if !config.has_api_key() {
        println!("# No API key set (set STEPWISE_API_KEY or OPENAI_API_KEY)");
    }
    println!("{}", config.to_toml());
    Ok(())
}

pub fn path() {
    println!("{}", AppConfig::config_path().display());
}

/// Ask the configured provider whether it is reachable.
pub async fn check() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let api_key = config
        .api_key
        .clone()
        .ok_or("No API key configured (set STEPWISE_API_KEY or OPENAI_API_KEY)")?;

    let provider = provider_from(&config, api_key);
    let (line, reachable) = reachability(&provider, &config.provider.base_url).await;
    println!("{line}");
    if reachable {
        Ok(())
    } else {
        Err(format!("provider '{}' is not reachable", provider.name()).into())
    }
}

async fn reachability(provider: &dyn Provider, base_url: &str) -> (String, bool) {
    match provider.health_check().await {
        Ok(true) => (format!("{} at {base_url}: reachable", provider.name()), true),
        Ok(false) => (
            format!("{} at {base_url}: responded with an error status", provider.name()),
            false,
        ),
        Err(e) => (format!("{} at {base_url}: {e}", provider.name()), false),
    }
}
