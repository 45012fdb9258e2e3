//! Stepwise CLI entry point.
//!
//! Commands:
//! - `run`: Run one task to completion
//! - `tools`: List the built-in tools
//! - `config`: Show the effective configuration or check the provider

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "stepwise",
    about = "Stepwise: plan, execute, observe",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a task until it finishes or hits a limit
    Run {
        /// The goal; read from stdin when omitted
        goal: Option<String>,

        /// Override the configured step budget
        #[arg(long)]
        max_steps: Option<u32>,

        /// Print the final result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the tools available to the agent
    Tools,

    /// Show the effective configuration
    Config {
        /// Print only the config file path
        #[arg(long, conflicts_with = "check")]
        path: bool,

        /// Ask the configured provider whether it is reachable
        #[arg(long)]
        check: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so `run --json` output stays parseable.
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run {
            goal,
            max_steps,
            json,
        } => commands::run::run(goal, max_steps, json).await?,
        Commands::Tools => commands::tools::run()?,
        Commands::Config { path, check } => {
            if path {
                commands::config_cmd::path()
            } else if check {
                commands::config_cmd::check().await?
            } else {
                commands::config_cmd::show()?
            }
        }
    }

    Ok(())
}
