//! faultline-agent entry point

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use faultline_agent::{AgentConfig, AgentServer, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = load_configuration(&cli)?
        .with_overrides(cli.command.overrides())
        .context("invalid configuration")?;

    match cli.command {
        Commands::Serve { .. } => {
            info!(config = ?config, "starting faultline agent");

            let server = Arc::new(AgentServer::new(config));
            let listener = server.bind().await?;
            server
                .serve_until(listener, async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await?;
        }
        Commands::Config { .. } => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

/// Setup logging based on verbosity level; `RUST_LOG` takes precedence
fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Load configuration from file or use defaults
fn load_configuration(cli: &Cli) -> anyhow::Result<AgentConfig> {
    if let Some(config_path) = &cli.config {
        info!("Loading configuration from: {}", config_path);
        AgentConfig::load_from_file(config_path)
            .with_context(|| format!("loading {}", config_path))
    } else {
        info!("Using default configuration");
        Ok(AgentConfig::default())
    }
}
