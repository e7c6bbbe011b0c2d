mod cli;
mod commands;
mod error;
mod output;

use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use pethub_config::Config;
use pethub_core::{Hub, MemoryStatsCache};

use crate::cli::{Cli, Command, GlobalOpts, OutputFormat};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(mut cli: Cli) -> Result<(), CliError> {
    let config = load_config(&cli.global)?;
    if cli.global.output.is_none() {
        cli.global.output = OutputFormat::from_str(&config.defaults.output, true).ok();
    }

    match cli.command {
        // Neither touches a vendor
        Command::Config(args) => commands::config_cmd::handle(&args, &config, &cli.global),
        Command::Decode(args) => commands::decode::handle(&args, &cli.global),

        cmd => {
            let hub = build_hub(&config)?;
            tracing::debug!(command = ?cmd, "dispatching command");
            let result = commands::dispatch(cmd, &hub, &cli.global).await;
            hub.shutdown();
            result
        }
    }
}

/// Load the config named by `--config`, or the platform default.
fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    let config = match &global.config {
        Some(path) => pethub_config::load_config_from(path)?,
        None => pethub_config::load_config()?,
    };
    Ok(config)
}

fn build_hub(config: &Config) -> Result<Hub, CliError> {
    let (hub_config, credentials) = pethub_config::to_hub(config)?;
    // Snapshots only live for this process; a one-shot command never
    // has a previous one to fall back on.
    let hub = Hub::new(hub_config, credentials, Arc::new(MemoryStatsCache::new()))?;
    Ok(hub)
}
