// ABOUTME: herd CLI entry point.
// ABOUTME: Provides run and check subcommands over a TOML worker configuration.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use herd::{expand_descriptors, Config, StdoutSink, Supervisor};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "herd")]
#[command(about = "Run a set of replicated worker processes under one supervisor")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch every worker and supervise until a stop condition fires
    Run {
        /// Path to configuration file
        #[arg(env = "HERD_CONFIG")]
        config: PathBuf,
        /// Seconds to wait for workers to exit after the termination signal
        #[arg(long)]
        termination_timeout: Option<f64>,
        /// Seconds to wait for output monitors to drain
        #[arg(long)]
        drain_timeout: Option<f64>,
        /// Write diagnostics to ~/.config/herd/herd.log instead of stderr
        #[arg(long)]
        log_file: bool,
    },
    /// Validate a configuration and list the instances it expands into
    Check {
        /// Path to configuration file
        #[arg(env = "HERD_CONFIG")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore errors if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            termination_timeout,
            drain_timeout,
            log_file,
        } => {
            if log_file {
                herd_log::init_file("herd");
            } else {
                herd_log::init();
            }

            let mut config = load_config(&config)?;
            if let Some(secs) = termination_timeout {
                config.supervisor.termination_timeout_secs = secs;
            }
            if let Some(secs) = drain_timeout {
                config.supervisor.drain_timeout_secs = secs;
            }
            config.validate().context("Invalid command-line override")?;

            let report = Supervisor::new(config, Arc::new(StdoutSink))
                .run()
                .await
                .context("Failed to start workers")?;

            tracing::info!(
                signal = %report.signal,
                signaled = report.signaled.len(),
                stragglers = report.stragglers.len(),
                live_monitors = report.live_monitors.len(),
                clean = report.is_clean(),
                "Supervisor finished"
            );
            Ok(())
        }
        Commands::Check { config } => {
            herd_log::init();

            let config = load_config(&config)?;
            for descriptor in expand_descriptors(&config.groups) {
                println!(
                    "{}: {}",
                    descriptor.instance_name,
                    descriptor.command.join(" ")
                );
            }
            Ok(())
        }
    }
}

fn load_config(path: &Path) -> Result<Config> {
    Config::load(path).with_context(|| format!("Failed to load config {}", path.display()))
}
