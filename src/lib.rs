//! Review Harvester - fault-tolerant product and review extraction
//!
//! Product pages are rendered in a browser session and read through
//! explicit-wait DOM lookups. Every lookup degrades to a default on failure
//! and every fault is recorded, so one broken review, page or product never
//! stops a category job. Jobs run on a bounded worker pool, one job file per
//! worker slot.

pub mod application;
pub mod cli;
pub mod commands;
pub mod domain;
pub mod infrastructure;

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};

use crate::cli::{Cli, Command};
use crate::infrastructure::config::{AppConfig, ConfigManager};
use crate::infrastructure::logging::{init_logging_with_config, log_system_info};

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = ConfigManager::resolve(cli.config.as_deref())?.load_config()?;
    if let Some(output) = &cli.output {
        config.output.root_dir = output.clone();
    }
    Ok(config)
}

async fn execute(cli: Cli, config: AppConfig) -> Result<()> {
    match cli.command {
        Command::Crawl(args) => {
            let summaries = commands::crawl(&config, &args).await?;
            for summary in &summaries {
                info!("📋 {}", serde_json::to_string(summary)?);
            }
        }
        Command::Dispatch(args) => {
            let failed = commands::dispatch(&config, &args).await?;
            if failed > 0 {
                anyhow::bail!("{failed} job files failed");
            }
        }
        Command::Discover => {
            commands::discover(&config).await?;
        }
        Command::Replay(args) => {
            let value = commands::replay(&config, &args).await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Command::InitConfig { force } => {
            let path = commands::init_config(cli.config.as_deref(), force).await?;
            println!("Configuration written to {}", path.display());
        }
    }
    Ok(())
}

/// Parse the command line, set up logging and run the selected command.
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    // Replay prints JSON on stdout; keep the console free of log lines there.
    let mut logging = config.logging.clone();
    if matches!(cli.command, Command::Replay(_)) {
        logging.console_output = false;
        logging.file_output = true;
    }
    if let Err(e) = init_logging_with_config(logging) {
        eprintln!("Failed to initialize logging: {e:#}");
    }
    log_system_info();

    let outcome = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
        .and_then(|runtime| runtime.block_on(execute(cli, config)));

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("❌ {:#}", e);
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
