//! CLI for the support orchestrator
//!
//! - `serve`: HTTP API server
//! - `search`: one-shot FAQ retrieval against the configured index
//! - `check`: one-shot quality gate evaluation of a candidate answer

pub mod check;
pub mod search;
pub mod serve;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::infrastructure::logging;

/// Support Orchestrator - caching, deduplication, batching and retrieval for support answers
#[derive(Parser)]
#[command(name = "support-orchestrator")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP API server
    Serve,

    /// Search the FAQ index for an inquiry
    Search(search::SearchArgs),

    /// Run the quality gate over a candidate answer
    Check(check::CheckArgs),
}

/// `.env`, then layered config files and `APP__*` variables
pub(crate) fn load_config() -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();
    let config = AppConfig::load()?;
    config.validate()?;
    Ok(config)
}

/// Console-only logging for the one-shot commands
pub(crate) fn init_console_logging(config: &AppConfig) {
    logging::init_logging(&logging::LoggingConfig::from(&config.logging));
}
