//! Search command - one retrieval against the configured index

use clap::Args;
use tracing::info;

use crate::infrastructure::retrieval::SearchMode;

#[derive(Args, Clone, Debug)]
pub struct SearchArgs {
    /// Inquiry text
    pub query: String,

    /// Number of matches (defaults to `retrieval.top_k`)
    #[arg(long)]
    pub top_k: Option<usize>,

    /// One query per signal layer instead of a single composite query
    #[arg(long)]
    pub layered: bool,
}

impl SearchArgs {
    fn mode(&self) -> SearchMode {
        if self.layered {
            SearchMode::Layered
        } else {
            SearchMode::Composite
        }
    }
}

/// Prints the search outcome as JSON
pub async fn run(args: SearchArgs) -> anyhow::Result<()> {
    let config = super::load_config()?;
    super::init_console_logging(&config);

    let state = crate::create_app_state(&config).await?;
    let top_k = args.top_k.unwrap_or(config.retrieval.top_k);

    let outcome = state
        .retrieval
        .search_inquiry(&args.query, top_k, args.mode())
        .await;

    info!(
        matches = outcome.matches.len(),
        path = ?outcome.path,
        "Search complete"
    );
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    state.orchestrator.shutdown().await;
    Ok(())
}
