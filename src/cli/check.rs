//! Check command - quality gate over a single answer

use clap::Args;

use crate::infrastructure::quality::QualityGate;

#[derive(Args, Clone, Debug)]
pub struct CheckArgs {
    /// The user's inquiry
    #[arg(long)]
    pub query: String,

    /// Candidate answer to evaluate
    #[arg(long)]
    pub answer: String,

    /// Expected answer language
    #[arg(long, default_value = "en")]
    pub language: String,
}

/// Prints the quality report as JSON; exits non-zero when the answer is rejected
pub async fn run(args: CheckArgs) -> anyhow::Result<()> {
    let config = super::load_config()?;
    super::init_console_logging(&config);

    let gate = QualityGate::new(config.quality)?;
    let report = gate.check(&args.query, &args.answer, &args.language);

    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.accepted {
        anyhow::bail!("answer rejected: {}", report.verdict.as_str());
    }

    Ok(())
}
