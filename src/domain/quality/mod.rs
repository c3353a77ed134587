//! Quality domain - answer checks, issues and verdicts

mod config;
mod report;

pub use self::config::QualityConfig;
pub use report::{CheckScores, QualityIssue, QualityReport, QualityVerdict};
