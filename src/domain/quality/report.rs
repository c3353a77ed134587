//! Quality gate outcome types

use std::fmt;

use serde::{Deserialize, Serialize};

/// Problems a candidate answer can have, least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityIssue {
    /// Answer stops mid-sentence
    Unterminated,
    /// Little overlap with what was asked
    OffTopic,
    /// Mostly greetings and sign-offs
    Boilerplate,
    /// Promises help without giving any
    EmptyPromise,
    /// Sends the user to a third-party tool
    ExternalTool,
    /// Written in the wrong language or script
    WrongLanguage,
    /// Names a document edition the user did not ask about
    TranslationSwitching,
}

impl QualityIssue {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityIssue::Unterminated => "unterminated",
            QualityIssue::OffTopic => "off_topic",
            QualityIssue::Boilerplate => "boilerplate",
            QualityIssue::EmptyPromise => "empty_promise",
            QualityIssue::ExternalTool => "external_tool",
            QualityIssue::WrongLanguage => "wrong_language",
            QualityIssue::TranslationSwitching => "translation_switching",
        }
    }
}

impl fmt::Display for QualityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the caller should do with the candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityVerdict {
    /// Reuse the answer as is
    Accept,
    /// Regenerate with the candidate as context
    Regenerate,
    /// Use a generic fallback answer
    Fallback,
}

impl QualityVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityVerdict::Accept => "accept",
            QualityVerdict::Regenerate => "regenerate",
            QualityVerdict::Fallback => "fallback",
        }
    }
}

/// Per-check scores, each in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CheckScores {
    pub language: f32,
    pub completeness: f32,
    pub specificity: f32,
    pub hallucination: f32,
}

impl CheckScores {
    pub fn min(&self) -> f32 {
        self.language
            .min(self.completeness)
            .min(self.specificity)
            .min(self.hallucination)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub overall_score: f32,
    pub scores: CheckScores,
    pub accepted: bool,
    pub verdict: QualityVerdict,
    /// Most severe issue found, if any
    pub worst_issue: Option<QualityIssue>,
    pub issues: Vec<QualityIssue>,
    pub translation_switching: bool,
    pub external_tool: bool,
}

impl QualityReport {
    pub fn has_issue(&self, issue: QualityIssue) -> bool {
        self.issues.contains(&issue)
    }
}
