//! Quality gate thresholds and vocabularies

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Quality gate tuning, read once at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Overall score at or above which an answer is reused directly
    #[serde(default = "default_accept_threshold")]
    pub accept_threshold: f32,
    /// Overall score at or above which regeneration is worthwhile
    #[serde(default = "default_regenerate_threshold")]
    pub regenerate_threshold: f32,
    /// Minimum share of letters in the target script, by language code
    #[serde(default = "default_language_ratios")]
    pub min_language_ratio: HashMap<String, f32>,
    /// Used for languages missing from `min_language_ratio`
    #[serde(default = "default_fallback_ratio")]
    pub default_language_ratio: f32,
    /// Document editions that must not be swapped for one another
    #[serde(default = "default_editions")]
    pub editions: Vec<String>,
    #[serde(default = "default_external_tool_markers")]
    pub external_tool_markers: Vec<String>,
    #[serde(default = "default_promise_phrases")]
    pub promise_phrases: Vec<String>,
    #[serde(default = "default_boilerplate_phrases")]
    pub boilerplate_phrases: Vec<String>,
}

fn default_accept_threshold() -> f32 {
    0.7
}

fn default_regenerate_threshold() -> f32 {
    0.4
}

fn default_fallback_ratio() -> f32 {
    0.8
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_language_ratios() -> HashMap<String, f32> {
    [
        ("en", 0.85),
        ("es", 0.8),
        ("fr", 0.8),
        ("de", 0.8),
        ("pt", 0.8),
        ("it", 0.8),
        ("ru", 0.7),
        ("uk", 0.7),
    ]
    .into_iter()
    .map(|(lang, ratio)| (lang.to_string(), ratio))
    .collect()
}

fn default_editions() -> Vec<String> {
    strings(&[
        "NIV", "KJV", "ESV", "NKJV", "NASB", "NLT", "RSV", "NRSV", "CSB", "HCSB", "AMP", "MSG",
        "NET", "ASV", "WEB", "CEV", "GNT",
    ])
}

fn default_external_tool_markers() -> Vec<String> {
    strings(&[
        "third-party",
        "third party",
        "another app",
        "a different app",
        "other apps",
        "external tool",
        "external app",
        "browser extension",
        "chrome extension",
        "google play",
        "play store",
        "app store",
        "download an app",
        "online converter",
    ])
}

fn default_promise_phrases() -> Vec<String> {
    strings(&[
        "we will guide you",
        "we'll guide you",
        "we will help you",
        "we'll help you",
        "we will walk you through",
        "we'll walk you through",
        "i will guide you",
        "i'll guide you",
        "let us help you",
        "here is how",
        "here's how",
        "follow these steps",
    ])
}

fn default_boilerplate_phrases() -> Vec<String> {
    strings(&[
        "thank you for contacting us",
        "thank you for reaching out",
        "thanks for reaching out",
        "thank you for your message",
        "we appreciate your patience",
        "sorry for the inconvenience",
        "we apologize for the inconvenience",
        "hope this helps",
        "feel free to contact us",
        "please let us know if you have any other questions",
        "have a great day",
        "best regards",
        "kind regards",
    ])
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            accept_threshold: default_accept_threshold(),
            regenerate_threshold: default_regenerate_threshold(),
            min_language_ratio: default_language_ratios(),
            default_language_ratio: default_fallback_ratio(),
            editions: default_editions(),
            external_tool_markers: default_external_tool_markers(),
            promise_phrases: default_promise_phrases(),
            boilerplate_phrases: default_boilerplate_phrases(),
        }
    }
}

impl QualityConfig {
    pub fn min_ratio_for(&self, language: &str) -> f32 {
        self.min_language_ratio
            .get(&language.to_lowercase())
            .copied()
            .unwrap_or(self.default_language_ratio)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if !(0.0..=1.0).contains(&self.accept_threshold)
            || !(0.0..=1.0).contains(&self.regenerate_threshold)
        {
            return Err(DomainError::configuration(
                "Quality thresholds must be between 0 and 1",
            ));
        }
        if self.regenerate_threshold > self.accept_threshold {
            return Err(DomainError::configuration(
                "regenerate_threshold must not exceed accept_threshold",
            ));
        }
        Ok(())
    }
}
