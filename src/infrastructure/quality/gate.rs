//! Answer quality gate

use std::collections::BTreeSet;

use regex::Regex;
use tracing::debug;
use unicode_script::{Script, UnicodeScript};

use crate::domain::quality::{CheckScores, QualityConfig, QualityIssue, QualityReport, QualityVerdict};
use crate::domain::DomainError;
use crate::infrastructure::observability::record_quality_check;
use crate::infrastructure::retrieval::key_terms;

/// Specificity of a promise with nothing concrete behind it
const EMPTY_PROMISE_SPECIFICITY: f32 = 0.1;
/// Overall score ceiling once an answer swaps document editions
const SWITCHING_CAP: f32 = 0.1;
const EXTERNAL_TOOL_SCORE: f32 = 0.3;
const MIN_CONTENT_RATIO: f32 = 0.5;

const STEP_PATTERN: &str = r"(?i)(?:^|\s)(?:\d{1,2}[.)]|step\s+\d{1,2}:?|[-*•])\s+\S";
const CONTROL_PATTERN: &str = r#"(?i)\b(?:settings?|menu|button|tab|toggle|switch|option|icon|screen|page|section|link|field|profile|notifications|preferences|dashboard)\b|"[^"]{2,40}"|“[^”]{2,40}”"#;

/// Validates candidate answers before they are released
#[derive(Debug, Clone)]
pub struct QualityGate {
    config: QualityConfig,
    steps: Regex,
    controls: Regex,
    editions: Option<Regex>,
}

impl QualityGate {
    pub fn new(config: QualityConfig) -> Result<Self, DomainError> {
        config.validate()?;

        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| DomainError::configuration(format!("Invalid quality pattern: {}", e)))
        };

        let editions = if config.editions.is_empty() {
            None
        } else {
            let alternatives: Vec<String> =
                config.editions.iter().map(|e| regex::escape(e.trim())).collect();
            Some(compile(&format!(r"\b(?:{})\b", alternatives.join("|")))?)
        };

        Ok(Self {
            steps: compile(STEP_PATTERN)?,
            controls: compile(CONTROL_PATTERN)?,
            editions,
            config,
        })
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// Scores `answer` as a reply to `query` written in `language`
    pub fn check(&self, query: &str, answer: &str, language: &str) -> QualityReport {
        let mut issues = BTreeSet::new();

        let language_score = self.language_score(answer, language, &mut issues);
        let specificity = self.specificity(answer, &mut issues);
        let completeness = self.completeness(query, answer, specificity, &mut issues);
        let (hallucination, switching, external_tool) = self.hallucination(query, answer, &mut issues);

        let scores = CheckScores {
            language: language_score,
            completeness,
            specificity,
            hallucination,
        };

        let mut overall = 0.25 * scores.language
            + 0.3 * scores.completeness
            + 0.2 * scores.specificity
            + 0.25 * scores.hallucination;
        if switching {
            overall = overall.min(SWITCHING_CAP);
        }
        let overall = overall.clamp(0.0, 1.0);

        let blocking = [
            QualityIssue::WrongLanguage,
            QualityIssue::TranslationSwitching,
            QualityIssue::ExternalTool,
            QualityIssue::EmptyPromise,
        ];
        let accepted = overall >= self.config.accept_threshold
            && !blocking.iter().any(|issue| issues.contains(issue));

        let verdict = if accepted {
            QualityVerdict::Accept
        } else if overall >= self.config.regenerate_threshold {
            QualityVerdict::Regenerate
        } else {
            QualityVerdict::Fallback
        };

        let worst_issue = issues.iter().next_back().copied();
        record_quality_check(verdict.as_str(), worst_issue.map(|i| i.as_str()));
        debug!(
            overall,
            verdict = verdict.as_str(),
            worst_issue = ?worst_issue,
            "Quality check complete"
        );

        QualityReport {
            overall_score: overall,
            scores,
            accepted,
            verdict,
            worst_issue,
            issues: issues.into_iter().collect(),
            translation_switching: switching,
            external_tool,
        }
    }

    /// Share of letters written in the language's script, scaled against its minimum
    fn language_score(&self, answer: &str, language: &str, issues: &mut BTreeSet<QualityIssue>) -> f32 {
        let targets = target_scripts(language);
        let (letters, in_script) = answer
            .chars()
            .filter(|c| c.is_alphabetic())
            .fold((0usize, 0usize), |(letters, hits), c| {
                (letters + 1, hits + usize::from(targets.contains(&c.script())))
            });

        if letters == 0 {
            issues.insert(QualityIssue::WrongLanguage);
            return 0.0;
        }

        let ratio = in_script as f32 / letters as f32;
        let minimum = self.config.min_ratio_for(language);
        if ratio >= minimum {
            1.0
        } else {
            issues.insert(QualityIssue::WrongLanguage);
            if minimum > 0.0 { ratio / minimum } else { 0.0 }
        }
    }

    fn concrete_markers(&self, text: &str) -> usize {
        let steps = self.steps.find_iter(text).count();
        let controls: BTreeSet<String> = self
            .controls
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .collect();
        steps + controls.len()
    }

    /// A promise must be followed by concrete content; otherwise specificity collapses
    fn specificity(&self, answer: &str, issues: &mut BTreeSet<QualityIssue>) -> f32 {
        let lowered = answer.to_lowercase();

        let promise_end = self
            .config
            .promise_phrases
            .iter()
            .filter_map(|phrase| {
                let phrase = phrase.to_lowercase();
                lowered.rfind(&phrase).map(|at| at + phrase.len())
            })
            .max();

        match promise_end {
            Some(end) => {
                let markers = self.concrete_markers(&lowered[end..]);
                if markers == 0 {
                    issues.insert(QualityIssue::EmptyPromise);
                    EMPTY_PROMISE_SPECIFICITY
                } else {
                    (0.6 + 0.15 * markers as f32).min(1.0)
                }
            }
            None => (0.5 + 0.15 * self.concrete_markers(&lowered) as f32).min(1.0),
        }
    }

    fn completeness(
        &self,
        query: &str,
        answer: &str,
        specificity: f32,
        issues: &mut BTreeSet<QualityIssue>,
    ) -> f32 {
        let lowered = answer.to_lowercase();
        let stripped = self
            .config
            .boilerplate_phrases
            .iter()
            .fold(lowered.clone(), |text, phrase| text.replace(&phrase.to_lowercase(), " "));

        let visible = |text: &str| text.chars().filter(|c| c.is_alphanumeric()).count();
        let total = visible(&lowered);
        let content_ratio = if total == 0 {
            0.0
        } else {
            visible(&stripped) as f32 / total as f32
        };
        if content_ratio < MIN_CONTENT_RATIO {
            issues.insert(QualityIssue::Boilerplate);
        }

        let query_terms = key_terms(query);
        let overlap = if query_terms.is_empty() {
            1.0
        } else {
            let answer_terms = key_terms(answer);
            query_terms.intersection(&answer_terms).count() as f32 / query_terms.len() as f32
        };
        if overlap == 0.0 {
            issues.insert(QualityIssue::OffTopic);
        }

        let terminated = answer
            .trim_end()
            .trim_end_matches(['"', '\'', ')', '”', '’'])
            .ends_with(['.', '!', '?', '…', '。', '！', '？']);
        if !terminated {
            issues.insert(QualityIssue::Unterminated);
        }

        0.35 * content_ratio
            + 0.35 * overlap
            + 0.15 * if terminated { 1.0 } else { 0.0 }
            + 0.15 * specificity
    }

    /// Returns the score plus whether editions were switched and whether an external tool was suggested
    fn hallucination(
        &self,
        query: &str,
        answer: &str,
        issues: &mut BTreeSet<QualityIssue>,
    ) -> (f32, bool, bool) {
        let lowered = answer.to_lowercase();
        let external_tool = self
            .config
            .external_tool_markers
            .iter()
            .any(|marker| lowered.contains(&marker.to_lowercase()));

        let switching = self.editions.as_ref().is_some_and(|editions| {
            let named = |text: &str| -> BTreeSet<String> {
                editions
                    .find_iter(text)
                    .map(|m| m.as_str().to_uppercase())
                    .collect()
            };
            let asked = named(query);
            !asked.is_empty() && named(answer).difference(&asked).next().is_some()
        });

        let mut score: f32 = 1.0;
        if external_tool {
            issues.insert(QualityIssue::ExternalTool);
            score = score.min(EXTERNAL_TOOL_SCORE);
        }
        if switching {
            issues.insert(QualityIssue::TranslationSwitching);
            score = 0.0;
        }

        (score, switching, external_tool)
    }
}

/// Scripts a language is normally written in
fn target_scripts(language: &str) -> &'static [Script] {
    let primary = language.split(['-', '_']).next().unwrap_or_default();
    match primary.to_lowercase().as_str() {
        "ru" | "uk" | "be" | "bg" | "sr" | "mk" | "kk" => &[Script::Cyrillic],
        "el" => &[Script::Greek],
        "ar" | "fa" | "ur" => &[Script::Arabic],
        "he" | "yi" => &[Script::Hebrew],
        "zh" => &[Script::Han],
        "ja" => &[Script::Hiragana, Script::Katakana, Script::Han],
        "ko" => &[Script::Hangul, Script::Han],
        "hi" | "mr" | "ne" => &[Script::Devanagari],
        "th" => &[Script::Thai],
        _ => &[Script::Latin],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> QualityGate {
        QualityGate::new(QualityConfig::default()).unwrap()
    }

    #[test]
    fn test_empty_promise_collapses_specificity() {
        let report = gate().check("How do I turn off alerts?", "We will guide you.", "en");

        assert!(report.scores.specificity < 0.3);
        assert!(report.has_issue(QualityIssue::EmptyPromise));
        assert!(!report.accepted);
    }

    #[test]
    fn test_promise_followed_by_steps_is_specific() {
        let report = gate().check(
            "How do I turn off alerts?",
            "We will guide you. 1. Open Settings and tap Notifications.",
            "en",
        );

        assert!(report.scores.specificity > 0.6);
        assert!(!report.has_issue(QualityIssue::EmptyPromise));
    }

    #[test]
    fn test_edition_switching_is_flagged_and_capped() {
        let report = gate().check(
            "Where can I find John 3:16 in the NIV?",
            "You can read John 3:16 in the KJV reading plan under the Bible tab.",
            "en",
        );

        assert!(report.translation_switching);
        assert!(report.overall_score <= 0.1);
        assert_eq!(report.worst_issue, Some(QualityIssue::TranslationSwitching));
        assert_eq!(report.verdict, QualityVerdict::Fallback);
    }

    #[test]
    fn test_same_edition_is_not_switching() {
        let report = gate().check(
            "Where can I find John 3:16 in the NIV?",
            "Open the NIV and search for John 3:16.",
            "en",
        );

        assert!(!report.translation_switching);
    }

    #[test]
    fn test_good_answer_is_accepted() {
        let report = gate().check(
            "How do I change my notification sound?",
            "To change your notification sound: 1. Open Settings. 2. Tap Notifications. 3. Choose a new sound.",
            "en",
        );

        assert!(report.accepted, "{:?}", report);
        assert_eq!(report.verdict, QualityVerdict::Accept);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_external_tool_is_flagged() {
        let report = gate().check(
            "How do I export my notes?",
            "You can export your notes with a third-party app from the Play Store.",
            "en",
        );

        assert!(report.external_tool);
        assert!(report.has_issue(QualityIssue::ExternalTool));
        assert!(!report.accepted);
    }

    #[test]
    fn test_wrong_script_fails_language_check() {
        let report = gate().check(
            "Как сбросить пароль?",
            "Open Settings and choose Reset password.",
            "ru",
        );

        assert!(report.has_issue(QualityIssue::WrongLanguage));
        assert!(report.scores.language < 0.1);

        let report = gate().check(
            "Как сбросить пароль?",
            "Откройте настройки и выберите сброс пароля.",
            "ru",
        );
        assert_eq!(report.scores.language, 1.0);
    }

    #[test]
    fn test_boilerplate_and_termination() {
        let report = gate().check(
            "Where is my invoice?",
            "Thank you for contacting us! We appreciate your patience, have a great day",
            "en",
        );

        assert!(report.has_issue(QualityIssue::Boilerplate));
        assert!(report.has_issue(QualityIssue::Unterminated));
        assert!(report.has_issue(QualityIssue::OffTopic));
    }

    #[test]
    fn test_target_scripts() {
        assert_eq!(target_scripts("pt-BR"), &[Script::Latin]);
        assert_eq!(target_scripts("uk"), &[Script::Cyrillic]);
    }
}
