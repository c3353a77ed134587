//! Intent and concept relevance used by the layered re-rank

use std::collections::BTreeSet;

use unicode_segmentation::UnicodeSegmentation;

use crate::domain::orchestration::IntentAnalysis;
use crate::domain::retrieval::ScoredMatch;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "have", "has", "was", "are", "you",
    "your", "can", "how", "what", "when", "where", "why", "who", "will", "would", "could",
    "should", "does", "did", "not", "but", "all", "any", "our", "out", "into", "about", "there",
    "their", "them", "then", "than", "its", "just", "also", "get", "got", "please", "want",
];

/// Share of intent relevance that comes from the structured fields
const STRUCTURED_SHARE: f32 = 0.7;

/// Lowercased content words of at least three characters
pub fn key_terms(text: &str) -> BTreeSet<String> {
    text.unicode_words()
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() >= 3 && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Share of the query's key terms that also occur in the candidate text
pub fn concept_relevance(query_terms: &BTreeSet<String>, candidate: &str) -> f32 {
    if query_terms.is_empty() {
        return 0.0;
    }

    let candidate_terms = key_terms(candidate);
    let shared = query_terms.intersection(&candidate_terms).count();
    shared as f32 / query_terms.len() as f32
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}

/// Compares a query's intent with the structured fields stored on a candidate
#[derive(Debug, Clone, Default)]
pub struct IntentMatcher {
    /// Each pair maps its second term onto its first
    synonyms: Vec<(String, String)>,
}

impl IntentMatcher {
    pub fn new(synonyms: &[[String; 2]]) -> Self {
        Self {
            synonyms: synonyms
                .iter()
                .map(|[a, b]| (a.to_lowercase(), b.to_lowercase()))
                .collect(),
        }
    }

    fn label(value: &str) -> String {
        value
            .to_lowercase()
            .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn canonical(&self, label: &str) -> String {
        let mut padded = format!(" {} ", label);
        for (preferred, alternative) in &self.synonyms {
            padded = padded.replace(&format!(" {} ", alternative), &format!(" {} ", preferred));
        }
        padded.trim().to_string()
    }

    /// 1.0 for an exact match, 0.5 when equal up to synonyms, otherwise 0.0
    pub fn field_score(&self, query: &str, candidate: &str) -> f32 {
        let (query, candidate) = (Self::label(query), Self::label(candidate));

        if query.is_empty() || candidate.is_empty() {
            0.0
        } else if query == candidate {
            1.0
        } else if self.canonical(&query) == self.canonical(&candidate) {
            0.5
        } else {
            0.0
        }
    }

    fn keyword_set(&self, keywords: &[String]) -> BTreeSet<String> {
        keywords
            .iter()
            .map(|k| self.canonical(&Self::label(k)))
            .filter(|k| !k.is_empty())
            .collect()
    }

    /// Relevance of `candidate` to the query intent in [0, 1]
    pub fn relevance(&self, intent: &IntentAnalysis, candidate: &ScoredMatch) -> f32 {
        let text = |key: &str| {
            candidate
                .metadata
                .get(key)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
        };

        let fields = [
            (&intent.core_intent, text("core_intent")),
            (&intent.category, text("category")),
            (&intent.primary_action, text("primary_action")),
        ];
        let present: Vec<f32> = fields
            .iter()
            .filter(|(query, _)| !query.trim().is_empty())
            .map(|(query, candidate)| self.field_score(query, candidate))
            .collect();
        let structured = if present.is_empty() {
            0.0
        } else {
            present.iter().sum::<f32>() / present.len() as f32
        };

        if intent.semantic_keywords.is_empty() {
            return structured;
        }

        let candidate_keywords = match candidate.metadata.get("keywords") {
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(serde_json::Value::String(s)) => s.split(',').map(str::to_string).collect(),
            _ => Vec::new(),
        };
        let overlap = jaccard(
            &self.keyword_set(&intent.semantic_keywords),
            &self.keyword_set(&candidate_keywords),
        );

        if present.is_empty() {
            overlap
        } else {
            STRUCTURED_SHARE * structured + (1.0 - STRUCTURED_SHARE) * overlap
        }
    }
}
