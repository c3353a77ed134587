//! Weighted composite search strings

use crate::domain::orchestration::IntentAnalysis;
use crate::domain::retrieval::{LayerKind, RetrievalConfig};

/// Collapses runs of whitespace and trims the query
pub fn normalize_query(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Builds one search string in which each signal appears in proportion to
/// its composite weight.
///
/// Signals are laid out from the heaviest down, so truncation to the
/// character budget drops the lightest signals first.
pub fn build_composite(
    query: &str,
    intent: Option<&IntentAnalysis>,
    config: &RetrievalConfig,
) -> String {
    let weights = &config.composite_weights;
    let query = normalize_query(query);

    let mut kinds = LayerKind::ALL.to_vec();
    kinds.sort_by_key(|kind| std::cmp::Reverse(weights.percent(*kind)));

    let parts: Vec<String> = kinds
        .into_iter()
        .filter_map(|kind| {
            let text = normalize_query(&kind.signal_text(&query, intent)?);
            let repetitions = weights.repetitions(kind, config.repetition_scale);
            (repetitions > 0 && !text.is_empty()).then(|| vec![text; repetitions].join(" "))
        })
        .collect();

    truncate_chars(&parts.join(" "), config.max_composite_chars)
}

/// Cuts `text` to at most `max_chars` characters, backing off to the last
/// word boundary when the cut would split a word
fn truncate_chars(text: &str, max_chars: usize) -> String {
    let Some((cut, _)) = text.char_indices().nth(max_chars) else {
        return text.to_string();
    };

    let head = &text[..cut];
    let head = if text[cut..].starts_with(' ') {
        head
    } else {
        head.rfind(' ').map_or(head, |space| &head[..space])
    };

    head.trim_end().to_string()
}
