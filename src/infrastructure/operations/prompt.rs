//! Numbered-list and JSON framing for multi-item language model prompts

use super::handler::count_mismatch;
use crate::domain::DomainError;

/// Upper bound on completion tokens requested for a single batch call
pub(crate) const MAX_BATCH_TOKENS: u32 = 4096;

/// Tokens to request for `items` results of `per_item` tokens each
pub(crate) fn batch_tokens(per_item: u32, items: usize) -> u32 {
    per_item
        .saturating_mul(items.max(1) as u32)
        .min(MAX_BATCH_TOKENS)
}

/// `1. first\n2. second`; line breaks inside items are flattened
pub(crate) fn numbered_list<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, flatten(item.as_ref())))
        .collect::<Vec<_>>()
        .join("\n")
}

fn flatten(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits `12. text` / `12) text` into its number and text
fn numbered_line(line: &str) -> Option<(usize, &str)> {
    let line = line.trim_start();
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }

    let rest = &line[digits..];
    let rest = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')'))?;
    let number = line[..digits].parse().ok()?;

    Some((number, rest.trim()))
}

/// Parses a numbered reply back into exactly `expected` positional items.
///
/// Unnumbered lines continue the preceding item. Missing, duplicate or
/// out-of-range numbers fail the whole reply.
pub(crate) fn parse_numbered(response: &str, expected: usize) -> Result<Vec<String>, DomainError> {
    let mut items: Vec<Option<String>> = vec![None; expected];
    let mut current: Option<usize> = None;
    let mut received = 0usize;

    for line in response.lines().filter(|l| !l.trim().is_empty()) {
        match numbered_line(line) {
            Some((number, text)) => {
                received += 1;
                if number == 0 || number > expected || items[number - 1].is_some() {
                    return Err(count_mismatch(expected, received.max(number)));
                }
                items[number - 1] = Some(text.to_string());
                current = Some(number - 1);
            }
            None => {
                if let Some(slot) = current.and_then(|i| items[i].as_mut()) {
                    slot.push(' ');
                    slot.push_str(line.trim());
                }
            }
        }
    }

    if received != expected {
        return Err(count_mismatch(expected, received));
    }

    Ok(items.into_iter().flatten().collect())
}

/// Extracts the outermost `open`..`close` span, skipping markdown fences or prose
pub(crate) fn extract_json(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (start < end).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_list_flattens_lines() {
        let list = numbered_list(["hola", "buenos\n dias"]);
        assert_eq!(list, "1. hola\n2. buenos dias");
    }

    #[test]
    fn test_parse_numbered_in_order() {
        let items = parse_numbered("1. hello\n2) good morning\n", 2).unwrap();
        assert_eq!(items, vec!["hello", "good morning"]);
    }

    #[test]
    fn test_parse_numbered_out_of_order_and_continuation() {
        let items = parse_numbered("2. second\n1. first part\ncontinued", 2).unwrap();
        assert_eq!(items, vec!["first part continued", "second"]);
    }

    #[test]
    fn test_parse_numbered_missing_item_fails() {
        let error = parse_numbered("1. only one", 2).unwrap_err();
        assert!(matches!(error, DomainError::Batch { .. }));
    }

    #[test]
    fn test_parse_numbered_extra_item_fails() {
        assert!(parse_numbered("1. a\n2. b\n3. c", 2).is_err());
        assert!(parse_numbered("1. a\n1. again", 1).is_err());
    }

    #[test]
    fn test_extract_json() {
        let text = "```json\n[{\"a\": 1}]\n```";
        assert_eq!(extract_json(text, '[', ']'), Some("[{\"a\": 1}]"));
        assert_eq!(extract_json("no json", '{', '}'), None);
    }

    #[test]
    fn test_batch_tokens_capped() {
        assert_eq!(batch_tokens(256, 2), 512);
        assert_eq!(batch_tokens(256, 100), MAX_BATCH_TOKENS);
    }
}
