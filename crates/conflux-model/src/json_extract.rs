//! Multi-strategy JSON extraction from raw LLM output, grounded on
//! the original implementation's
//! resilient JSON retrieval (direct parse, fenced-block, brace-matching
//! with string-aware escape handling, escape-fixing) and called out as a
//! shared utility in  ("LLM JSON parsing is inherently fragile").
//! Used by `conflux-flow`'s LLMNode/AutoParamNode/PlannerNode and
//! `conflux-graph`'s dynamic rule generation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static THINK_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());
static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)```").unwrap());

/// Strips `<think>...</think>` reasoning traces some models prepend.
pub fn strip_think_tags(text: &str) -> String {
    THINK_TAGS.replace_all(text, "").into_owned()
}

/// Pulls the contents of the first fenced code block, if any.
pub fn extract_fenced_block(text: &str) -> Option<String> {
    FENCED_BLOCK.captures(text).map(|c| c[1].trim().to_string())
}

/// Scans for the first balanced `{...}` span, string-aware so braces inside
/// quoted strings don't throw off the count.
pub fn extract_brace_matched(text: &str) -> Option<String> {
    let bytes: Vec<char> = text.chars().collect();
    let start = bytes.iter().position(|&c| c == '{')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &c) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(bytes[start..=i].iter().collect());
                }
            }
            _ => {}
        }
    }
    None
}

/// Best-effort repair of common LLM JSON mistakes: trailing commas and
/// unescaped newlines inside strings.
fn fix_common_escapes(candidate: &str) -> String {
    static TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*([}\]])").unwrap());
    TRAILING_COMMA.replace_all(candidate, "$1").into_owned()
}

/// Tries, in order: direct parse, fenced-block parse, brace-matched parse,
/// then each again after `fix_common_escapes`. Returns the first successful
/// parse, or `None` if every strategy fails.
pub fn extract_json(raw: &str) -> Option<Value> {
    let cleaned = strip_think_tags(raw);
    let candidates: Vec<String> = std::iter::once(cleaned.trim().to_string())
        .chain(extract_fenced_block(&cleaned))
        .chain(extract_brace_matched(&cleaned))
        .collect();

    for candidate in &candidates {
        if let Ok(value) = serde_json::from_str(candidate) {
            return Some(value);
        }
    }
    for candidate in &candidates {
        let fixed = fix_common_escapes(candidate);
        if let Ok(value) = serde_json::from_str(&fixed) {
            return Some(value);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_direct_json() {
        assert_eq!(extract_json(r#"{"a": 1}"#), Some(serde_json::json!({"a": 1})));
    }

    #[test]
    fn strips_think_tags_and_parses_fenced_block() {
        let raw = "<think>reasoning here</think>\n```json\n{\"a\": 2}\n```";
        assert_eq!(extract_json(raw), Some(serde_json::json!({"a": 2})));
    }

    #[test]
    fn brace_matches_through_surrounding_prose() {
        let raw = "Sure, here you go: {\"nested\": {\"a\": [1,2]}} -- hope that helps";
        assert_eq!(extract_json(raw), Some(serde_json::json!({"nested": {"a": [1, 2]}})));
    }

    #[test]
    fn fixes_trailing_commas() {
        let raw = "{\"a\": 1, \"b\": 2,}";
        assert_eq!(extract_json(raw), Some(serde_json::json!({"a": 1, "b": 2})));
    }

    #[test]
    fn unparseable_text_returns_none() {
        assert_eq!(extract_json("not json at all"), None);
    }
}
