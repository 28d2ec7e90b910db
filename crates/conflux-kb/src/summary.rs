//! Extractive summary chunks for oversized or chapter-heading content
//!,
//! grounded on the original implementation's
//! `_generate_summary_chunk`. Deliberately rule-based rather than another LLM
//! round trip per document chunk: the original generates summaries via the
//! same LLM call used elsewhere, but an extractive first-and-cue-sentence
//! rule captures most of the value without a prompt per chunk at ingest time.

use once_cell::sync::Lazy;
use regex::Regex;

static SENTENCE_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:[。！？!?]|\.(?=\s|$))").unwrap());
static CHAPTER_HEAD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^(#{1,6}\s|第[〇一二三四五六七八九十百千万\d]+[章节篇回])").unwrap());

/// Whether a chunk is worth generating a summary for: it's more than twice
/// the target chunk size, or it opens with a heading/chapter marker.
pub fn should_summarize(content: &str, target_size: usize) -> bool {
    content.chars().count() > target_size * 2 || CHAPTER_HEAD.is_match(content.trim_start())
}

/// First sentence plus any sentence carrying a numeric or cue-word signal,
/// truncated to `max_len` characters.
pub fn summarize_extractive(content: &str, max_len: usize) -> String {
    let sentences: Vec<&str> = SENTENCE_BOUNDARY
        .split(content)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if sentences.is_empty() {
        return truncate_chars(content, max_len);
    }

    let mut picked: Vec<&str> = vec![sentences[0]];
    for sentence in sentences.iter().skip(1) {
        if is_cue_sentence(sentence) && !picked.contains(sentence) {
            picked.push(sentence);
        }
        if picked.len() >= 4 {
            break;
        }
    }
    truncate_chars(&picked.join(" "), max_len)
}

fn is_cue_sentence(sentence: &str) -> bool {
    const CUES: &[&str] = &["总之", "因此", "综上", "in summary", "in conclusion", "therefore", "overall"];
    let lowered = sentence.to_lowercase();
    sentence.chars().any(|c| c.is_ascii_digit()) || CUES.iter().any(|cue| lowered.contains(cue))
}

fn truncate_chars(text: &str, max_len: usize) -> String {
    text.chars().take(max_len).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_content_should_be_summarized() {
        let content = "word ".repeat(500);
        assert!(should_summarize(&content, 800));
    }

    #[test]
    fn markdown_heading_should_be_summarized_even_if_short() {
        assert!(should_summarize("# Chapter One\nshort intro.", 800));
    }

    #[test]
    fn plain_short_paragraph_is_not_summarized() {
        assert!(!should_summarize("a short unremarkable paragraph.", 800));
    }

    #[test]
    fn summary_always_includes_first_sentence() {
        let content = "This opens the chapter. Some filler sentence here. In conclusion, the point stands.";
        let summary = summarize_extractive(content, 500);
        assert!(summary.starts_with("This opens the chapter"));
        assert!(summary.contains("In conclusion"));
    }

    #[test]
    fn summary_respects_max_len() {
        let content = "word ".repeat(200);
        let summary = summarize_extractive(&content, 50);
        assert!(summary.chars().count() <= 50);
    }
}
