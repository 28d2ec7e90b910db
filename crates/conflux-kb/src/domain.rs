//! Domain classification for an ingested document, grounded on
//! the original implementation's
//! `_classify_domain`. Falls back to a fixed keyword taxonomy when the LLM
//! is disabled or its answer doesn't parse.

use conflux_model::history::HistoryMessage;
use conflux_model::json_extract::extract_json;
use conflux_model::llm::{CompletionRequest, LlmProvider};

/// `(domain, keyword cues)`. Kept intentionally small; this is the fallback
/// path, not the primary classifier.
pub const TAXONOMY: &[(&str, &[&str])] = &[
    ("technology", &["software", "algorithm", "computer", "code", "system", "api"]),
    ("history", &["war", "dynasty", "century", "ancient", "empire", "历史"]),
    ("literature", &["novel", "poem", "character", "story", "author", "chapter"]),
    ("science", &["experiment", "hypothesis", "theory", "biology", "physics", "chemical"]),
    ("business", &["market", "revenue", "customer", "strategy", "company", "profit"]),
];

pub const DEFAULT_DOMAIN: &str = "general";

pub fn classify_keyword(text: &str) -> (String, f32) {
    let lowered = text.to_lowercase();
    let mut best_domain = DEFAULT_DOMAIN.to_string();
    let mut best_hits = 0usize;
    for (domain, keywords) in TAXONOMY {
        let hits = keywords.iter().filter(|k| lowered.contains(*k)).count();
        if hits > best_hits {
            best_hits = hits;
            best_domain = domain.to_string();
        }
    }
    let confidence = if best_hits == 0 { 0.2 } else { (best_hits as f32 / 4.0).min(1.0) };
    (best_domain, confidence)
}

/// `sample_chunks` are the (up to 5) chunks ingestion picked at random to
/// represent the document without reading the whole thing.
pub async fn classify_document(
    llm: &dyn LlmProvider,
    sample_chunks: &[String],
    enabled: bool,
) -> (String, f32) {
    if sample_chunks.is_empty() {
        return (DEFAULT_DOMAIN.to_string(), 0.0);
    }
    if !enabled {
        return classify_keyword(&sample_chunks.join(" "));
    }
    match classify_llm(llm, sample_chunks).await {
        Some(result) => result,
        None => classify_keyword(&sample_chunks.join(" ")),
    }
}

async fn classify_llm(llm: &dyn LlmProvider, samples: &[String]) -> Option<(String, f32)> {
    let request = CompletionRequest::new(vec![
        HistoryMessage::system(
            "Classify the subject-matter domain of these document excerpts with a single \
             short label and a confidence between 0 and 1. Reply with JSON \
             {\"domain\": string, \"confidence\": number} and nothing else.",
        ),
        HistoryMessage::user(samples.join("\n---\n")),
    ]);
    let raw = llm.complete(request).await.ok()?;
    let value = extract_json(&raw)?;
    let domain = value.get("domain")?.as_str()?.trim().to_lowercase();
    let confidence = value
        .get("confidence")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.5) as f32;
    Some((domain, confidence.clamp(0.0, 1.0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use conflux_model::mock::MockLlmProvider;

    #[test]
    fn keyword_fallback_matches_best_scoring_domain() {
        let (domain, confidence) = classify_keyword("the algorithm compiles the code into a binary");
        assert_eq!(domain, "technology");
        assert!(confidence > 0.0);
    }

    #[test]
    fn unknown_text_falls_back_to_general() {
        let (domain, confidence) = classify_keyword("lorem ipsum dolor sit amet");
        assert_eq!(domain, DEFAULT_DOMAIN);
        assert!(confidence < 0.5);
    }

    #[tokio::test]
    async fn llm_response_is_preferred_when_enabled() {
        let llm = MockLlmProvider::with_response(r#"{"domain": "science", "confidence": 0.9}"#);
        let (domain, confidence) = classify_document(&llm, &["an experiment about gravity".into()], true).await;
        assert_eq!(domain, "science");
        assert!((confidence - 0.9).abs() < 1e-6);
    }

    #[tokio::test]
    async fn disabled_uses_keyword_path() {
        let llm = MockLlmProvider::with_response(r#"{"domain": "science", "confidence": 0.9}"#);
        let (domain, _) = classify_document(&llm, &["quarterly revenue and market strategy".into()], false).await;
        assert_eq!(domain, "business");
    }

    #[tokio::test]
    async fn empty_sample_returns_general_with_zero_confidence() {
        let llm = MockLlmProvider::new();
        let (domain, confidence) = classify_document(&llm, &[], true).await;
        assert_eq!(domain, DEFAULT_DOMAIN);
        assert_eq!(confidence, 0.0);
    }
}
