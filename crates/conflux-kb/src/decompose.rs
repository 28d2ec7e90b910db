//! Query decomposition: break a user query into at
//! most 5 standalone sub-queries so multi-route recall can search each one,
//! grounded on the original implementation's
//! `_decompose_query`, with a keyword-split fallback when the LLM call fails
//! or yields nothing usable.

use conflux_model::history::HistoryMessage;
use conflux_model::json_extract::extract_json;
use conflux_model::llm::{CompletionRequest, LlmProvider};
use once_cell::sync::Lazy;
use regex::Regex;

const MAX_SUB_QUERIES: usize = 5;

static CONJUNCTIONS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[,;，；]| and | or |和|与|以及").unwrap());

/// Returns an empty vec when decomposition is disabled or the query is a
/// single clause not worth splitting.
pub async fn decompose_query(llm: &dyn LlmProvider, query: &str, enabled: bool) -> Vec<String> {
    if !enabled {
        return Vec::new();
    }
    match llm_decompose(llm, query).await {
        Some(terms) if !terms.is_empty() => terms,
        _ => keyword_fallback(query),
    }
}

async fn llm_decompose(llm: &dyn LlmProvider, query: &str) -> Option<Vec<String>> {
    let request = CompletionRequest::new(vec![
        HistoryMessage::system(
            "Decompose the user's question into at most 5 short standalone search queries \
             covering its distinct facets. Reply with a JSON array of strings and nothing else.",
        ),
        HistoryMessage::user(query),
    ]);
    let raw = llm.complete(request).await.ok()?;
    let value = extract_json(&raw)?;
    let array = value.as_array()?;
    let terms: Vec<String> = array
        .iter()
        .filter_map(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.into_iter().take(MAX_SUB_QUERIES).collect())
    }
}

fn keyword_fallback(query: &str) -> Vec<String> {
    let parts: Vec<String> = CONJUNCTIONS
        .split(query)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(MAX_SUB_QUERIES)
        .map(str::to_string)
        .collect();
    if parts.len() > 1 {
        parts
    } else {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conflux_model::mock::MockLlmProvider;

    #[tokio::test]
    async fn llm_array_response_is_parsed() {
        let llm = MockLlmProvider::with_response(r#"["first facet", "second facet"]"#);
        let terms = decompose_query(&llm, "tell me about a and b", true).await;
        assert_eq!(terms, vec!["first facet".to_string(), "second facet".to_string()]);
    }

    #[tokio::test]
    async fn disabled_returns_empty() {
        let llm = MockLlmProvider::with_response(r#"["a", "b"]"#);
        assert!(decompose_query(&llm, "anything", false).await.is_empty());
    }

    #[test]
    fn keyword_fallback_splits_on_conjunctions() {
        let parts = keyword_fallback("revenue growth and customer churn");
        assert_eq!(parts, vec!["revenue growth".to_string(), "customer churn".to_string()]);
    }

    #[test]
    fn keyword_fallback_leaves_single_clause_alone() {
        assert!(keyword_fallback("just one clause").is_empty());
    }
}
