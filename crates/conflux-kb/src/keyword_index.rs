//! Keyword recall route: an inverted index built on
//! `tantivy`'s tokenizer pipeline (stopword removal + lowercasing), scored
//! with the documented custom rule — sum of term counts weighted by
//! earliest position — rather than tantivy's own BM25 `Query`/`Weight`
//! machinery, since the scoring semantics are bespoke.

use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Mutex;
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer};

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "of", "in", "on", "at", "to", "for", "and",
    "or", "but", "with", "this", "that", "it", "as", "be", "by", "from",
    "的", "了", "在", "是", "我", "有", "和", "就", "不", "人", "都", "一", "一个", "上", "也",
    "很", "到", "说", "要", "去", "你", "会", "着", "没有", "看", "好", "自己", "这",
];

fn build_analyzer() -> TextAnalyzer {
    TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(LowerCaser)
        .filter(StopWordFilter::remove(STOPWORDS.iter().map(|s| s.to_string()).collect()))
        .build()
}

/// One chunk's tokenized content plus the match summary `search` needs for
/// a given query: score, and how many distinct query terms matched (used
/// by `retrieval.rs`'s hybrid merge step.
pub struct KeywordMatch {
    pub chunk_id: String,
    pub score: f32,
    pub matched_terms: usize,
}

pub struct KeywordIndex {
    analyzer: Mutex<TextAnalyzer>,
    documents: DashMap<String, Vec<String>>,
}

impl KeywordIndex {
    pub fn new() -> Self {
        Self {
            analyzer: Mutex::new(build_analyzer()),
            documents: DashMap::new(),
        }
    }

    pub fn index_chunk(&self, chunk_id: &str, content: &str) {
        let tokens = self.tokenize(content);
        self.documents.insert(chunk_id.to_string(), tokens);
    }

    pub fn remove(&self, chunk_id: &str) {
        self.documents.remove(chunk_id);
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn tokenize(&self, text: &str) -> Vec<String> {
        let mut analyzer = self.analyzer.lock().expect("keyword index mutex poisoned");
        let mut stream = analyzer.token_stream(text);
        let mut tokens = Vec::new();
        while stream.advance() {
            tokens.push(stream.token().text.clone());
        }
        tokens
    }

    /// Scores every indexed chunk against `query`'s distinct terms (after
    /// stopword removal), returning the top `top_k` by score.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<KeywordMatch> {
        let query_terms: HashSet<String> = self.tokenize(query).into_iter().collect();
        if query_terms.is_empty() {
            return Vec::new();
        }
        let mut scored: Vec<KeywordMatch> = self
            .documents
            .iter()
            .filter_map(|entry| {
                let tokens = entry.value();
                let mut score = 0f32;
                let mut matched_terms = 0usize;
                for term in &query_terms {
                    if let Some(earliest) = tokens.iter().position(|t| t == term) {
                        let count = tokens.iter().filter(|t| *t == term).count();
                        score += count as f32 / (1.0 + earliest as f32);
                        matched_terms += 1;
                    }
                }
                (matched_terms > 0).then(|| KeywordMatch {
                    chunk_id: entry.key().clone(),
                    score,
                    matched_terms,
                })
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        scored
    }
}

impl Default for KeywordIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_content_scores_highest() {
        let index = KeywordIndex::new();
        index.index_chunk("a", "the quick brown fox jumps over the lazy dog");
        index.index_chunk("b", "an unrelated sentence about something else entirely");
        let results = index.search("quick brown fox", 5);
        assert_eq!(results[0].chunk_id, "a");
    }

    #[test]
    fn earlier_position_scores_higher_than_later() {
        let index = KeywordIndex::new();
        index.index_chunk("early", "rust is a systems language");
        index.index_chunk("late", "we were discussing languages and eventually got to rust");
        let results = index.search("rust", 5);
        assert_eq!(results[0].chunk_id, "early");
    }

    #[test]
    fn stopword_only_query_returns_nothing() {
        let index = KeywordIndex::new();
        index.index_chunk("a", "the quick brown fox");
        assert!(index.search("the is a", 5).is_empty());
    }
}
