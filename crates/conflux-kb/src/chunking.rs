//! Document chunking strategies, grounded on
//! the original implementation's
//! `_chunk_hierarchical`/`_chunk_semantic`/`_chunk_sentence`/`_chunk_fixed`
//! and the min/max post-processing pass that follows them.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    Hierarchical,
    /// LangChain's recursive splitter is an external collaborator; this substitutes a recursive separator-cascade splitter, the
    /// idiomatic Rust analogue, noted as a REDESIGN in DESIGN.md.
    Semantic,
    Sentence,
    Fixed,
}

impl Default for ChunkStrategy {
    fn default() -> Self {
        ChunkStrategy::Hierarchical
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChunkParams {
    pub target_size: usize,
    pub overlap: usize,
    pub min_chunk_size: usize,
    pub max_chunk_size: usize,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            target_size: 800,
            overlap: 100,
            min_chunk_size: 100,
            max_chunk_size: 1600,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RawChunk {
    pub content: String,
    pub metadata: HashMap<String, serde_json::Value>,
}

static HEADING_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // Markdown headings.
        Regex::new(r"(?m)^#{1,6}\s+.+$").unwrap(),
        // "第一章"/"第1节" style chapter/section markers.
        Regex::new(r"(?m)^第[〇一二三四五六七八九十百千万\d]+[章节篇回].*$").unwrap(),
        // Leading-digit outline headings: "1. Title", "1.2 Title".
        Regex::new(r"(?m)^\d+(\.\d+)*[\.\s].{0,80}$").unwrap(),
    ]
});

static SENTENCE_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:[。！？!?]|\.(?=\s|$))").unwrap());

/// Entry point: chunk `content` per `strategy`, then enforce
/// `params.min_chunk_size`/`max_chunk_size`.
pub fn chunk_document(content: &str, strategy: ChunkStrategy, params: &ChunkParams) -> Vec<RawChunk> {
    let raw = match strategy {
        ChunkStrategy::Hierarchical => chunk_hierarchical(content, params),
        ChunkStrategy::Semantic => chunk_semantic(content, params),
        ChunkStrategy::Sentence => chunk_sentence(content, params),
        ChunkStrategy::Fixed => chunk_fixed(content, params),
    };
    enforce_size_bounds(raw, params)
}

fn split_sections(content: &str) -> Vec<String> {
    let mut boundaries = vec![0usize];
    for re in HEADING_PATTERNS.iter() {
        for m in re.find_iter(content) {
            if m.start() > 0 {
                boundaries.push(m.start());
            }
        }
    }
    boundaries.sort_unstable();
    boundaries.dedup();
    if boundaries.len() <= 1 {
        return vec![content.to_string()];
    }
    let mut sections = Vec::with_capacity(boundaries.len());
    for window in boundaries.windows(2) {
        sections.push(content[window[0]..window[1]].to_string());
    }
    if let Some(&last) = boundaries.last() {
        sections.push(content[last..].to_string());
    }
    sections.into_iter().filter(|s| !s.trim().is_empty()).collect()
}

/// Section-aware chunking: detect headings, split by section, then
/// paragraph, then sentence-merge to `target_size` with `overlap`.
fn chunk_hierarchical(content: &str, params: &ChunkParams) -> Vec<RawChunk> {
    let mut out = Vec::new();
    for section in split_sections(content) {
        let paragraphs: Vec<&str> = section.split("\n\n").filter(|p| !p.trim().is_empty()).collect();
        let merged = merge_sentence_units(&paragraphs, params);
        out.extend(merged);
    }
    if out.is_empty() {
        out = chunk_sentence(content, params);
    }
    out
}

/// Recursive separator-cascade split: try progressively finer separators
/// until every piece is within `target_size`.
fn chunk_semantic(content: &str, params: &ChunkParams) -> Vec<RawChunk> {
    const SEPARATORS: &[&str] = &["\n\n", "\n", "。", "！", "？", ". ", " "];
    fn split_recursive(text: &str, seps: &[&str], target: usize) -> Vec<String> {
        if text.chars().count() <= target || seps.is_empty() {
            return vec![text.to_string()];
        }
        let (sep, rest) = (seps[0], &seps[1..]);
        let pieces: Vec<&str> = text.split(sep).filter(|p| !p.is_empty()).collect();
        if pieces.len() <= 1 {
            return split_recursive(text, rest, target);
        }
        pieces
            .into_iter()
            .flat_map(|p| split_recursive(p, rest, target))
            .collect()
    }
    let pieces = split_recursive(content, SEPARATORS, params.target_size);
    let merged = merge_sentence_units(&pieces.iter().map(String::as_str).collect::<Vec<_>>(), params);
    merged
}

fn chunk_sentence(content: &str, params: &ChunkParams) -> Vec<RawChunk> {
    let sentences: Vec<&str> = SENTENCE_BOUNDARY
        .split(content)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    merge_sentence_units(&sentences, params)
}

/// Greedily merges consecutive units (sentences/paragraphs) into chunks
/// near `target_size`, carrying `overlap` characters from the tail of one
/// chunk into the head of the next.
fn merge_sentence_units(units: &[&str], params: &ChunkParams) -> Vec<RawChunk> {
    let mut out = Vec::new();
    let mut current = String::new();
    for unit in units {
        if !current.is_empty() && current.chars().count() + unit.chars().count() > params.target_size {
            out.push(RawChunk { content: current.clone(), metadata: HashMap::new() });
            current = tail_chars(&current, params.overlap);
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(unit);
    }
    if !current.trim().is_empty() {
        out.push(RawChunk { content: current, metadata: HashMap::new() });
    }
    out
}

fn chunk_fixed(content: &str, params: &ChunkParams) -> Vec<RawChunk> {
    let chars: Vec<char> = content.chars().collect();
    let step = params.target_size.saturating_sub(params.overlap).max(1);
    let mut out = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + params.target_size).min(chars.len());
        let piece: String = chars[start..end].iter().collect();
        if !piece.trim().is_empty() {
            out.push(RawChunk { content: piece, metadata: HashMap::new() });
        }
        if end == chars.len() {
            break;
        }
        start += step;
    }
    out
}

fn tail_chars(s: &str, n: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    let start = chars.len().saturating_sub(n);
    chars[start..].iter().collect()
}

/// Merges undersized chunks into the previous one; re-splits oversized
/// chunks by sliding window with step `chunk_size - overlap`. The final chunk of the document
/// is exempt from the minimum.
fn enforce_size_bounds(chunks: Vec<RawChunk>, params: &ChunkParams) -> Vec<RawChunk> {
    let mut merged: Vec<RawChunk> = Vec::new();
    let last_index = chunks.len().saturating_sub(1);
    for (i, chunk) in chunks.into_iter().enumerate() {
        let too_small = chunk.content.chars().count() < params.min_chunk_size;
        if too_small && i != last_index {
            if let Some(prev) = merged.last_mut() {
                prev.content.push(' ');
                prev.content.push_str(&chunk.content);
                continue;
            }
        }
        merged.push(chunk);
    }

    let mut resized = Vec::new();
    for chunk in merged {
        if chunk.content.chars().count() <= params.max_chunk_size {
            resized.push(chunk);
            continue;
        }
        let step = params.max_chunk_size.saturating_sub(params.overlap).max(1);
        let chars: Vec<char> = chunk.content.chars().collect();
        let mut start = 0;
        while start < chars.len() {
            let end = (start + params.max_chunk_size).min(chars.len());
            resized.push(RawChunk {
                content: chars[start..end].iter().collect(),
                metadata: chunk.metadata.clone(),
            });
            if end == chars.len() {
                break;
            }
            start += step;
        }
    }
    resized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_chunks_respect_overlap_step() {
        let content = "a".repeat(50);
        let params = ChunkParams { target_size: 20, overlap: 5, min_chunk_size: 1, max_chunk_size: 20 };
        let chunks = chunk_document(&content, ChunkStrategy::Fixed, &params);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.content.chars().count() <= 20));
    }

    #[test]
    fn undersized_chunk_merges_into_previous() {
        let params = ChunkParams { target_size: 5, overlap: 0, min_chunk_size: 10, max_chunk_size: 1000 };
        let chunks = chunk_document("one two three four five six seven", ChunkStrategy::Sentence, &params);
        assert!(chunks.iter().take(chunks.len().saturating_sub(1)).all(|c| c.content.chars().count() >= 10));
    }

    #[test]
    fn oversized_chunk_is_resplit_with_overlap_step() {
        let params = ChunkParams { target_size: 10_000, overlap: 10, min_chunk_size: 1, max_chunk_size: 50 };
        let content = "word ".repeat(100);
        let chunks = chunk_document(&content, ChunkStrategy::Fixed, &params);
        assert!(chunks.iter().all(|c| c.content.chars().count() <= 50));
    }

    #[test]
    fn hierarchical_splits_on_markdown_headings() {
        let content = "# Intro\nhello world\n\n# Chapter Two\nmore text here";
        let params = ChunkParams { target_size: 10, overlap: 0, min_chunk_size: 1, max_chunk_size: 1000 };
        let chunks = chunk_document(content, ChunkStrategy::Hierarchical, &params);
        assert!(chunks.len() >= 2);
    }
}
