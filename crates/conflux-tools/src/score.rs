//! Tool scoring: score lives in
//! `[1.0, 5.0]`, starts at `TOOL_DEFAULT_SCORE`, moves by +0.1 on success,
//! -0.5 on failure/soft-failure, and `is_available` is recomputed from
//! `score >= min_available_score` every time it changes.

use conflux_types::model::{ToolType, TOOL_DEFAULT_SCORE, TOOL_MAX_SCORE, TOOL_MIN_SCORE};
use dashmap::DashMap;

#[derive(Debug, Clone, Copy)]
pub struct ScoreRecord {
    pub score: f32,
    pub is_available: bool,
}

/// Persists tool scores "to the backing store for that tool's type"
///. The default is an in-process map; a deployment that
/// wants durable scores implements this trait over its database.
pub trait ScoreStore: Send + Sync {
    fn get(&self, tool_type: ToolType, name: &str) -> Option<ScoreRecord>;
    fn put(&self, tool_type: ToolType, name: &str, record: ScoreRecord);
}

#[derive(Default)]
pub struct InMemoryScoreStore {
    records: DashMap<(ToolType, String), ScoreRecord>,
}

impl InMemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScoreStore for InMemoryScoreStore {
    fn get(&self, tool_type: ToolType, name: &str) -> Option<ScoreRecord> {
        self.records.get(&(tool_type, name.to_string())).map(|r| *r)
    }

    fn put(&self, tool_type: ToolType, name: &str, record: ScoreRecord) {
        self.records.insert((tool_type, name.to_string()), record);
    }
}

pub fn recompute_availability(score: f32, min_available_score: f32) -> bool {
    score >= min_available_score
}

pub fn clamp_score(score: f32) -> f32 {
    score.clamp(TOOL_MIN_SCORE, TOOL_MAX_SCORE)
}

pub fn default_record(min_available_score: f32) -> ScoreRecord {
    ScoreRecord {
        score: TOOL_DEFAULT_SCORE,
        is_available: recompute_availability(TOOL_DEFAULT_SCORE, min_available_score),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_keeps_score_in_bounds() {
        assert_eq!(clamp_score(10.0), TOOL_MAX_SCORE);
        assert_eq!(clamp_score(-3.0), TOOL_MIN_SCORE);
        assert_eq!(clamp_score(3.2), 3.2);
    }
}
