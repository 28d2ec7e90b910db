//! The C1 Tool Registry: `register`, `get`, `list`, `list_by_category`,
//! `execute`, `reset_tool_score`.

use crate::score::{ScoreRecord, ScoreStore, clamp_score, default_record, recompute_availability};
use crate::tool::{Tool, looks_like_soft_failure};
use conflux_types::Result;
use conflux_types::model::{ToolInfo, ToolType, TOOL_MIN_AVAILABLE_SCORE};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

struct Registered {
    tool: Arc<dyn Tool>,
    tool_type: ToolType,
}

pub struct ToolRegistry {
    tools: DashMap<String, Registered>,
    scores: Arc<dyn ScoreStore>,
    min_available_score: f32,
}

impl ToolRegistry {
    pub fn new(scores: Arc<dyn ScoreStore>) -> Self {
        Self {
            tools: DashMap::new(),
            scores,
            min_available_score: TOOL_MIN_AVAILABLE_SCORE,
        }
    }

    pub fn with_min_available_score(mut self, threshold: f32) -> Self {
        self.min_available_score = threshold;
        self
    }

    pub fn register(&self, tool: Arc<dyn Tool>, tool_type: ToolType) {
        let name = tool.name().to_string();
        if self.scores.get(tool_type, &name).is_none() {
            self.scores
                .put(tool_type, &name, default_record(self.min_available_score));
        }
        self.tools.insert(name, Registered { tool, tool_type });
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|r| r.tool.clone())
    }

    /// All registered tools (optionally filtered by type), sorted by score
    /// descending.
    pub fn list(&self, tool_type: Option<ToolType>) -> Vec<ToolInfo> {
        let mut infos: Vec<ToolInfo> = self
            .tools
            .iter()
            .filter(|entry| tool_type.map(|t| t == entry.tool_type).unwrap_or(true))
            .map(|entry| self.describe(entry.key(), &entry))
            .collect();
        infos.sort_by(|a, b| b.score.total_cmp(&a.score));
        infos
    }

    /// Category here is the tool's type name (`builtin`/`mcp`/`temporary`);
    /// finer-grained catalog categories belong to the node-facing layer.
    pub fn list_by_category(&self, category: &str) -> Vec<ToolInfo> {
        let tool_type = match category {
            "builtin" => Some(ToolType::Builtin),
            "mcp" => Some(ToolType::Mcp),
            "temporary" => Some(ToolType::Temporary),
            _ => None,
        };
        self.list(tool_type)
    }

    fn describe(&self, name: &str, entry: &Registered) -> ToolInfo {
        let record = self
            .scores
            .get(entry.tool_type, name)
            .unwrap_or_else(|| default_record(self.min_available_score));
        ToolInfo {
            name: name.to_string(),
            description: entry.tool.description().to_string(),
            parameters_schema: entry.tool.parameters_schema(),
            tool_type: entry.tool_type,
            container_type: entry.tool.container_type(),
            container_config: Value::Null,
            score: record.score,
            is_available: record.is_available,
        }
    }

    /// Runs a registered tool by name and updates its reliability score.
    pub async fn execute(&self, name: &str, params: Value) -> Result<Value> {
        let entry = self
            .tools
            .get(name)
            .ok_or_else(|| conflux_types::Error::routing(format!("unknown tool `{name}`")))?;
        let tool_type = entry.tool_type;
        let tool = entry.tool.clone();
        drop(entry);

        let record = self
            .scores
            .get(tool_type, name)
            .unwrap_or_else(|| default_record(self.min_available_score));
        if record.score < self.min_available_score {
            return Err(conflux_types::Error::execution(format!(
                "tool `{name}` unavailable (score {:.2} < {:.2})",
                record.score, self.min_available_score
            )));
        }

        match tool.call(params).await {
            Ok(result) => {
                let soft_failed = looks_like_soft_failure(name, &result);
                let delta = if soft_failed { -0.5 } else { 0.1 };
                self.apply_score_delta(tool_type, name, record.score, delta);
                if soft_failed {
                    tracing::warn!(tool = name, "soft failure detected in tool result");
                }
                Ok(result)
            }
            Err(e) => {
                self.apply_score_delta(tool_type, name, record.score, -0.5);
                Err(e)
            }
        }
    }

    fn apply_score_delta(&self, tool_type: ToolType, name: &str, previous: f32, delta: f32) {
        let score = clamp_score(previous + delta);
        let is_available = recompute_availability(score, self.min_available_score);
        self.scores
            .put(tool_type, name, ScoreRecord { score, is_available });
    }

    /// Resets a tool's score to the default and re-enables it.
    pub fn reset_tool_score(&self, name: &str) -> Result<()> {
        let entry = self
            .tools
            .get(name)
            .ok_or_else(|| conflux_types::Error::routing(format!("unknown tool `{name}`")))?;
        let tool_type = entry.tool_type;
        drop(entry);
        self.scores
            .put(tool_type, name, default_record(self.min_available_score));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::InMemoryScoreStore;
    use crate::tool::Tool;
    use async_trait::async_trait;

    struct FailingTool {
        name: &'static str,
    }

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            self.name
        }

        async fn call(&self, _params: Value) -> Result<Value> {
            Err(conflux_types::Error::execution("boom"))
        }
    }

    struct SucceedingTool {
        name: &'static str,
    }

    #[async_trait]
    impl Tool for SucceedingTool {
        fn name(&self) -> &str {
            self.name
        }

        async fn call(&self, params: Value) -> Result<Value> {
            Ok(params)
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new(Arc::new(InMemoryScoreStore::new()))
    }

    #[tokio::test]
    async fn success_raises_score_strictly() {
        let registry = registry();
        registry.register(Arc::new(SucceedingTool { name: "ok" }), ToolType::Builtin);
        let before = registry.list(None)[0].score;
        registry.execute("ok", Value::Null).await.unwrap();
        let after = registry.list(None)[0].score;
        assert!(after > before);
    }

    #[tokio::test]
    async fn failure_lowers_score_strictly() {
        let registry = registry();
        registry.register(Arc::new(FailingTool { name: "bad" }), ToolType::Builtin);
        let before = registry.list(None)[0].score;
        let _ = registry.execute("bad", Value::Null).await;
        let after = registry.list(None)[0].score;
        assert!(after < before);
    }

    #[tokio::test]
    async fn four_consecutive_failures_disable_the_tool() {
        let registry = registry();
        registry.register(Arc::new(FailingTool { name: "x" }), ToolType::Builtin);
        for _ in 0..4 {
            let _ = registry.execute("x", Value::Null).await;
        }
        let info = registry.list(None).into_iter().find(|t| t.name == "x").unwrap();
        assert!(info.score <= TOOL_MIN_AVAILABLE_SCORE);
        assert!(!info.is_available);
        let err = registry.execute("x", Value::Null).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn reset_tool_score_restores_default_and_availability() {
        let registry = registry();
        registry.register(Arc::new(FailingTool { name: "y" }), ToolType::Builtin);
        for _ in 0..4 {
            let _ = registry.execute("y", Value::Null).await;
        }
        registry.reset_tool_score("y").unwrap();
        let info = registry.list(None).into_iter().find(|t| t.name == "y").unwrap();
        assert_eq!(info.score, conflux_types::model::TOOL_DEFAULT_SCORE);
        assert!(info.is_available);
    }

    #[tokio::test]
    async fn score_stays_within_bounds() {
        let registry = registry();
        registry.register(Arc::new(SucceedingTool { name: "s" }), ToolType::Builtin);
        for _ in 0..100 {
            registry.execute("s", Value::Null).await.unwrap();
        }
        let info = registry.list(None).into_iter().find(|t| t.name == "s").unwrap();
        assert!(info.score <= conflux_types::model::TOOL_MAX_SCORE);
    }
}
