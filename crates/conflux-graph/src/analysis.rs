//! Per-document analysis and dynamic rule generation, grounded on
//! the original implementation's
//! `_analyze_text_content_with_llm`, `_generate_rules_with_llm`, and
//! `_get_or_create_document_analysis`. JSON recovery from the LLM's raw
//! output reuses [`conflux_model::json_extract::extract_json`] instead of
//! re-deriving the multi-strategy parser, per this module's design note
//! that this parser is a shared utility.

use crate::config::GraphConfig;
use crate::entities::Entity;
use crate::rules::{sample_text, DynamicRule};
use conflux_model::history::HistoryMessage;
use conflux_model::json_extract::extract_json;
use conflux_model::llm::{CompletionRequest, LlmProvider};
use conflux_types::ids::DocumentId;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::sleep;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    pub text_type: String,
    #[serde(default)]
    pub core_themes: Vec<String>,
    #[serde(default)]
    pub common_relations: Vec<String>,
    pub language_style: String,
}

impl DocumentAnalysis {
    fn unknown() -> Self {
        Self {
            text_type: "未知".to_string(),
            core_themes: Vec::new(),
            common_relations: Vec::new(),
            language_style: "未知".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DocumentCache {
    pub analysis: Option<DocumentAnalysis>,
    pub dynamic_rules: Vec<DynamicRule>,
}

/// A process-global bounded worker pool for KG extraction (default
/// concurrency 2), recreated on demand if it was torn down during
/// shutdown. Modeled
/// as a semaphore with a shutdown flag rather than a raw OS thread pool —
/// `tokio::task::spawn` already gives us the thread pool, this just bounds
/// concurrent LLM-backed analysis/rule-generation calls.
pub struct GraphWorkerPool {
    semaphore: Arc<Semaphore>,
    shut_down: AtomicBool,
    capacity: usize,
}

impl GraphWorkerPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            shut_down: AtomicBool::new(false),
            capacity,
        }
    }

    pub fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }

    /// Acquires a worker permit, recreating the semaphore on the spot if a
    /// prior `shutdown` call closed it out from under us.
    pub async fn acquire(&self) -> tokio::sync::OwnedSemaphorePermit {
        if self.shut_down.swap(false, Ordering::SeqCst) {
            tracing::debug!("kg worker pool was shut down, recreating");
        }
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("graph worker pool semaphore is never closed")
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Document-level analysis/rule cache (doc_id -> cached result), generated
/// once per document and reused across every chunk of that document.
pub struct DocumentAnalysisCache {
    cache: DashMap<DocumentId, Arc<DocumentCache>>,
    pool: GraphWorkerPool,
}

impl DocumentAnalysisCache {
    pub fn new(worker_count: usize) -> Self {
        Self {
            cache: DashMap::new(),
            pool: GraphWorkerPool::new(worker_count),
        }
    }

    pub fn clear(&self, doc_id: &DocumentId) {
        self.cache.remove(doc_id);
    }

    /// Returns the cached analysis/rules for `doc_id`, generating them (with
    /// retry) on first use if dynamic rules are enabled.
    pub async fn get_or_create(
        &self,
        llm: &dyn LlmProvider,
        doc_id: DocumentId,
        document_text: &str,
        config: &GraphConfig,
    ) -> Arc<DocumentCache> {
        if let Some(existing) = self.cache.get(&doc_id) {
            return existing.clone();
        }

        let mut cache = DocumentCache::default();
        if config.dynamic_rules_enabled {
            let _permit = self.pool.acquire().await;
            let sample = sample_text(document_text, config.sample_text_length, config.sample_method);

            let analysis = retry(config.dynamic_rules_retry_count, config.dynamic_rules_retry_delay_ms, || {
                analyze_text_content(llm, &sample)
            })
            .await;
            cache.analysis = Some(analysis.clone());

            let entities = extract_entities_by_rules_for_sample(&sample);
            let rules = retry(config.dynamic_rules_retry_count, config.dynamic_rules_retry_delay_ms, || {
                generate_rules(llm, &sample, &analysis, &entities)
            })
            .await;
            cache.dynamic_rules = rules;
        }

        let cache = Arc::new(cache);
        self.cache.insert(doc_id, cache.clone());
        cache
    }
}

fn extract_entities_by_rules_for_sample(sample: &str) -> Vec<Entity> {
    crate::entities::extract_entities_by_rules(sample)
}

async fn retry<T, F, Fut>(attempts: u32, delay_ms: u64, mut f: F) -> T
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Option<T>>,
    T: Default,
{
    for attempt in 0..attempts.max(1) {
        if let Some(result) = f().await {
            return result;
        }
        if attempt + 1 < attempts {
            sleep(std::time::Duration::from_millis(delay_ms)).await;
        }
    }
    T::default()
}

/// Analyzes a text sample into `{text_type, core_themes, common_relations,
/// language_style}`, returning `None` (to trigger a retry) when the LLM's
/// answer didn't parse or came back as the unknown placeholder.
async fn analyze_text_content(llm: &dyn LlmProvider, sample: &str) -> Option<DocumentAnalysis> {
    let truncated: String = sample.chars().take(1500).collect();
    let prompt = format!(
        "请分析以下文本的核心内容，并回答以下问题：\n\n1. 文本类型（如：小说、历史、技术文档、新闻、对话等）\n2. 核心主题（1-3个关键词）\n3. 文本中常见的关系类型\n4. 文本的语言风格\n\n文本样本：\n{truncated}\n\n请以JSON格式输出：{{\"text_type\": \"...\", \"core_themes\": [...], \"common_relations\": [...], \"language_style\": \"...\"}}\n只输出JSON，不要添加任何解释文字。"
    );
    let request = CompletionRequest::new(vec![
        HistoryMessage::system("你是一个专业的文本分析专家，擅长快速识别文本类型、主题和关系模式。"),
        HistoryMessage::user(prompt),
    ]);

    let response = match llm.complete(request).await {
        Ok(r) => r,
        Err(err) => {
            tracing::warn!(error = %err, "document analysis llm call failed");
            return None;
        }
    };

    match extract_json(&response).and_then(|v| serde_json::from_value::<DocumentAnalysis>(v).ok()) {
        Some(analysis) if analysis.text_type != "未知" && !analysis.text_type.is_empty() => Some(analysis),
        _ => None,
    }
}

#[derive(Deserialize)]
struct RulesResponse {
    #[serde(default)]
    rules: Vec<DynamicRule>,
}

/// Generates 5-10 dynamic relation rules from a sample, the analysis, and a
/// few entity examples. Returns `None` (to trigger a retry) on an empty or
/// unparseable result.
async fn generate_rules(
    llm: &dyn LlmProvider,
    sample: &str,
    analysis: &DocumentAnalysis,
    entities: &[Entity],
) -> Option<Vec<DynamicRule>> {
    let entity_info = entity_examples(entities);
    let truncated: String = sample.chars().take(1000).collect();
    let prompt = format!(
        "根据以下信息，为文本生成适合的关系提取规则（正则表达式模式）。\n\n文本类型：{}\n核心主题：{}\n常见关系：{}\n语言风格：{}\n\n识别到的实体类型和示例：\n{entity_info}\n\n文本样本：\n{truncated}\n\n请生成5-10个关系提取规则，以JSON格式输出：{{\"rules\": [{{\"pattern\": \"...\", \"relation\": \"...\", \"description\": \"...\", \"subject_group\": 1, \"object_group\": 3, \"relation_group\": null}}]}}\n只输出JSON，不要添加任何解释文字。",
        analysis.text_type,
        analysis.core_themes.join(", "),
        analysis.common_relations.join(", "),
        analysis.language_style,
    );
    let request = CompletionRequest::new(vec![
        HistoryMessage::system("你是一个专业的正则表达式和关系提取专家，擅长根据文本特点生成精准的匹配规则。"),
        HistoryMessage::user(prompt),
    ]);

    let response = match llm.complete(request).await {
        Ok(r) => r,
        Err(err) => {
            tracing::warn!(error = %err, "dynamic rule generation llm call failed");
            return None;
        }
    };

    let rules = extract_json(&response)
        .and_then(|v| serde_json::from_value::<RulesResponse>(v).ok())
        .map(|r| r.rules)
        .unwrap_or_default();

    let valid: Vec<DynamicRule> = rules
        .into_iter()
        .filter(|r| !r.pattern.is_empty() && !r.relation.is_empty() && regex::Regex::new(&r.pattern).is_ok())
        .collect();

    if valid.is_empty() {
        None
    } else {
        Some(valid)
    }
}

fn entity_examples(entities: &[Entity]) -> String {
    use std::collections::BTreeMap;
    let mut by_label: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for entity in entities.iter().take(10) {
        let bucket = by_label.entry(entity.label.as_str()).or_default();
        if bucket.len() < 3 {
            bucket.push(entity.text.as_str());
        }
    }
    by_label
        .into_iter()
        .map(|(label, examples)| format!("- {label}: {}", examples.join(", ")))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use conflux_model::mock::MockLlmProvider;

    #[tokio::test]
    async fn analysis_cache_reuses_result_for_same_document() {
        let cache = DocumentAnalysisCache::new(2);
        let llm = MockLlmProvider::with_response(
            r#"{"rules": [{"pattern": "(.+?)(是)(.+)", "relation": "是", "subject_group": 1, "object_group": 3}]}"#,
        );
        let config = GraphConfig {
            dynamic_rules_enabled: true,
            dynamic_rules_retry_count: 1,
            ..GraphConfig::default()
        };
        let doc_id = DocumentId::new("doc1");
        let first = cache.get_or_create(&llm, doc_id.clone(), "刘备是蜀汉的皇帝。", &config).await;
        let second = cache.get_or_create(&llm, doc_id, "刘备是蜀汉的皇帝。", &config).await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.dynamic_rules.len(), 1);
    }

    #[tokio::test]
    async fn disabled_dynamic_rules_short_circuit() {
        let cache = DocumentAnalysisCache::new(2);
        let llm = MockLlmProvider::new();
        let config = GraphConfig {
            dynamic_rules_enabled: false,
            ..GraphConfig::default()
        };
        let result = cache.get_or_create(&llm, DocumentId::new("doc2"), "text", &config).await;
        assert!(result.analysis.is_none());
        assert!(result.dynamic_rules.is_empty());
    }

    #[test]
    fn document_analysis_unknown_placeholder_is_named() {
        assert_eq!(DocumentAnalysis::unknown().text_type, "未知");
    }
}
