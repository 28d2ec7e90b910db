//! Process-wide shared state handed to every handler via axum's `State`
//! extractor, following the pattern of `packages/api/src/state.rs` `State`
//! struct (one `Arc` per shared subsystem, `moka` caches, lazily-built
//! scoped resources) — trimmed to the subsystems this crate actually names:
//! no multi-tenant credential scoping or JWT validation.

use conflux_agents::AgentRuntime;
use conflux_graph::GraphStore;
use conflux_kb::KbIndex;
use conflux_mcp::McpHelper;
use conflux_model::embedding::EmbeddingProvider;
use conflux_model::llm::LlmProvider;
use conflux_storage::snapshot::SnapshotStore;
use conflux_storage::ConfluxStore;
use conflux_tools::ToolRegistry;
use dashmap::{DashMap, DashSet};
use std::sync::Arc;

use crate::agent_registry::AgentRegistry;
use crate::session_store::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub tools: Arc<ToolRegistry>,
    pub mcp: Arc<McpHelper>,
    pub runtime: Arc<AgentRuntime>,
    pub agents: Arc<AgentRegistry>,
    pub kbs: Arc<DashMap<String, Arc<KbIndex>>>,
    pub graph: Arc<GraphStore>,
    pub graph_config: Arc<conflux_graph::GraphConfig>,
    pub analysis_cache: Arc<conflux_graph::DocumentAnalysisCache>,
    pub retrieval_config: Arc<conflux_kb::RetrievalConfig>,
    pub llm: Arc<dyn LlmProvider>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub reranker: Option<Arc<dyn conflux_kb::Reranker>>,
    pub sessions: Arc<SessionStore>,
    pub snapshots: Arc<SnapshotStore>,
    /// `(agent_name, user_id)` pairs whose pipeline has already been
    /// restored from a snapshot this process lifetime, so repeated chat
    /// turns don't re-read storage for a pipeline already resident in
    /// `AgentRuntime`.
    pub restored: Arc<DashSet<String>>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tools: Arc<ToolRegistry>,
        mcp: Arc<McpHelper>,
        llm: Arc<dyn LlmProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        reranker: Option<Arc<dyn conflux_kb::Reranker>>,
        graph_config: conflux_graph::GraphConfig,
        retrieval_config: conflux_kb::RetrievalConfig,
        object_store: ConfluxStore,
    ) -> Self {
        let runtime = Arc::new(AgentRuntime::new(tools.clone(), llm.clone()));
        let analysis_cache = Arc::new(conflux_graph::DocumentAnalysisCache::new(graph_config.worker_count));
        Self {
            tools,
            mcp,
            runtime,
            agents: Arc::new(AgentRegistry::new()),
            kbs: Arc::new(DashMap::new()),
            graph: Arc::new(GraphStore::new()),
            graph_config: Arc::new(graph_config),
            analysis_cache,
            retrieval_config: Arc::new(retrieval_config),
            llm,
            embedder,
            reranker,
            sessions: Arc::new(SessionStore::new(object_store.clone())),
            snapshots: Arc::new(SnapshotStore::new(object_store)),
            restored: Arc::new(DashSet::new()),
        }
    }

    pub fn kb_querier(&self) -> Arc<dyn conflux_agents::KnowledgeQuerier> {
        Arc::new(crate::agent_registry::KbQuerier {
            kbs: self.kbs.clone(),
            embedder: self.embedder.clone(),
            llm: self.llm.clone(),
            reranker: self.reranker.clone(),
            graph: Some(Arc::new(conflux_graph::KnowledgeGraphEnhancer::new(self.graph.clone())) as Arc<dyn conflux_kb::GraphEnhancer>),
            config: (*self.retrieval_config).clone(),
        })
    }

    /// The `SessionHistorySource` `GeneralAgent` rehydrates a cold-process
    /// conversation window from.
    pub fn history_source(&self) -> Arc<dyn conflux_agents::SessionHistorySource> {
        self.sessions.clone()
    }

    /// Restores a pipeline snapshot into `AgentRuntime` the first time this
    /// `(agent, user)` pair is seen this process lifetime.
    pub async fn restore_pipeline_once(&self, agent_name: &str, user_id: &str, session_id: &str) {
        let key = format!("{agent_name}:{user_id}");
        if self.restored.contains(&key) {
            return;
        }
        self.restored.insert(key);

        match self.snapshots.load::<conflux_store::PipelineExport>(user_id, agent_name, session_id).await {
            Ok(Some(export)) => {
                self.runtime.with_pipeline(agent_name, user_id, |pipeline| {
                    pipeline.import_data(conflux_store::PipelineImport {
                        data: Some(export.data),
                        data_3d: Some(export.data_3d),
                        files: Some(export.files),
                    });
                });
            }
            Ok(None) => {}
            Err(err) => {
                //  ConsistencyError: a corrupt/missing snapshot is
                // "no snapshot", not a request failure.
                tracing::warn!(agent_name, user_id, %err, "snapshot load failed, starting fresh pipeline");
            }
        }
    }

    /// Persists the current in-memory pipeline for `(agent, user)` under
    /// `session_id`.
    pub async fn save_pipeline(&self, agent_name: &str, user_id: &str, session_id: &str) {
        let export = self.runtime.with_pipeline(agent_name, user_id, |pipeline| pipeline.export());
        if let Err(err) = self.snapshots.save(user_id, agent_name, session_id, &export).await {
            tracing::warn!(agent_name, user_id, %err, "snapshot save failed");
        }
    }
}
