//! CRUD over `AgentConfig` plus the factory that turns a
//! stored config into a live [`GeneralAgent`] or [`FlowDrivenAgent`],
//! following the pattern of board/app registry pattern
//! (`packages/api/src/routes/app/board.rs` loads a `Board` by id from
//! storage on every request rather than keeping it resident) adapted to an
//! in-process `DashMap` since conflux has no database layer of its own.

use conflux_agents::{FlowDrivenAgent, GeneralAgent, KnowledgeQuerier, SessionHistorySource};
use conflux_kb::{GraphEnhancer, Reranker};
use conflux_model::embedding::EmbeddingProvider;
use conflux_model::llm::LlmProvider;
use conflux_types::ids::AgentName;
use conflux_types::model::{AgentConfig, AgentType};
use conflux_types::{Error, Result};
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct AgentRegistry {
    configs: DashMap<String, AgentConfig>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, config: AgentConfig) {
        self.configs.insert(config.name.as_str().to_string(), config);
    }

    pub fn get(&self, name: &str) -> Option<AgentConfig> {
        self.configs.get(name).map(|c| c.clone())
    }

    pub fn list(&self) -> Vec<AgentConfig> {
        self.configs.iter().map(|e| e.value().clone()).collect()
    }

    pub fn delete(&self, name: &str) -> bool {
        self.configs.remove(name).is_some()
    }
}

pub enum Agent {
    General(GeneralAgent),
    FlowDriven(FlowDrivenAgent),
}

/// Instantiates the agent named by `agent_name`, wiring bound tools/KBs and
/// the knowledge querier seam.
pub fn build_agent(
    registry: &AgentRegistry,
    runtime: Arc<conflux_agents::AgentRuntime>,
    knowledge: Option<Arc<dyn KnowledgeQuerier>>,
    history_source: Option<Arc<dyn SessionHistorySource>>,
    agent_name: &str,
) -> Result<Agent> {
    let config = registry
        .get(agent_name)
        .ok_or_else(|| Error::routing(format!("agent '{agent_name}' not found")))?;

    match config.agent_type {
        AgentType::General | AgentType::Chat => {
            let mut agent = GeneralAgent::new(AgentName::new(config.name.as_str()), runtime)
                .with_bound_tools(config.bound_tools)
                .with_bound_knowledge_bases(config.bound_knowledge_bases);
            if let Some(prompt) = config.system_prompt {
                agent = agent.with_system_prompt(prompt);
            }
            if let Some(knowledge) = knowledge {
                agent = agent.with_knowledge(knowledge);
            }
            if let Some(history_source) = history_source {
                agent = agent.with_history_source(history_source);
            }
            Ok(Agent::General(agent))
        }
        AgentType::FlowDriven => {
            let flow_config = config
                .flow_config
                .ok_or_else(|| Error::config(format!("agent '{agent_name}' has no flow_config")))?;
            let agent = FlowDrivenAgent::new(AgentName::new(config.name.as_str()), flow_config, runtime);
            Ok(Agent::FlowDriven(agent))
        }
    }
}

/// Bridges `conflux-kb`'s retrieval pipeline into the [`KnowledgeQuerier`]
/// seam `GeneralAgent` calls, optionally boosted by
/// `conflux-graph`'s [`GraphEnhancer`] without either crate depending on the
/// other.
pub struct KbQuerier {
    pub kbs: Arc<DashMap<String, Arc<conflux_kb::KbIndex>>>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub llm: Arc<dyn LlmProvider>,
    pub reranker: Option<Arc<dyn Reranker>>,
    pub graph: Option<Arc<dyn GraphEnhancer>>,
    pub config: conflux_kb::RetrievalConfig,
}

#[async_trait::async_trait]
impl KnowledgeQuerier for KbQuerier {
    async fn query(&self, kb_id: &str, query: &str) -> Result<String> {
        let index = self
            .kbs
            .get(kb_id)
            .map(|e| e.clone())
            .ok_or_else(|| Error::routing(format!("knowledge base '{kb_id}' not found")))?;
        let result = conflux_kb::query(
            &index,
            self.embedder.as_ref(),
            self.llm.as_ref(),
            self.reranker.as_deref(),
            self.graph.as_deref(),
            query,
            5,
            &self.config,
        )
        .await?;
        Ok(result.response)
    }
}
