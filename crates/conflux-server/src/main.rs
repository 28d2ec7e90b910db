//! Process entrypoint, following the pattern of
//! `apps/backend/local/runtime/src/main.rs`: dotenv, `tracing_subscriber`
//! registry init, env-driven config, wire every subsystem into one
//! [`conflux_api::AppState`], serve with `axum::serve`.

mod config;

use conflux_api::AppState;
use conflux_model::mock::{MockEmbeddingProvider, MockLlmProvider};
use conflux_storage::ConfluxStore;
use conflux_tools::{InMemoryScoreStore, ToolRegistry};
use conflux_types::ids::AgentName;
use conflux_types::model::{AgentConfig, AgentType};
use dotenv::dotenv;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("starting conflux");

    // Links in every `register_flow_node!`/`register_builtin_tool!` static
    // registration, mirroring `conflux_tools::discover_builtins`'s own
    // linkage requirement.
    conflux_flow::ensure_nodes_linked();

    let config = config::Config::from_env()?;
    tracing::info!(port = config.port, data_dir = ?config.data_dir, "loaded configuration");

    let object_store = match &config.data_dir {
        Some(dir) => ConfluxStore::local(dir)?,
        None => ConfluxStore::in_memory(),
    };

    let tools = Arc::new(ToolRegistry::new(Arc::new(InMemoryScoreStore::new())));
    for tool in conflux_tools::discover_builtins() {
        tools.register(tool, conflux_types::model::ToolType::Builtin);
    }

    let mcp = Arc::new(conflux_mcp::McpHelper::new());

    let llm = Arc::new(MockLlmProvider::new());
    let embedder = Arc::new(MockEmbeddingProvider::default());
    let reranker: Option<Arc<dyn conflux_kb::Reranker>> = Some(Arc::new(conflux_kb::PassthroughReranker));

    let graph_config = conflux_graph::GraphConfig::from_env();
    let retrieval_config = conflux_kb::RetrievalConfig::from_env();

    let state = AppState::new(tools, mcp, llm, embedder, reranker, graph_config, retrieval_config, object_store);

    // A single general-purpose agent so a fresh process answers `/api/chat`
    // out of the box; operators register real agents via `/api/flows`.
    state.agents.upsert(AgentConfig {
        name: AgentName::new("default"),
        agent_type: AgentType::General,
        system_prompt: Some("You are a helpful assistant.".to_string()),
        bound_tools: Vec::new(),
        bound_knowledge_bases: Vec::new(),
        flow_config: None,
        llm_config_id: None,
    });

    let app = conflux_api::construct_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(%addr, "conflux listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
