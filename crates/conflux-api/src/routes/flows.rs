//! `/api/flows` CRUD, following the pattern of
//! `packages/api/src/routes/app/board.rs` create/get/list/delete handlers
//! over a versioned board.
//!
//! This crate models a flow graph only as `AgentConfig.flow_config`, not as
//! a standalone entity with its own id — this surface is the CRUD for that
//! `AgentConfig` (general, flow_driven, or chat), the same registry
//! `routes::chat` reads from to build a live agent. A `/validate` endpoint
//! additionally exercises the C4 graph builder (start/end synthesis, edge
//! inference) without running it, so a flow editor can check a graph is
//! well-formed before binding it to an agent.

use axum::extract::{Path as AxumPath, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use conflux_flow::Graph;
use conflux_types::model::{AgentConfig, FlowConfig};
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_agents).post(upsert_agent))
        .route("/{name}", get(get_agent).delete(delete_agent))
        .route("/validate", post(validate_flow))
}

pub async fn list_agents(State(state): State<AppState>) -> Json<Vec<AgentConfig>> {
    Json(state.agents.list())
}

pub async fn upsert_agent(State(state): State<AppState>, Json(config): Json<AgentConfig>) -> Json<AgentConfig> {
    state.agents.upsert(config.clone());
    Json(config)
}

pub async fn get_agent(State(state): State<AppState>, AxumPath(name): AxumPath<String>) -> Result<Json<AgentConfig>, ApiError> {
    state.agents.get(&name).map(Json).ok_or_else(|| ApiError::not_found(format!("agent '{name}' not found")))
}

pub async fn delete_agent(State(state): State<AppState>, AxumPath(name): AxumPath<String>) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.agents.delete(&name) {
        return Err(ApiError::not_found(format!("agent '{name}' not found")));
    }
    Ok(Json(serde_json::json!({"success": true})))
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub success: bool,
    pub start_node_id: String,
    pub node_count: usize,
    pub synthesized_start: bool,
    pub synthesized_end: bool,
}

/// Builds a [`Graph`] from the posted config without executing it, surfacing
/// the same start/end inference and adjacency-construction logic
/// `Engine::build_from_config` runs.
pub async fn validate_flow(Json(config): Json<FlowConfig>) -> Json<ValidateResponse> {
    let had_start = config.nodes.iter().any(|n| is_start(n));
    let had_end = config.nodes.iter().any(|n| is_end(n));
    let node_count_before = config.nodes.len();
    let graph = Graph::build_from_config(config, None);
    Json(ValidateResponse {
        success: true,
        start_node_id: graph.start_node_id.clone(),
        node_count: graph.nodes.len(),
        synthesized_start: !had_start,
        synthesized_end: !had_end && graph.nodes.len() > node_count_before,
    })
}

fn is_start(node: &conflux_types::model::NodeCfg) -> bool {
    node.data.is_start_node.unwrap_or(false)
        || node.category.as_deref() == Some("start")
        || node.implementation.as_deref() == Some("start")
}

fn is_end(node: &conflux_types::model::NodeCfg) -> bool {
    node.data.is_end_node.unwrap_or(false)
        || node.category.as_deref() == Some("end")
        || node.implementation.as_deref() == Some("end")
}
