//! `/api/mcp` CRUD, following the pattern of
//! `packages/api/src/routes/mcp.rs` server-registration + tool-invocation
//! handlers, thinned to the surface this crate actually needs
//! (`get_available_services`, `get_tools`, `call_tool`).

use axum::extract::{Path as AxumPath, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use conflux_mcp::McpServerConfig;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/servers", get(list_servers).post(register_server))
        .route("/servers/{name}/tools", get(list_tools))
        .route("/servers/{name}/call/{tool}", post(call_tool))
}

pub async fn list_servers(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.mcp.get_available_services())
}

pub async fn register_server(State(state): State<AppState>, Json(config): Json<McpServerConfig>) -> Json<serde_json::Value> {
    state.mcp.register_server(config);
    Json(serde_json::json!({"success": true}))
}

pub async fn list_tools(State(state): State<AppState>, AxumPath(name): AxumPath<String>) -> Result<Json<Vec<conflux_mcp::ToolDescriptor>>, ApiError> {
    Ok(Json(state.mcp.get_tools(&name).await?))
}

#[derive(Debug, Deserialize)]
pub struct CallToolRequest {
    #[serde(default)]
    pub arguments: Value,
}

pub async fn call_tool(
    State(state): State<AppState>,
    AxumPath((name, tool)): AxumPath<(String, String)>,
    Json(req): Json<CallToolRequest>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.mcp.call_tool(&name, &tool, req.arguments).await?))
}
