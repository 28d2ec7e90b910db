//! `/api/tools` CRUD, following the pattern of
//! `packages/api/src/routes/tools.rs` thin list/get/invoke handlers over a
//! process-singleton registry, adapted to the C1 scoring surface this
//! crate describes (`list`, `execute`, `reset_tool_score`).

use axum::extract::{Path as AxumPath, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use conflux_types::model::{ToolInfo, ToolType};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tools))
        .route("/{name}", get(get_tool))
        .route("/{name}/execute", post(execute_tool))
        .route("/{name}/reset_score", post(reset_tool_score))
}

#[derive(Debug, Deserialize)]
pub struct ListToolsQuery {
    #[serde(rename = "type")]
    pub tool_type: Option<String>,
    pub category: Option<String>,
}

fn parse_tool_type(s: &str) -> Option<ToolType> {
    match s {
        "builtin" => Some(ToolType::Builtin),
        "mcp" => Some(ToolType::Mcp),
        "temporary" => Some(ToolType::Temporary),
        _ => None,
    }
}

/// `GET /api/tools?type=&category=`: sorted by score descending.
pub async fn list_tools(State(state): State<AppState>, Query(query): Query<ListToolsQuery>) -> Json<Vec<ToolInfo>> {
    let tools = if let Some(category) = query.category {
        state.tools.list_by_category(&category)
    } else {
        state.tools.list(query.tool_type.as_deref().and_then(parse_tool_type))
    };
    Json(tools)
}

pub async fn get_tool(State(state): State<AppState>, AxumPath(name): AxumPath<String>) -> Result<Json<ToolInfo>, ApiError> {
    state
        .tools
        .list(None)
        .into_iter()
        .find(|t| t.name == name)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("tool '{name}' not found")))
}

pub async fn execute_tool(
    State(state): State<AppState>,
    AxumPath(name): AxumPath<String>,
    Json(params): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, ApiError> {
    Ok(Json(state.tools.execute(&name, params).await?))
}

pub async fn reset_tool_score(State(state): State<AppState>, AxumPath(name): AxumPath<String>) -> Result<Json<serde_json::Value>, ApiError> {
    state.tools.reset_tool_score(&name)?;
    Ok(Json(serde_json::json!({"success": true})))
}
