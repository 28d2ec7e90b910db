//! `POST /api/chat`, `POST /api/chat/stream`, `GET /api/chat/pipeline_state`,
//! and session/message CRUD, following the pattern of
//! `packages/api/src/routes/chat.rs` nesting one route module per resource
//! and `packages/api/src/execution/sse_proxy.rs` for the streaming shape —
//! redesigned to stream from an in-process mpsc receiver instead of
//! proxying a second HTTP hop.

use axum::extract::{Path as AxumPath, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use conflux_flow::Chunk;
use conflux_types::ids::{AgentName, SessionId, UserId};
use conflux_types::model::{Message, MessageType};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

use crate::agent_registry::Agent;
use crate::error::ApiError;
use crate::session_store::SessionStore;
use crate::state::AppState;
use crate::wire::StreamChunk;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(chat))
        .route("/stream", post(chat_stream))
        .route("/pipeline_state", get(pipeline_state))
        .route("/sessions", post(create_session))
        .route("/sessions/{user_id}", get(list_sessions))
        .route("/messages/{session_id}", get(list_messages))
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub user_id: String,
    pub message: String,
    pub session_id: Option<String>,
    pub agent_name: String,
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub success: bool,
    pub message: String,
    pub agent_name: String,
    pub tools_used: Vec<String>,
    pub timestamp: i64,
    pub pipeline_context: serde_json::Value,
}

/// Drives one agent turn: persists the user message, restores the pipeline,
/// instantiates the agent, and hands back its chunk stream together with
/// the session so the caller can persist the assistant message afterwards.
async fn start_turn(
    state: &AppState,
    req: &ChatRequest,
) -> Result<(conflux_types::model::Session, UnboundedReceiver<Chunk>, conflux_types::ids::MessageId), ApiError> {
    let user_id = UserId::new(req.user_id.clone());
    let session_id = req.session_id.clone().map(SessionId::new);
    let agent_id = AgentName::new(req.agent_name.clone());

    let session = state
        .sessions
        .find_or_create(&user_id, session_id, Some(agent_id.clone()))
        .await?;

    let user_message = Message::new(session.session_id.clone(), user_id.clone(), MessageType::User, req.message.clone());
    state.sessions.append_message(&user_message).await?;

    state.restore_pipeline_once(agent_id.as_str(), user_id.as_str(), session.session_id.as_str()).await;

    let mut context = req.context.clone();
    context.insert("user_id".to_string(), serde_json::json!(user_id.as_str()));
    context.insert("session_id".to_string(), serde_json::json!(session.session_id.as_str()));
    context.insert("agent_name".to_string(), serde_json::json!(agent_id.as_str()));

    let knowledge = state.kb_querier();
    let history_source = state.history_source();
    let agent = crate::agent_registry::build_agent(&state.agents, state.runtime.clone(), Some(knowledge), Some(history_source), &req.agent_name)?;

    let assistant_message_id = conflux_types::ids::MessageId::generate();
    let rx = match agent {
        Agent::General(agent) => agent.process_message_stream(user_id.as_str(), &req.message, &context).await?,
        Agent::FlowDriven(agent) => {
            let sink: Arc<dyn conflux_agents::flow_driven::MessageNodeSink> =
                Arc::new(MessageNodePersister { sessions: state.sessions.clone() });
            let agent = agent.with_message_node_sink(sink);
            agent
                .process_message_stream(user_id.as_str(), &req.message, &context, assistant_message_id.clone(), Some(session.session_id.as_str()))
                .await?
        }
    };

    Ok((session, rx, assistant_message_id))
}

struct MessageNodePersister {
    sessions: Arc<SessionStore>,
}

#[async_trait::async_trait]
impl conflux_agents::flow_driven::MessageNodeSink for MessageNodePersister {
    async fn record(&self, node: conflux_types::model::MessageNode) {
        if let Err(err) = self.sessions.append_message_node(&node).await {
            tracing::warn!(%err, "failed to persist message node");
        }
    }
}

/// `POST /api/chat`: buffers the full stream into one non-streaming
/// response.
pub async fn chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Result<Json<ChatResponse>, ApiError> {
    let (session, mut rx, assistant_message_id) = start_turn(&state, &req).await?;

    let mut final_text = String::new();
    let mut tools_used = Vec::new();
    while let Some(chunk) = rx.recv().await {
        match &chunk {
            Chunk::Final { content, .. } => {
                final_text = match content {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
            }
            Chunk::Done { tools_used: used } => tools_used = used.clone(),
            other => other.accumulate_text(&mut final_text),
        }
    }

    let mut assistant_message = Message::new(session.session_id.clone(), session.user_id.clone(), MessageType::Assistant, final_text.clone());
    assistant_message.message_id = assistant_message_id;
    assistant_message.agent_name = Some(AgentName::new(req.agent_name.clone()));
    if let Err(err) = state.sessions.append_message(&assistant_message).await {
        tracing::warn!(%err, "failed to persist assistant message");
    }
    state.save_pipeline(&req.agent_name, &req.user_id, session.session_id.as_str()).await;

    let pipeline_context = state
        .runtime
        .with_pipeline(&req.agent_name, &req.user_id, |p| serde_json::to_value(p.export_for_frontend()))
        .unwrap_or(serde_json::Value::Null);

    Ok(Json(ChatResponse {
        success: true,
        message: final_text,
        agent_name: req.agent_name,
        tools_used,
        timestamp: conflux_types::now_millis(),
        pipeline_context,
    }))
}

/// `POST /api/chat/stream`: `text/event-stream`, each event `data: {json}`
/// per .
pub async fn chat_stream(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let (session, rx, assistant_message_id) = start_turn(&state, &req).await?;

    let session_id = session.session_id.clone();
    let agent_name = req.agent_name.clone();

    // Tee every chunk to a side channel so persistence can run once the
    // stream drains, mirroring `sse_proxy` persisting on its
    // "completed" event rather than blocking the response on it.
    let (persist_tx, mut persist_rx) = mpsc::unbounded_channel::<Chunk>();
    let stream = UnboundedReceiverStream::new(rx).map(move |chunk| {
        let _ = persist_tx.send(chunk.clone());
        let wire = StreamChunk::from_chunk(&chunk, session_id.as_str(), &agent_name);
        Ok(wire.to_sse_event())
    });

    let persist_state = state.clone();
    let persist_req = req;
    let persist_session_id = session.session_id.clone();
    let persist_user = session.user_id.clone();
    tokio::spawn(async move {
        let mut final_text = String::new();
        while let Some(chunk) = persist_rx.recv().await {
            match &chunk {
                Chunk::Final { content, .. } => {
                    final_text = match content {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                }
                other => other.accumulate_text(&mut final_text),
            }
        }

        let mut assistant_message = Message::new(persist_session_id.clone(), persist_user, MessageType::Assistant, final_text);
        assistant_message.message_id = assistant_message_id;
        assistant_message.agent_name = Some(AgentName::new(persist_req.agent_name.clone()));
        if let Err(err) = persist_state.sessions.append_message(&assistant_message).await {
            tracing::warn!(%err, "failed to persist assistant message");
        }
        persist_state.save_pipeline(&persist_req.agent_name, &persist_req.user_id, persist_session_id.as_str()).await;
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

#[derive(Debug, Deserialize)]
pub struct PipelineStateQuery {
    pub user_id: String,
    pub agent_name: String,
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct PipelineStateResponse {
    pub success: bool,
    pub pipeline_context: serde_json::Value,
}

pub async fn pipeline_state(State(state): State<AppState>, Query(query): Query<PipelineStateQuery>) -> Result<Json<PipelineStateResponse>, ApiError> {
    state.restore_pipeline_once(&query.agent_name, &query.user_id, &query.session_id).await;
    let pipeline_context = state
        .runtime
        .with_pipeline(&query.agent_name, &query.user_id, |p| serde_json::to_value(p.export_for_frontend()))
        .unwrap_or(serde_json::Value::Null);
    Ok(Json(PipelineStateResponse { success: true, pipeline_context }))
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub user_id: String,
    #[serde(default)]
    pub session_name: Option<String>,
    pub agent_id: Option<String>,
}

pub async fn create_session(State(state): State<AppState>, Json(req): Json<CreateSessionRequest>) -> Result<Json<conflux_types::model::Session>, ApiError> {
    let session = state
        .sessions
        .create_session(UserId::new(req.user_id), req.agent_id.map(AgentName::new))
        .await?;
    let _ = req.session_name;
    Ok(Json(session))
}

pub async fn list_sessions(State(state): State<AppState>, AxumPath(user_id): AxumPath<String>) -> Result<Json<Vec<conflux_types::model::Session>>, ApiError> {
    Ok(Json(state.sessions.list_sessions(&user_id).await?))
}

pub async fn list_messages(State(state): State<AppState>, AxumPath(session_id): AxumPath<String>) -> Result<Json<Vec<Message>>, ApiError> {
    Ok(Json(state.sessions.list_messages(&session_id).await?))
}
