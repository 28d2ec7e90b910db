//! The C9 Chat API Surface: request entry, SSE emission, and persistence of
//! messages and pipeline state, following the pattern of
//! `packages/api` crate — `construct_router` composing one `Router` per
//! resource, `error::ApiError` as the uniform `IntoResponse`, and a single
//! `AppState` handed to every handler via axum's `State` extractor.
//!
//! Unlike here, there is no second HTTP hop to an external executor
//! service: the Flow Engine (`conflux-flow`) and agents (`conflux-agents`)
//! run in-process, so streaming goes straight from an internal
//! `tokio::sync::mpsc` receiver to an SSE body (see [`wire`]) instead of
//! proxying an upstream `text/event-stream` response the way the
//! `execution::sse_proxy` does.

pub mod agent_registry;
pub mod error;
pub mod routes;
pub mod session_store;
pub mod state;
pub mod wire;

pub use error::ApiError;
pub use state::AppState;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Builds the full router, mirroring `construct_router`
/// nesting pattern (`packages/api/src/lib.rs`).
pub fn construct_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/chat", routes::chat::routes())
        .nest("/api/mcp", routes::mcp::routes())
        .nest("/api/knowledge_base", routes::kb::routes())
        .nest("/api/flows", routes::flows::routes())
        .nest("/api/tools", routes::tools::routes())
        .route("/health", axum::routing::get(|| async { "ok" }))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
