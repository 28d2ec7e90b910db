//! `/api/knowledge_base` CRUD and query, following the
//! `packages/api/src/routes/storage.rs` upload-then-process
//! handler shape, driving the C7 ingestion pipeline (chunk → embed →
//! optional domain classify/summarize → optional C8 triple extraction) and
//! the C7 `query` entry point plus C8's entity/multi-hop query surface.

use axum::extract::{Path as AxumPath, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use conflux_kb::{ChunkParams, KbIndex};
use conflux_types::ids::{ChunkId, DocumentId, KnowledgeBaseId};
use conflux_types::model::{Chunk, DocumentStatus, ExtractionStatus, KbDocument, Triple};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_kb))
        .route("/{kb_id}/documents", get(list_documents).post(ingest_document))
        .route("/{kb_id}/documents/{document_id}", get(get_document))
        .route("/{kb_id}/query", post(query_kb))
        .route("/{kb_id}/graph/entities", get(query_entities))
        .route("/{kb_id}/graph/multi_hop", get(multi_hop))
}

#[derive(Debug, Deserialize)]
pub struct CreateKbRequest {
    #[serde(default)]
    pub knowledge_base_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateKbResponse {
    pub knowledge_base_id: String,
}

/// `POST /api/knowledge_base`: registers an empty index for a (possibly
/// caller-chosen) knowledge base id.
pub async fn create_kb(State(state): State<AppState>, Json(req): Json<CreateKbRequest>) -> Json<CreateKbResponse> {
    let kb_id = KnowledgeBaseId::new(req.knowledge_base_id.unwrap_or_else(conflux_types::create_id));
    state.kbs.entry(kb_id.as_str().to_string()).or_insert_with(|| Arc::new(KbIndex::new(kb_id.clone())));
    Json(CreateKbResponse { knowledge_base_id: kb_id.as_str().to_string() })
}

#[derive(Debug, Deserialize)]
pub struct IngestDocumentRequest {
    pub name: String,
    pub file_type: String,
    pub content: String,
    #[serde(default)]
    pub extract_triples: bool,
}

fn index_for(state: &AppState, kb_id: &str) -> Result<Arc<KbIndex>, ApiError> {
    state
        .kbs
        .get(kb_id)
        .map(|e| e.clone())
        .ok_or_else(|| ApiError::not_found(format!("knowledge base '{kb_id}' not found")))
}

/// `POST /api/knowledge_base/{kb_id}/documents`: chunks, embeds, optionally
/// domain-classifies and summarizes, and optionally runs C8 triple
/// extraction over each chunk.
pub async fn ingest_document(
    State(state): State<AppState>,
    AxumPath(kb_id): AxumPath<String>,
    Json(req): Json<IngestDocumentRequest>,
) -> Result<Json<KbDocument>, ApiError> {
    let index = index_for(&state, &kb_id)?;
    let kb_id = KnowledgeBaseId::new(kb_id);
    let document_id = DocumentId::generate();

    let mut document = KbDocument {
        id: document_id.clone(),
        knowledge_base_id: kb_id.clone(),
        name: req.name,
        file_type: req.file_type,
        content: req.content.clone(),
        status: DocumentStatus::Processing,
        extraction_status: ExtractionStatus::NotStarted,
    };

    let strategy = state.retrieval_config.chunk_strategy;
    let params = ChunkParams::default();
    let raw_chunks = conflux_kb::chunk_document(&req.content, strategy, &params);

    let texts: Vec<String> = raw_chunks.iter().map(|c| c.content.clone()).collect();
    let sample: Vec<String> = texts.iter().take(5).cloned().collect();
    let domain = Some(
        conflux_kb::domain::classify_document(state.llm.as_ref(), &sample, state.retrieval_config.domain_classify_enabled).await,
    );
    let embeddings = state.embedder.embed_batch(&texts).await?;

    let mut stored_chunks = Vec::with_capacity(raw_chunks.len());
    for (idx, (raw, embedding)) in raw_chunks.into_iter().zip(embeddings).enumerate() {
        let chunk = Chunk {
            id: ChunkId::generate(),
            document_id: document_id.clone(),
            knowledge_base_id: kb_id.clone(),
            chunk_index: idx,
            content: raw.content,
            embedding,
            chunk_metadata: raw.metadata,
            chunk_strategy: format!("{strategy:?}").to_lowercase(),
            strategy_variant: None,
            domain: domain.as_ref().map(|(label, _)| label.clone()),
            domain_confidence: domain.as_ref().map(|(_, conf)| *conf),
            is_summary: false,
            summary_parent_chunk_id: None,
        };
        index.add_chunk(chunk.clone());
        stored_chunks.push(chunk);
    }

    document.status = DocumentStatus::Chunked;
    if req.extract_triples && state.graph_config.enabled {
        document.extraction_status = ExtractionStatus::Running;
    }
    index.documents.insert(document_id.as_str().to_string(), document.clone());

    if req.extract_triples && state.graph_config.enabled {
        let extraction_state = state.clone();
        let index_bg = index.clone();
        let kb_id_bg = kb_id.clone();
        let document_id_bg = document_id.clone();
        let chunks_bg = stored_chunks;
        tokio::spawn(async move {
            let extractor = conflux_graph::RuleEntityExtractor;
            let mut total = 0usize;
            for chunk in &chunks_bg {
                total += conflux_graph::ingest_chunk(
                    &extraction_state.graph,
                    &extraction_state.analysis_cache,
                    extraction_state.llm.as_ref(),
                    Some(&extractor),
                    &extraction_state.graph_config,
                    &kb_id_bg,
                    &document_id_bg,
                    Some(&chunk.id),
                    &chunk.content,
                )
                .await;
            }
            if let Some(mut entry) = index_bg.documents.get_mut(document_id_bg.as_str()) {
                entry.extraction_status = ExtractionStatus::Done;
            }
            tracing::info!(document_id = %document_id_bg, triples = total, "triple extraction complete");
        });
    }

    Ok(Json(document))
}

pub async fn list_documents(State(state): State<AppState>, AxumPath(kb_id): AxumPath<String>) -> Result<Json<Vec<KbDocument>>, ApiError> {
    let index = index_for(&state, &kb_id)?;
    Ok(Json(index.documents.iter().map(|e| e.value().clone()).collect()))
}

pub async fn get_document(
    State(state): State<AppState>,
    AxumPath((kb_id, document_id)): AxumPath<(String, String)>,
) -> Result<Json<KbDocument>, ApiError> {
    let index = index_for(&state, &kb_id)?;
    index
        .documents
        .get(&document_id)
        .map(|e| Json(e.value().clone()))
        .ok_or_else(|| ApiError::not_found(format!("document '{document_id}' not found")))
}

#[derive(Debug, Deserialize)]
pub struct QueryKbRequest {
    pub query: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_max_results() -> usize {
    5
}

pub async fn query_kb(
    State(state): State<AppState>,
    AxumPath(kb_id): AxumPath<String>,
    Json(req): Json<QueryKbRequest>,
) -> Result<Json<conflux_kb::RetrievalResult>, ApiError> {
    let index = index_for(&state, &kb_id)?;
    let graph: Option<Arc<dyn conflux_kb::GraphEnhancer>> =
        Some(Arc::new(conflux_graph::KnowledgeGraphEnhancer::new(state.graph.clone())));
    let result = conflux_kb::query(
        &index,
        state.embedder.as_ref(),
        state.llm.as_ref(),
        state.reranker.as_deref(),
        graph.as_deref(),
        &req.query,
        req.max_results,
        &state.retrieval_config,
    )
    .await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct EntityQuery {
    pub entity: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    20
}

pub async fn query_entities(
    State(state): State<AppState>,
    AxumPath(kb_id): AxumPath<String>,
    Query(q): Query<EntityQuery>,
) -> Json<Vec<Triple>> {
    let kb_id = KnowledgeBaseId::new(kb_id);
    Json(state.graph.query_entities(&kb_id, &q.entity, q.limit))
}

#[derive(Debug, Deserialize)]
pub struct MultiHopQuery {
    pub query: String,
    #[serde(default)]
    pub max_hops: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HopTriple {
    #[serde(flatten)]
    pub triple: Triple,
    pub hop: usize,
}

pub async fn multi_hop(
    State(state): State<AppState>,
    AxumPath(kb_id): AxumPath<String>,
    Query(q): Query<MultiHopQuery>,
) -> Json<Vec<HopTriple>> {
    let kb_id = KnowledgeBaseId::new(kb_id);
    let max_hops = q.max_hops.unwrap_or(state.graph_config.max_hops);
    let hits = state.graph.multi_hop_query(&kb_id, &q.query, max_hops);
    Json(hits.into_iter().map(|(triple, hop)| HopTriple { triple, hop }).collect())
}
