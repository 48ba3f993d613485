//! REST handlers for the line item registry and operational endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use lineitem_core::EngineError;
use lineitem_engine::{
    Creative, CreativeSpec, ImpressionReport, IngestSummary, LineItem, LineItemSpec, QueryResult,
    Registry, RegistryStats,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, warn};

/// Shared state for the key-value endpoints.
#[derive(Clone)]
pub struct KvState {
    pub registry: Arc<Registry>,
    pub node_id: String,
    pub max_batch_size: usize,
    pub start_time: Instant,
}

impl KvState {
    pub fn new(registry: Arc<Registry>, node_id: impl Into<String>) -> Self {
        let max_batch_size = registry.config().max_batch_size;
        Self {
            registry,
            node_id: node_id.into(),
            max_batch_size,
            start_time: Instant::now(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map an engine error onto an HTTP status and JSON body.
pub fn reject(err: EngineError) -> ApiError {
    let status = match &err {
        EngineError::Validation(_) => StatusCode::BAD_REQUEST,
        EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(error = %err, "Request failed");
        metrics::counter!("api.errors").increment(1);
    } else {
        warn!(error = %err, kind = err.kind(), "Request rejected");
        metrics::counter!("api.rejections", "kind" => err.kind()).increment(1);
    }
    (
        status,
        Json(ErrorResponse {
            error: err.kind().to_string(),
            message: err.to_string(),
        }),
    )
}

// ─── Creatives ──────────────────────────────────────────────────────────────

/// POST /api/v1/kv/creatives
pub async fn add_creative(
    State(state): State<KvState>,
    Json(spec): Json<CreativeSpec>,
) -> Result<(StatusCode, Json<Creative>), ApiError> {
    let creative = state.registry.add_creative(spec).map_err(reject)?;
    Ok((StatusCode::CREATED, Json(creative)))
}

/// GET /api/v1/kv/creatives
pub async fn list_creatives(State(state): State<KvState>) -> Json<Vec<Creative>> {
    Json(state.registry.list_creatives())
}

/// GET /api/v1/kv/creatives/:id
pub async fn get_creative(
    State(state): State<KvState>,
    Path(id): Path<u64>,
) -> Result<Json<Creative>, ApiError> {
    state.registry.get_creative(id).map(Json).map_err(reject)
}

// ─── Line items ─────────────────────────────────────────────────────────────

/// POST /api/v1/kv/lineitems
pub async fn add_line_item(
    State(state): State<KvState>,
    Json(spec): Json<LineItemSpec>,
) -> Result<(StatusCode, Json<LineItem>), ApiError> {
    let line_item = state.registry.add_line_item(spec).map_err(reject)?;
    Ok((StatusCode::CREATED, Json(line_item)))
}

/// GET /api/v1/kv/lineitems
pub async fn list_line_items(State(state): State<KvState>) -> Json<Vec<LineItem>> {
    Json(state.registry.list_line_items())
}

/// GET /api/v1/kv/lineitems/:id
pub async fn get_line_item(
    State(state): State<KvState>,
    Path(id): Path<u64>,
) -> Result<Json<LineItem>, ApiError> {
    state.registry.get_line_item(id).map(Json).map_err(reject)
}

#[derive(Debug, Deserialize)]
pub struct PacingParams {
    #[serde(default)]
    pub slot_imps: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PacingResponse {
    pub line_item_id: u64,
    pub slot_imps: u64,
    pub pacing: u64,
}

/// GET /api/v1/kv/lineitems/:id/pacing?slot_imps=N
pub async fn pacing_for_slot(
    State(state): State<KvState>,
    Path(id): Path<u64>,
    Query(params): Query<PacingParams>,
) -> Result<Json<PacingResponse>, ApiError> {
    let pacing = state
        .registry
        .pacing_for_slot(id, params.slot_imps)
        .map_err(reject)?;
    Ok(Json(PacingResponse {
        line_item_id: id,
        slot_imps: params.slot_imps,
        pacing,
    }))
}

// ─── Associations ───────────────────────────────────────────────────────────

/// POST /api/v1/kv/lineitems/:id/creatives/:creative_id
pub async fn link_creative(
    State(state): State<KvState>,
    Path((id, creative_id)): Path<(u64, u64)>,
) -> Result<StatusCode, ApiError> {
    state
        .registry
        .link_creative(id, creative_id)
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/kv/lineitems/:id/creatives/:creative_id
pub async fn unlink_creative(
    State(state): State<KvState>,
    Path((id, creative_id)): Path<(u64, u64)>,
) -> Result<StatusCode, ApiError> {
    state
        .registry
        .unlink_creative(id, creative_id)
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct CreativeBatch {
    pub creative_ids: Vec<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchLinkResponse {
    pub line_item_id: u64,
    pub updated: usize,
}

/// POST /api/v1/kv/lineitems/:id/creatives
pub async fn link_creatives(
    State(state): State<KvState>,
    Path(id): Path<u64>,
    Json(batch): Json<CreativeBatch>,
) -> Result<Json<BatchLinkResponse>, ApiError> {
    let updated = state
        .registry
        .link_creatives(id, &batch.creative_ids)
        .map_err(reject)?;
    Ok(Json(BatchLinkResponse {
        line_item_id: id,
        updated,
    }))
}

/// DELETE /api/v1/kv/lineitems/:id/creatives
pub async fn unlink_creatives(
    State(state): State<KvState>,
    Path(id): Path<u64>,
    Json(batch): Json<CreativeBatch>,
) -> Result<Json<BatchLinkResponse>, ApiError> {
    let updated = state
        .registry
        .unlink_creatives(id, &batch.creative_ids)
        .map_err(reject)?;
    Ok(Json(BatchLinkResponse {
        line_item_id: id,
        updated,
    }))
}

// ─── Targeting & delivery ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct QueryParams {
    #[serde(default)]
    pub key: String,
}

/// GET /api/v1/kv/query?key=device:os:ig
pub async fn query(
    State(state): State<KvState>,
    Query(params): Query<QueryParams>,
) -> Json<QueryResult> {
    Json(state.registry.query(&params.key))
}

/// POST /api/v1/kv/impressions
pub async fn report_impressions(
    State(state): State<KvState>,
    Json(batch): Json<Vec<ImpressionReport>>,
) -> Result<Json<IngestSummary>, ApiError> {
    if batch.len() > state.max_batch_size {
        return Err(reject(EngineError::validation(format!(
            "impression batch of {} exceeds limit of {}",
            batch.len(),
            state.max_batch_size
        ))));
    }
    Ok(Json(state.registry.report_impressions(&batch)))
}

/// POST /api/v1/kv/flush
pub async fn flush(State(state): State<KvState>) -> StatusCode {
    state.registry.flush();
    StatusCode::NO_CONTENT
}

/// GET /api/v1/kv/stats
pub async fn stats(State(state): State<KvState>) -> Json<RegistryStats> {
    Json(state.registry.stats())
}

// ─── Operational ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
    pub line_items: usize,
    pub creatives: usize,
}

/// GET /health
pub async fn health_check(State(state): State<KvState>) -> Json<HealthResponse> {
    let stats = state.registry.stats();
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        line_items: stats.line_items,
        creatives: stats.creatives,
    })
}

/// GET /live
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}
