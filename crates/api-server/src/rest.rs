//! Shared handler state, error bodies, and operational endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use crm_core::config::AppConfig;
use crm_core::CrmError;
use crm_reporting::{CsvExporter, SegmentExporter};
use crm_segmentation::SegmentEvaluator;
use crm_store::{ActivityLog, ActivityRecorder, SegmentStore, StoreHandles};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::error;

/// User name attached to activity entries; authentication lives outside
/// this service.
const ACTIVITY_USER: &str = "admin";

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub segments: Arc<dyn SegmentStore>,
    pub activities: Arc<dyn ActivityLog>,
    pub evaluator: SegmentEvaluator,
    pub exporter: SegmentExporter,
    pub recorder: ActivityRecorder,
    pub node_id: String,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: &AppConfig, stores: StoreHandles) -> Self {
        let evaluator = SegmentEvaluator::new(stores.records.clone());
        let exporter = SegmentExporter::new(
            evaluator.clone(),
            CsvExporter::new(config.export.tag_delimiter.clone()),
        );
        Self {
            segments: stores.segments,
            recorder: ActivityRecorder::new(stores.activities.clone(), ACTIVITY_USER),
            activities: stores.activities,
            evaluator,
            exporter,
            node_id: config.node_id.clone(),
            start_time: Instant::now(),
        }
    }
}

pub type ApiResult<T> = Result<T, (StatusCode, Json<ErrorResponse>)>;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
}

pub(crate) fn error_body(
    status: StatusCode,
    error: &str,
    message: impl Into<String>,
) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message: message.into(),
        }),
    )
}

/// Log the real failure, answer with a generic message.
pub(crate) fn internal_error(context: &str, err: CrmError) -> (StatusCode, Json<ErrorResponse>) {
    error!(error = %err, context, "Request failed");
    metrics::counter!("api.errors").increment(1);
    error_body(StatusCode::INTERNAL_SERVER_ERROR, err.code(), "Server Error")
}

pub(crate) fn not_found(resource: &'static str, id: i64) -> (StatusCode, Json<ErrorResponse>) {
    let err = CrmError::NotFound { resource, id };
    error_body(StatusCode::NOT_FOUND, err.code(), err.to_string())
}

pub(crate) fn bad_request(message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    error_body(StatusCode::BAD_REQUEST, "invalid_request", message)
}

/// GET /health: Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /ready: Readiness probe. Ready once the segment store answers.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.segments.list_segments().await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            error!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// GET /live: Liveness probe.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}
