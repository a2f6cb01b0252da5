//! Segment and activity REST handlers.

use crate::rest::{bad_request, error_body, internal_error, not_found, ApiResult, AppState};
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use crm_core::types::{Activity, ActivityAction, NewSegment, Rule};
use crm_reporting::ExportOutcome;
use crm_segmentation::{compile, SegmentSummary};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

/// Size of the activity feed returned by `GET /api/activities`.
pub const RECENT_ACTIVITY_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    #[serde(default)]
    pub rules: Vec<Rule>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PreviewResponse {
    pub count: u64,
    pub valid_rules: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
}

// ─── Segments ──────────────────────────────────────────────────────────────

pub async fn list_segments(State(state): State<AppState>) -> ApiResult<Json<Vec<SegmentSummary>>> {
    let segments = state
        .segments
        .list_segments()
        .await
        .map_err(|e| internal_error("list_segments", e))?;

    let mut summaries = Vec::with_capacity(segments.len());
    for segment in segments {
        let summary = state
            .evaluator
            .summarize(segment)
            .await
            .map_err(|e| internal_error("list_segments", e))?;
        summaries.push(summary);
    }
    Ok(Json(summaries))
}

pub async fn create_segment(
    State(state): State<AppState>,
    Json(mut req): Json<NewSegment>,
) -> ApiResult<(StatusCode, Json<SegmentSummary>)> {
    req.name = req.name.trim().to_string();
    if req.name.is_empty() {
        return Err(bad_request("Segment name is required"));
    }

    let segment = state
        .segments
        .create_segment(req)
        .await
        .map_err(|e| internal_error("create_segment", e))?;
    metrics::counter!("segments.created").increment(1);
    info!(segment_id = segment.id, name = %segment.name, "Segment created");

    state
        .recorder
        .record(
            ActivityAction::SegmentCreated,
            segment.name.clone(),
            json!({ "segment_id": segment.id, "rules": segment.rules().len() }),
        )
        .await;

    let summary = state
        .evaluator
        .summarize(segment)
        .await
        .map_err(|e| internal_error("create_segment", e))?;
    Ok((StatusCode::CREATED, Json(summary)))
}

pub async fn delete_segment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<DeleteResponse>> {
    let segment = state
        .segments
        .get_segment(id)
        .await
        .map_err(|e| internal_error("delete_segment", e))?
        .ok_or_else(|| not_found("segment", id))?;

    let removed = state
        .segments
        .delete_segment(id)
        .await
        .map_err(|e| internal_error("delete_segment", e))?;
    if !removed {
        return Err(not_found("segment", id));
    }
    metrics::counter!("segments.deleted").increment(1);
    info!(segment_id = id, "Segment deleted");

    state
        .recorder
        .record(
            ActivityAction::SegmentDeleted,
            segment.name,
            json!({ "segment_id": id }),
        )
        .await;

    Ok(Json(DeleteResponse { success: true }))
}

/// Live count for an unsaved rule set.
pub async fn preview_segment(
    State(state): State<AppState>,
    Json(req): Json<PreviewRequest>,
) -> ApiResult<Json<PreviewResponse>> {
    let predicate = compile(&req.rules);
    let count = state
        .evaluator
        .count_compiled(&predicate)
        .await
        .map_err(|e| internal_error("preview_segment", e))?;
    Ok(Json(PreviewResponse {
        count,
        valid_rules: predicate.conditions().len(),
    }))
}

pub async fn export_segment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    let segment = state
        .segments
        .get_segment(id)
        .await
        .map_err(|e| internal_error("export_segment", e))?
        .ok_or_else(|| not_found("segment", id))?;

    let outcome = state
        .exporter
        .export(&segment)
        .await
        .map_err(|e| internal_error("export_segment", e))?;

    let export = match outcome {
        ExportOutcome::Ready(export) => export,
        ExportOutcome::NoValidRules => {
            return Err(error_body(
                StatusCode::UNPROCESSABLE_ENTITY,
                "no_valid_rules",
                "Segment has no valid rules to export",
            ))
        }
        ExportOutcome::NoMatches => {
            return Err(error_body(
                StatusCode::NOT_FOUND,
                "no_matching_records",
                "No customers match this segment",
            ))
        }
    };
    metrics::counter!("segments.exported").increment(1);

    state
        .recorder
        .record(
            ActivityAction::SegmentExported,
            segment.name.clone(),
            json!({ "segment_id": id, "rows": export.row_count }),
        )
        .await;

    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/csv; charset=utf-8"),
            ),
            (header::CONTENT_DISPOSITION, attachment(&export.filename)),
        ],
        export.csv,
    )
        .into_response())
}

/// `Content-Disposition` for a download. Names that are not plain ASCII get
/// an underscore-substituted `filename` plus an RFC 5987 `filename*`.
fn attachment(filename: &str) -> HeaderValue {
    let ascii: String = filename
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() || c == ' ') && !matches!(c, '"' | '\\') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let value = if ascii == filename {
        format!("attachment; filename=\"{ascii}\"")
    } else {
        format!(
            "attachment; filename=\"{ascii}\"; filename*=UTF-8''{}",
            urlencoding::encode(filename)
        )
    };
    HeaderValue::from_str(&value)
        .unwrap_or_else(|_| HeaderValue::from_static("attachment; filename=\"segment_customers.csv\""))
}

// ─── Activity feed ─────────────────────────────────────────────────────────

pub async fn list_activities(State(state): State<AppState>) -> ApiResult<Json<Vec<Activity>>> {
    state
        .activities
        .recent(RECENT_ACTIVITY_LIMIT)
        .await
        .map(Json)
        .map_err(|e| internal_error("list_activities", e))
}
