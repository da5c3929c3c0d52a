//! Route handlers.
//!
//! Bodies are read as raw bytes and decoded here so every malformed
//! request maps onto the endpoint's own 400 response.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, warn};

use sipdrain_coordinator::{CompletionRequest, DrainOutcome, FailureReason, ScaleInRequest};

use crate::ApiState;

fn error_response(message: &str, status: StatusCode) -> Response {
    (status, Json(json!({"status": "error", "reason": message}))).into_response()
}

// ── Scale-in trigger ───────────────────────────────────────────

/// Scale-in notification as delivered by the platform: either flat, or
/// wrapped in an event envelope under `detail`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScaleInEvent {
    #[serde(default, alias = "clusterId")]
    cluster_arn: Option<String>,
    #[serde(default, alias = "taskId")]
    task_arn: Option<String>,
    #[serde(default)]
    detail: Option<Box<ScaleInEvent>>,
}

impl ScaleInEvent {
    fn into_request(self) -> Option<ScaleInRequest> {
        let (cluster, task) = match self.detail {
            Some(detail) => (
                self.cluster_arn.or(detail.cluster_arn),
                self.task_arn.or(detail.task_arn),
            ),
            None => (self.cluster_arn, self.task_arn),
        };
        match (cluster, task) {
            (Some(cluster_arn), Some(task_arn))
                if !cluster_arn.is_empty() && !task_arn.is_empty() =>
            {
                Some(ScaleInRequest {
                    cluster_arn,
                    task_arn,
                })
            }
            _ => None,
        }
    }
}

/// POST /api/v1/scale-in
pub async fn scale_in(State(state): State<ApiState>, body: Bytes) -> Response {
    let request = serde_json::from_slice::<ScaleInEvent>(&body)
        .ok()
        .and_then(ScaleInEvent::into_request);
    let Some(request) = request else {
        warn!("scale-in request without cluster and task identifiers");
        return error_response("missing_identifiers", StatusCode::BAD_REQUEST);
    };

    match state.initiator.handle(&request).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        // Already logged and counted by the initiator.
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(DrainOutcome::failed(FailureReason::UnexpectedError)),
        )
            .into_response(),
    }
}

// ── Completion callback ────────────────────────────────────────

/// POST /api/v1/drain/complete
pub async fn drain_complete(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    // An undecodable body is treated as empty so credentials are checked first.
    let request: CompletionRequest = serde_json::from_slice(&body).unwrap_or_default();

    let outcome = state.completion.handle(authorization, &request).await;
    let status =
        StatusCode::from_u16(outcome.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(outcome)).into_response()
}

// ── Inspection ─────────────────────────────────────────────────

/// GET /api/v1/tasks/{taskArn}
pub async fn get_task(State(state): State<ApiState>, Path(task_arn): Path<String>) -> Response {
    match state.store.get(&task_arn) {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => error_response("not_found", StatusCode::NOT_FOUND),
        Err(e) => {
            error!(task = %task_arn, error = %e, "failed to read drain record");
            error_response("unexpected_error", StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRequest {
    #[serde(alias = "clusterId")]
    pub cluster_arn: String,
    pub service_arn: String,
}

/// POST /api/v1/candidates
pub async fn select_candidate(State(state): State<ApiState>, body: Bytes) -> Response {
    let Ok(request) = serde_json::from_slice::<CandidateRequest>(&body) else {
        return error_response("missing_identifiers", StatusCode::BAD_REQUEST);
    };

    match sipdrain_coordinator::select_candidate(
        state.control_plane.as_ref(),
        &state.store,
        &request.cluster_arn,
        &request.service_arn,
    )
    .await
    {
        Ok(candidate) => {
            debug!(service = %request.service_arn, found = candidate.is_some(), "candidate lookup");
            Json(json!({"candidate": candidate})).into_response()
        }
        Err(e) => {
            error!(service = %request.service_arn, error = %e, "candidate selection failed");
            error_response("unexpected_error", StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// ── Prometheus ─────────────────────────────────────────────────

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let body = sipdrain_metrics::render_prometheus(&state.metrics.series());
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}
