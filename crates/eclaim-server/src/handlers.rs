use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use eclaim_core::SubmissionRequest;
use eclaim_storage::{AuditError, AuditStage, StageRecord};
use eclaim_transport::SubmissionError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::server::AppState;

const DEFAULT_LIST_LIMIT: usize = 50;
const MAX_LIST_LIMIT: usize = 500;

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    status: &'a str,
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

/// Facility identity and the (masked) clearinghouse connection in use.
pub async fn settings(State(state): State<AppState>) -> impl IntoResponse {
    let body = json!({
        "service": "eclaim",
        "version": env!("CARGO_PKG_VERSION"),
        "facility": state.submitter.facility(),
        "clearinghouse": {
            "endpoint": state.submitter.endpoint(),
            "credentials": state.credentials.masked(),
        },
    });
    (StatusCode::OK, Json(body))
}

pub async fn submit_medical_record(State(state): State<AppState>, body: Bytes) -> Response {
    let value: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            return ApiError::BadRequest(format!("Request body is not valid JSON: {e}"))
                .into_response();
        }
    };

    let request = match SubmissionRequest::from_json(value) {
        Ok(r) => r,
        Err(e) => return submission_error(SubmissionError::from(e)),
    };

    match state.submitter.submit(request).await {
        Ok(receipt) => (StatusCode::OK, Json(receipt.to_json())).into_response(),
        Err(e) => submission_error(e),
    }
}

fn submission_error(err: SubmissionError) -> Response {
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::BAD_GATEWAY);
    (status, Json(err.to_json())).into_response()
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
}

pub async fn list_medical_records(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    let records = state.submitter.audit_store().list(limit).await?;
    Ok(Json(json!({
        "count": records.len(),
        "records": records,
    })))
}

pub async fn get_medical_record(
    State(state): State<AppState>,
    Path(no_sep): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .submitter
        .audit_store()
        .get(&no_sep)
        .await?
        .ok_or_else(|| ApiError::not_recorded(&no_sep))?;
    Ok(Json(record))
}

/// One stage of an episode's audit record.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StageView<'a> {
    episode_number: &'a str,
    stage: AuditStage,
    #[serde(flatten)]
    record: &'a StageRecord,
}

/// The bundle as it was received, before normalization.
pub async fn get_medical_record_bundle(
    State(state): State<AppState>,
    Path(no_sep): Path<String>,
) -> Result<Response, ApiError> {
    let record = state
        .submitter
        .audit_store()
        .get(&no_sep)
        .await?
        .ok_or_else(|| ApiError::not_recorded(&no_sep))?;
    let intake = record
        .stage(AuditStage::Intake)
        .ok_or_else(|| ApiError::NotFound(format!("No intake recorded for episode {no_sep}")))?;

    Ok(Json(StageView {
        episode_number: &record.episode_number,
        stage: AuditStage::Intake,
        record: intake,
    })
    .into_response())
}

/// The most recent delivery attempt and the clearinghouse's answer to it.
pub async fn get_medical_record_response(
    State(state): State<AppState>,
    Path(no_sep): Path<String>,
) -> Result<Response, ApiError> {
    let record = state
        .submitter
        .audit_store()
        .get(&no_sep)
        .await?
        .ok_or_else(|| ApiError::not_recorded(&no_sep))?;
    let (stage, attempt) = record.latest_attempt().ok_or_else(|| {
        ApiError::NotFound(format!("No delivery attempt recorded for episode {no_sep}"))
    })?;

    Ok(Json(StageView {
        episode_number: &record.episode_number,
        stage,
        record: attempt,
    })
    .into_response())
}

pub async fn delete_medical_record(
    State(state): State<AppState>,
    Path(no_sep): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.submitter.audit_store().delete(&no_sep).await?;
    tracing::info!(episode = %no_sep, "Audit record deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Failures of the inspection endpoints, rendered in the submission error shape.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Storage(AuditError),
}

impl ApiError {
    fn not_recorded(no_sep: &str) -> Self {
        Self::NotFound(format!("No audit record for episode {no_sep}"))
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AuditError> for ApiError {
    fn from(err: AuditError) -> Self {
        match err {
            AuditError::NotFound { episode } => Self::not_recorded(&episode),
            other => Self::Storage(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::BadRequest(m) | Self::NotFound(m) => m.clone(),
            Self::Storage(e) => {
                tracing::error!(error = %e, "Audit storage error");
                format!("Audit storage error: {e}")
            }
        };
        let body = json!({
            "success": false,
            "error": message,
            "httpStatus": status.as_u16(),
        });
        (status, Json(body)).into_response()
    }
}
