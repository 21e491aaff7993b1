//! EMR sync routes.

use axum::extract::{Path, State};
use axum::response::Json;

use super::ApiError;
use crate::clinical::{ClinicalRecord, CounselingSession};
use crate::emr::{ConnectionReport, PushReceipt};
use crate::state::AppState;

/// `GET /api/emr/test` — probe the configured EMR.
pub async fn test_connection(State(state): State<AppState>) -> Result<Json<ConnectionReport>, ApiError> {
    Ok(Json(state.emr.test_connection().await?))
}

/// `GET /api/emr/patients/:id` — patient plus best-effort clinical sections.
pub async fn pull_patient(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<ClinicalRecord>, ApiError> {
    Ok(Json(state.emr.pull_patient(&id).await?))
}

/// `POST /api/emr/counseling` — write a session; partial writes still return 200.
pub async fn push_counseling(
    State(state): State<AppState>,
    Json(session): Json<CounselingSession>,
) -> Result<Json<PushReceipt>, ApiError> {
    Ok(Json(state.emr.push_counseling(&session).await?))
}
