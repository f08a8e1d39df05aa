//! Sync and preview endpoints
//!
//! `POST /api/sync` takes the same form the planning screen posts:
//! `PATIENT_ID` plus `UPDATE_STATUS` (`1` runs the sync, anything else
//! previews).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Form, Json,
};
use rtwiz_common::config::FailurePolicy;
use rtwiz_common::PatientId;
use serde::Deserialize;

use super::error::ApiError;
use crate::orchestrator::SyncRequest;
use crate::report::{FailureKind, SyncOutcome, SyncReport};
use crate::AppState;

/// Form body for POST /api/sync
#[derive(Debug, Deserialize)]
pub struct SyncForm {
    #[serde(rename = "PATIENT_ID", default)]
    pub patient_id: String,

    #[serde(rename = "UPDATE_STATUS", default)]
    pub update_status: Option<String>,

    /// Optional per-request failure policy override
    #[serde(default)]
    pub policy: Option<String>,
}

impl SyncForm {
    pub fn into_request(self) -> Result<SyncRequest, ApiError> {
        let patient_id: PatientId = self.patient_id.parse()?;
        let run = self.update_status.as_deref().map(str::trim) == Some("1");
        let policy = match self.policy.as_deref().filter(|p| !p.trim().is_empty()) {
            Some(p) => Some(p.parse::<FailurePolicy>().map_err(|e| {
                rtwiz_common::Error::Validation(e.to_string())
            })?),
            None => None,
        };

        Ok(SyncRequest {
            patient_id,
            run,
            policy,
        })
    }
}

/// POST /api/sync
pub async fn post_sync(
    State(state): State<AppState>,
    Form(form): Form<SyncForm>,
) -> Result<Response, ApiError> {
    let request = form.into_request()?;
    let report = state.orchestrator.execute(request).await;
    Ok(report_response(report))
}

/// GET /api/patients/:patient_id
///
/// Read-only view of the patient's field and group tables.
pub async fn get_patient(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> Result<Response, ApiError> {
    let patient_id: PatientId = patient_id.parse()?;
    let report = state
        .orchestrator
        .execute(SyncRequest::preview(patient_id))
        .await;
    Ok(report_response(report))
}

/// Report body with a status code reflecting the outcome
fn report_response(report: SyncReport) -> Response {
    let status = match &report.outcome {
        SyncOutcome::Failed { kind, .. } => match kind {
            FailureKind::Connection | FailureKind::Malformed => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
        _ => StatusCode::OK,
    };
    (status, Json(report)).into_response()
}
