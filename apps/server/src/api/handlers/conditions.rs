//! Condition and Bundle handlers: dual-coded problem-list entries.

use crate::api::handlers::fhir_response;
use crate::services::fhir::ConditionDraft;
use crate::state::AppState;
use crate::{Error, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Response,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateConditionRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    #[validate(length(min = 1, message = "namaste_code must not be empty"))]
    pub namaste_code: String,
    pub icd11_code: Option<String>,
    pub clinical_notes: Option<String>,
    #[serde(default)]
    pub consent_given: bool,
}

#[derive(Debug, Deserialize)]
pub struct ProblemListQuery {
    pub patient: Option<Uuid>,
    pub status: Option<String>,
}

/// POST /fhir/Condition
pub async fn create_condition(
    State(state): State<AppState>,
    Json(request): Json<CreateConditionRequest>,
) -> Result<Response> {
    request
        .validate()
        .map_err(|err| Error::Validation(err.to_string()))?;

    let document = state
        .fhir
        .create_condition(ConditionDraft {
            patient_id: request.patient_id,
            doctor_id: request.doctor_id,
            namaste_code: request.namaste_code,
            icd11_code: request.icd11_code,
            clinical_notes: request.clinical_notes,
            consent_given: request.consent_given,
        })
        .await?;

    Ok(fhir_response(StatusCode::CREATED, document))
}

/// GET /fhir/Condition?patient=&status=
pub async fn problem_list(
    State(state): State<AppState>,
    Query(query): Query<ProblemListQuery>,
) -> Result<Response> {
    let patient = query
        .patient
        .ok_or_else(|| Error::Validation("patient parameter is required".to_string()))?;

    let document = state
        .fhir
        .problem_list(patient, query.status.as_deref())
        .await?;
    Ok(fhir_response(StatusCode::OK, document))
}

/// POST /fhir/Bundle
pub async fn ingest_bundle(
    State(state): State<AppState>,
    Json(bundle): Json<Value>,
) -> Result<Response> {
    let document = state.fhir.ingest_bundle(bundle).await?;
    Ok(fhir_response(StatusCode::OK, document))
}
