//! Body-region handlers: catalog listing, region-scoped diagnosis lookup, the
//! classifier rebuild trigger, and the manual curation paths.

use crate::services::body_mapper::ManualMapping;
use crate::state::AppState;
use crate::{Error, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

const DEFAULT_DIAGNOSIS_LIMIT: i64 = 50;
const MAX_DIAGNOSIS_LIMIT: i64 = 200;
const DEFAULT_MIN_RELEVANCE: f64 = 0.5;

#[derive(Debug, Deserialize)]
pub struct RegionDiagnosesQuery {
    pub verified_only: Option<bool>,
    pub min_relevance: Option<f64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMappingRequest {
    pub namaste_code: Option<String>,
    pub icd_code: Option<String>,
    #[validate(range(min = 0.0, max = 1.0, message = "relevance_score must be within [0, 1]"))]
    pub relevance_score: Option<f64>,
    pub mapping_type: Option<String>,
    pub verified_by: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VerifyRequest {
    pub verified_by: Option<String>,
}

/// GET /api/body-regions
pub async fn list_regions(State(state): State<AppState>) -> Result<Json<Value>> {
    let regions = state.body_mapper.list_regions().await?;
    Ok(Json(json!({ "regions": regions })))
}

/// GET /api/body-regions/:code/diagnoses?verified_only=&min_relevance=&limit=
pub async fn region_diagnoses(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(query): Query<RegionDiagnosesQuery>,
) -> Result<Json<Value>> {
    let min_relevance = query.min_relevance.unwrap_or(DEFAULT_MIN_RELEVANCE);
    if !(0.0..=1.0).contains(&min_relevance) {
        return Err(Error::Validation(
            "min_relevance must be within [0, 1]".to_string(),
        ));
    }
    let limit = query
        .limit
        .unwrap_or(DEFAULT_DIAGNOSIS_LIMIT)
        .clamp(1, MAX_DIAGNOSIS_LIMIT);

    let diagnoses = state
        .body_mapper
        .diagnoses_for_region(
            &code,
            query.verified_only.unwrap_or(false),
            min_relevance,
            limit,
        )
        .await?;

    Ok(Json(serde_json::to_value(diagnoses).map_err(|err| {
        Error::Internal(format!("failed to serialize region diagnoses: {err}"))
    })?))
}

/// POST /api/body-regions/rebuild
///
/// Kicks off the full two-strategy reclassification. A rebuild already in
/// flight yields a 409; a mid-run failure aborts the batch and surfaces as a
/// 500 for the operator.
pub async fn rebuild(State(state): State<AppState>) -> Result<Json<Value>> {
    let report = state.body_mapper.rebuild().await?;
    Ok(Json(json!({
        "message": "Body-region mappings rebuilt",
        "regions": report.regions,
        "total": report.total,
    })))
}

/// POST /api/body-regions/:code/mappings
pub async fn create_mapping(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(request): Json<CreateMappingRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    request
        .validate()
        .map_err(|err| Error::Validation(err.to_string()))?;

    let mapping = state
        .body_mapper
        .create_mapping(
            &code,
            ManualMapping {
                namaste_code: request.namaste_code,
                icd_code: request.icd_code,
                relevance_score: request.relevance_score.unwrap_or(1.0),
                mapping_type: request.mapping_type.unwrap_or_else(|| "primary".to_string()),
                verified_by: request.verified_by,
                notes: request.notes,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "mapping": mapping }))))
}

/// PATCH /api/body-regions/mappings/:id/verify
pub async fn verify_mapping(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<VerifyRequest>>,
) -> Result<Json<Value>> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let mapping = state
        .body_mapper
        .verify_mapping(id, request.verified_by.as_deref())
        .await?;
    Ok(Json(json!({ "mapping": mapping })))
}

/// DELETE /api/body-regions/mappings/:id
pub async fn delete_mapping(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.body_mapper.delete_mapping(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
