//! Plain-JSON API handlers: diagnosis autocomplete, corpus statistics, the
//! mapping browser, and the disease-prediction proxy.

use crate::api::handlers::parse_system;
use crate::state::AppState;
use crate::{Error, Result};
use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

const DEFAULT_SEARCH_LIMIT: i64 = 20;
const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct DiagnosisSearchQuery {
    pub query: Option<String>,
    pub system: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct MappingsQuery {
    pub system: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PredictRequest {
    #[validate(length(min = 1, message = "symptoms must be a non-empty list"))]
    pub symptoms: Vec<String>,
    pub model: Option<String>,
}

/// GET /api/search/diagnosis?query=&system=&limit=
///
/// Queries under two characters return an empty result set rather than an
/// error, matching autocomplete semantics.
pub async fn diagnosis_search(
    State(state): State<AppState>,
    Query(query): Query<DiagnosisSearchQuery>,
) -> Result<Json<Value>> {
    let system = parse_system(query.system.as_deref())?;
    let limit = query.limit.unwrap_or(DEFAULT_SEARCH_LIMIT).clamp(1, MAX_PAGE_SIZE);

    let results = state
        .terminology
        .diagnosis_search(query.query.as_deref().unwrap_or(""), system, limit)
        .await?;
    let total = results.len();

    Ok(Json(json!({
        "results": results,
        "total": total,
    })))
}

/// GET /api/stats
pub async fn stats(State(state): State<AppState>) -> Result<Json<Value>> {
    let stats = state.terminology.stats().await?;

    Ok(Json(json!({
        "namaste": {
            "total": stats.namaste_total,
            "ayurveda": stats.ayurveda,
            "siddha": stats.siddha,
            "unani": stats.unani,
        },
        "icd11": {
            "total": stats.icd11_total,
        },
        "mappings": {
            "total": stats.mapping_total,
            "unique_codes": stats.mapped_namaste_codes,
            "average_confidence": stats
                .average_confidence
                .map(|avg| (avg * 100.0).round() / 100.0)
                .unwrap_or(0.0),
        },
    })))
}

/// GET /api/mappings?system=&page=&limit=
pub async fn mappings(
    State(state): State<AppState>,
    Query(query): Query<MappingsQuery>,
) -> Result<Json<Value>> {
    let system = parse_system(query.system.as_deref())?;
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = (page - 1) * limit;

    let (mappings, total) = state.terminology.mappings_page(system, limit, offset).await?;

    Ok(Json(json!({
        "mappings": mappings,
        "pagination": {
            "page": page,
            "limit": limit,
            "total": total,
            "pages": (total + limit - 1) / limit,
        },
    })))
}

/// POST /api/predict
pub async fn predict(
    State(state): State<AppState>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<Value>> {
    request
        .validate()
        .map_err(|err| Error::Validation(err.to_string()))?;

    let result = state
        .prediction
        .predict(&request.symptoms, request.model.as_deref())
        .await?;
    Ok(Json(result))
}
