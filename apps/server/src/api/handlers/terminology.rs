//! FHIR terminology handlers: CodeSystem, ConceptMap, `$expand`,
//! `$translate`, `$lookup`.

use crate::api::handlers::{fhir_response, parse_system};
use crate::state::AppState;
use crate::{Error, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Response,
    Json,
};
use serde::Deserialize;
use setu_terminology::Vocabulary;

const DEFAULT_EXPANSION_COUNT: i64 = 20;
const MAX_EXPANSION_COUNT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct SystemQuery {
    pub system: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ModuleQuery {
    pub module: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExpandQuery {
    pub filter: Option<String>,
    pub system: Option<String>,
    pub count: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TranslateRequest {
    pub code: Option<String>,
    pub system: Option<String>,
    pub target: Option<String>,
}

/// GET /fhir/CodeSystem/namaste?system=
pub async fn namaste_code_system(
    State(state): State<AppState>,
    Query(query): Query<SystemQuery>,
) -> Result<Response> {
    let system = parse_system(query.system.as_deref())?;
    let document = state.fhir.namaste_code_system(system).await?;
    Ok(fhir_response(StatusCode::OK, document))
}

/// GET /fhir/CodeSystem/icd11?module=
pub async fn icd11_code_system(
    State(state): State<AppState>,
    Query(query): Query<ModuleQuery>,
) -> Result<Response> {
    let document = state.fhir.icd11_code_system(query.module.as_deref()).await?;
    Ok(fhir_response(StatusCode::OK, document))
}

/// GET /fhir/ConceptMap/namaste-icd11?system=
pub async fn concept_map(
    State(state): State<AppState>,
    Query(query): Query<SystemQuery>,
) -> Result<Response> {
    let system = parse_system(query.system.as_deref())?;
    let document = state.fhir.concept_map(system).await?;
    Ok(fhir_response(StatusCode::OK, document))
}

/// GET /fhir/ValueSet/$expand?filter=&system=&count=
pub async fn expand_value_set(
    State(state): State<AppState>,
    Query(query): Query<ExpandQuery>,
) -> Result<Response> {
    let vocabulary = query
        .system
        .as_deref()
        .map(|s| {
            Vocabulary::parse(s).map_err(|_| Error::Validation(format!("unknown system '{s}'")))
        })
        .transpose()?;
    let count = query
        .count
        .unwrap_or(DEFAULT_EXPANSION_COUNT)
        .clamp(1, MAX_EXPANSION_COUNT);

    let document = state
        .fhir
        .expand_value_set(query.filter.as_deref().unwrap_or(""), vocabulary, count)
        .await?;
    Ok(fhir_response(StatusCode::OK, document))
}

/// POST /fhir/ConceptMap/$translate
pub async fn translate(
    State(state): State<AppState>,
    Json(request): Json<TranslateRequest>,
) -> Result<Response> {
    let (Some(code), Some(system), Some(target)) =
        (&request.code, &request.system, &request.target)
    else {
        return Err(Error::Validation(
            "Code, system, and target parameters are required".to_string(),
        ));
    };

    let document = state.fhir.translate(code, system, target).await?;
    Ok(fhir_response(StatusCode::OK, document))
}

/// GET /fhir/CodeSystem/icd11/$lookup?code=
pub async fn icd11_lookup(
    State(state): State<AppState>,
    Query(query): Query<LookupQuery>,
) -> Result<Response> {
    let code = query
        .code
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| Error::Validation("code parameter is required".to_string()))?;

    let document = state.fhir.lookup_icd11(code).await?;
    Ok(fhir_response(StatusCode::OK, document))
}
