//! Route tables for the FHIR surface and the plain-JSON API surface.

use crate::api::handlers::{body_regions, conditions, search, terminology};
use crate::state::AppState;
use axum::{
    routing::{delete, get, patch, post},
    Router,
};

pub fn fhir_routes() -> Router<AppState> {
    Router::new()
        .route("/CodeSystem/namaste", get(terminology::namaste_code_system))
        .route("/CodeSystem/icd11", get(terminology::icd11_code_system))
        .route("/CodeSystem/icd11/$lookup", get(terminology::icd11_lookup))
        .route("/ConceptMap/namaste-icd11", get(terminology::concept_map))
        .route("/ConceptMap/$translate", post(terminology::translate))
        .route("/ValueSet/$expand", get(terminology::expand_value_set))
        .route(
            "/Condition",
            post(conditions::create_condition).get(conditions::problem_list),
        )
        .route("/Bundle", post(conditions::ingest_bundle))
}

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/search/diagnosis", get(search::diagnosis_search))
        .route("/stats", get(search::stats))
        .route("/mappings", get(search::mappings))
        .route("/predict", post(search::predict))
        .route("/body-regions", get(body_regions::list_regions))
        .route("/body-regions/rebuild", post(body_regions::rebuild))
        .route(
            "/body-regions/:code/diagnoses",
            get(body_regions::region_diagnoses),
        )
        .route(
            "/body-regions/:code/mappings",
            post(body_regions::create_mapping),
        )
        .route(
            "/body-regions/mappings/:id/verify",
            patch(body_regions::verify_mapping),
        )
        .route(
            "/body-regions/mappings/:id",
            delete(body_regions::delete_mapping),
        )
}
