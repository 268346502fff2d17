//! Request handlers

pub mod body_regions;
pub mod conditions;
pub mod search;
pub mod terminology;

use crate::{Error, Result};
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use setu_terminology::SystemType;

/// Render a FHIR document with the FHIR JSON content type.
pub(crate) fn fhir_response(status: StatusCode, document: Value) -> Response {
    let mut response = (status, Json(document)).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/fhir+json; charset=utf-8"),
    );
    response
}

/// Parse an optional `system` query value into a NAMASTE stream.
pub(crate) fn parse_system(value: Option<&str>) -> Result<Option<SystemType>> {
    value
        .map(|v| {
            v.parse()
                .map_err(|_| Error::Validation(format!("unknown system_type '{v}'")))
        })
        .transpose()
}
