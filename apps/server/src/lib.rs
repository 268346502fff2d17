//! Setu - NAMASTE ↔ ICD-11 terminology bridge
//!
//! A Postgres-backed terminology service exposing:
//! - FHIR-shaped documents: CodeSystem, ConceptMap, ValueSet `$expand`,
//!   Parameters (`$translate`, `$lookup`), Condition, Bundle
//! - diagnosis autocomplete with diacritic folding
//! - a two-strategy body-region inference pipeline over the mapped corpus

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod request_context;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::{Error, Result};
pub use state::AppState;
