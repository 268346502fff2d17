//! Domain logic for the NAMASTE ↔ ICD-11 terminology bridge.
//!
//! This crate holds everything that does not touch a database or a socket:
//! - vocabulary types and the rows the server's repositories produce
//! - diacritic folding used by code search
//! - the body-region catalog, the ICD-11 chapter table, and the keyword lists
//!   driving the region classifier
//! - pure, deterministic FHIR document builders (CodeSystem, ConceptMap,
//!   ValueSet expansion, Parameters, Condition, Bundle)
//!
//! Builders take an explicit timestamp so identical inputs produce identical
//! documents.

pub mod codes;
pub mod fhir;
pub mod normalize;
pub mod regions;

pub use codes::{
    BundleEntryOutcome, Icd11Concept, MappingRow, NamasteConcept, PersonRef, SearchHit,
    SystemType, TranslationCandidate, TreatmentRecord, Vocabulary,
};
pub use regions::{BodyRegion, MappingOrigin};
