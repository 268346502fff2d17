//! Service layer - orchestration over the repositories

pub mod body_mapper;
pub mod fhir;
pub mod prediction;
pub mod terminology;

pub use body_mapper::BodyRegionMapper;
pub use fhir::FhirService;
pub use prediction::PredictionService;
pub use terminology::TerminologyService;
