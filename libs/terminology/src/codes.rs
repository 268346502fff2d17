//! Vocabulary types and the domain rows exchanged between the server's
//! repositories and the FHIR builders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Canonical URL of the combined NAMASTE CodeSystem.
pub const NAMASTE_SYSTEM_URI: &str = "http://ayush.gov.in/fhir/CodeSystem/namaste";

/// Canonical URL of the ICD-11 2024-01 release.
pub const ICD11_SYSTEM_URI: &str = "http://id.who.int/icd/release/11/2024-01";

#[derive(Debug, Error)]
#[error("unknown terminology system: {0}")]
pub struct ParseSystemError(pub String);

/// The three traditional-medicine streams NAMASTE codes belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemType {
    Ayurveda,
    Siddha,
    Unani,
}

impl SystemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemType::Ayurveda => "ayurveda",
            SystemType::Siddha => "siddha",
            SystemType::Unani => "unani",
        }
    }

    /// CodeSystem URL of the per-stream NAMASTE vocabulary.
    pub fn system_uri(&self) -> String {
        format!("{}-{}", NAMASTE_SYSTEM_URI, self.as_str())
    }
}

impl fmt::Display for SystemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SystemType {
    type Err = ParseSystemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ayurveda" => Ok(SystemType::Ayurveda),
            "siddha" => Ok(SystemType::Siddha),
            "unani" => Ok(SystemType::Unani),
            other => Err(ParseSystemError(other.to_string())),
        }
    }
}

/// One of the two vocabularies the bridge translates between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vocabulary {
    Namaste,
    Icd11,
}

impl Vocabulary {
    pub fn as_str(&self) -> &'static str {
        match self {
            Vocabulary::Namaste => "namaste",
            Vocabulary::Icd11 => "icd11",
        }
    }

    /// Recognize a vocabulary from either its short name or a canonical URL,
    /// e.g. `namaste`, `http://ayush.gov.in/fhir/CodeSystem/namaste-ayurveda`,
    /// `icd11`, `http://id.who.int/icd/release/11/2024-01`.
    pub fn parse(value: &str) -> Result<Self, ParseSystemError> {
        let lower = value.to_ascii_lowercase();
        if lower.contains("namaste") {
            Ok(Vocabulary::Namaste)
        } else if lower.contains("icd") {
            Ok(Vocabulary::Icd11)
        } else {
            Err(ParseSystemError(value.to_string()))
        }
    }
}

/// A NAMASTE concept as stored in `namaste_codes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamasteConcept {
    pub code: String,
    pub display: String,
    pub system_type: SystemType,
    pub definition: Option<String>,
}

/// An ICD-11 concept as stored in `icd11_codes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Icd11Concept {
    pub icd_code: String,
    pub title: String,
    pub module: String,
    pub definition: Option<String>,
}

/// A concept-mapping edge joined with both endpoint displays, as consumed by
/// the ConceptMap builder and the region classifier.
#[derive(Debug, Clone)]
pub struct MappingRow {
    pub namaste_code: String,
    pub namaste_display: String,
    pub system_type: SystemType,
    pub icd_code: String,
    pub icd_title: String,
    pub mapping_type: Option<String>,
    pub confidence: Option<f64>,
}

/// One translation candidate, ordered by descending confidence.
#[derive(Debug, Clone, Serialize)]
pub struct TranslationCandidate {
    pub code: String,
    pub display: String,
    /// `system_type` for NAMASTE targets, `module` for ICD-11 targets.
    pub kind: String,
    pub confidence: f64,
    pub mapping_type: Option<String>,
}

impl TranslationCandidate {
    /// CodeSystem URL of the vocabulary this candidate belongs to.
    pub fn system_uri(&self, target: Vocabulary) -> String {
        match target {
            Vocabulary::Namaste => format!("{}-{}", NAMASTE_SYSTEM_URI, self.kind),
            Vocabulary::Icd11 => ICD11_SYSTEM_URI.to_string(),
        }
    }
}

/// One autocomplete hit from either vocabulary.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub vocabulary: Vocabulary,
    pub code: String,
    pub display: String,
    /// `system_type` for NAMASTE hits, `module` for ICD-11 hits.
    pub kind: String,
    pub definition: Option<String>,
}

impl SearchHit {
    pub fn system_uri(&self) -> String {
        match self.vocabulary {
            Vocabulary::Namaste => format!("{}-{}", NAMASTE_SYSTEM_URI, self.kind),
            Vocabulary::Icd11 => ICD11_SYSTEM_URI.to_string(),
        }
    }
}

/// A clinical encounter row joined with its code displays, read-only input to
/// the Condition builder.
#[derive(Debug, Clone)]
pub struct TreatmentRecord {
    pub id: Uuid,
    pub status: String,
    pub version: i32,
    pub encounter_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub namaste_code: Option<String>,
    pub namaste_display: Option<String>,
    pub namaste_system: Option<SystemType>,
    pub icd11_code: Option<String>,
    pub icd11_title: Option<String>,
    pub clinical_notes: Option<String>,
}

/// A person reference (patient or practitioner) for Condition references.
#[derive(Debug, Clone)]
pub struct PersonRef {
    pub id: Uuid,
    pub name: String,
}

/// Per-entry result of ingesting a transaction Bundle.
#[derive(Debug, Clone, PartialEq)]
pub enum BundleEntryOutcome {
    Created { id: Uuid },
    Failed { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocabulary_parses_short_names_and_uris() {
        assert_eq!(Vocabulary::parse("namaste").unwrap(), Vocabulary::Namaste);
        assert_eq!(
            Vocabulary::parse("http://ayush.gov.in/fhir/CodeSystem/namaste-siddha").unwrap(),
            Vocabulary::Namaste
        );
        assert_eq!(Vocabulary::parse("icd11").unwrap(), Vocabulary::Icd11);
        assert_eq!(
            Vocabulary::parse("http://id.who.int/icd/release/11/2024-01").unwrap(),
            Vocabulary::Icd11
        );
        assert!(Vocabulary::parse("snomed").is_err());
    }

    #[test]
    fn system_type_round_trips() {
        for s in ["ayurveda", "siddha", "unani"] {
            assert_eq!(s.parse::<SystemType>().unwrap().as_str(), s);
        }
        assert!("homeopathy".parse::<SystemType>().is_err());
    }

    #[test]
    fn per_stream_system_uri_carries_the_stream_suffix() {
        assert_eq!(
            SystemType::Ayurveda.system_uri(),
            "http://ayush.gov.in/fhir/CodeSystem/namaste-ayurveda"
        );
    }
}
