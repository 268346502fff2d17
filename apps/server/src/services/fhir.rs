//! FHIR materializer orchestration: repository rows in, finished documents
//! out. The document assembly itself lives in `setu_terminology::fhir`; this
//! service resolves identifiers, runs the queries, and stamps the timestamp.
//!
//! Bundle ingest isolates entries from each other: a bad entry becomes a
//! failed response entry, never an aborted request. Only a top-level payload
//! that is not a Bundle at all is rejected outright.

use crate::db::{ClinicalRepository, TerminologyRepository};
use crate::services::terminology::TerminologyService;
use crate::{Error, Result};
use chrono::Utc;
use serde_json::Value;
use setu_terminology::{fhir, BundleEntryOutcome, SearchHit, SystemType, Vocabulary};
use uuid::Uuid;

/// Everything needed to create one dual-coded condition.
#[derive(Debug, Clone)]
pub struct ConditionDraft {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub namaste_code: String,
    pub icd11_code: Option<String>,
    pub clinical_notes: Option<String>,
    pub consent_given: bool,
}

#[derive(Clone)]
pub struct FhirService {
    terminology_repo: TerminologyRepository,
    terminology: TerminologyService,
    clinical: ClinicalRepository,
}

impl FhirService {
    pub fn new(
        terminology_repo: TerminologyRepository,
        terminology: TerminologyService,
        clinical: ClinicalRepository,
    ) -> Self {
        Self {
            terminology_repo,
            terminology,
            clinical,
        }
    }

    pub async fn namaste_code_system(&self, system: Option<SystemType>) -> Result<Value> {
        let concepts = self.terminology_repo.list_namaste(system).await?;
        Ok(fhir::namaste_code_system(system, &concepts, Utc::now()))
    }

    pub async fn icd11_code_system(&self, module: Option<&str>) -> Result<Value> {
        let concepts = self.terminology_repo.list_icd11(module).await?;
        Ok(fhir::icd11_code_system(module, &concepts, Utc::now()))
    }

    pub async fn concept_map(&self, system: Option<SystemType>) -> Result<Value> {
        let rows = self.terminology_repo.mapping_rows(system).await?;
        Ok(fhir::concept_map(system, &rows, Utc::now()))
    }

    /// `$expand`: wrap autocomplete hits in a ValueSet expansion envelope.
    pub async fn expand_value_set(
        &self,
        filter: &str,
        vocabulary: Option<Vocabulary>,
        count: i64,
    ) -> Result<Value> {
        let hits = self.terminology.search_codes(filter, vocabulary, count).await?;
        Ok(fhir::value_set_expansion(&hits, Utc::now()))
    }

    /// `$translate`: source and target accept either short names or canonical
    /// CodeSystem URLs. An unmapped code still yields a Parameters document,
    /// with `result = false`.
    pub async fn translate(&self, code: &str, system: &str, target: &str) -> Result<Value> {
        let source = Vocabulary::parse(system)
            .map_err(|_| Error::Validation(format!("unknown source system '{system}'")))?;
        let target = Vocabulary::parse(target)
            .map_err(|_| Error::Validation(format!("unknown target system '{target}'")))?;

        let candidates = self.terminology.translate(code, source, target).await?;
        Ok(fhir::translate_parameters(target, &candidates))
    }

    /// `$lookup` against the ICD-11 vocabulary.
    pub async fn lookup_icd11(&self, code: &str) -> Result<Value> {
        let row = self
            .terminology_repo
            .find_icd11(code)
            .await?
            .ok_or_else(|| Error::NotFound(format!("ICD-11 code {code} not found")))?;

        let hit = SearchHit {
            vocabulary: Vocabulary::Icd11,
            code: row.icd_code,
            display: row.title,
            kind: row.module,
            definition: row.definition,
        };
        Ok(fhir::lookup_parameters(&hit))
    }

    /// Create a treatment record and materialize it as a Condition resource.
    pub async fn create_condition(&self, draft: ConditionDraft) -> Result<Value> {
        let (treatment, patient, doctor) = self.create_treatment(draft).await?;
        Ok(fhir::condition(&treatment, &patient, &doctor))
    }

    /// A patient's problem list as a searchset Bundle.
    pub async fn problem_list(&self, patient_id: Uuid, status: Option<&str>) -> Result<Value> {
        self.clinical
            .find_patient(patient_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Patient {patient_id} not found")))?;

        let rows = self.clinical.problem_list(patient_id, status).await?;
        let conditions = rows
            .iter()
            .map(|(treatment, patient, doctor)| fhir::condition(treatment, patient, doctor))
            .collect();
        Ok(fhir::problem_list_bundle(conditions))
    }

    /// Ingest a transaction Bundle of Condition entries. Entries are processed
    /// independently; each becomes a `201 Created` or `400 Bad Request` entry
    /// in the transaction-response Bundle.
    pub async fn ingest_bundle(&self, bundle: Value) -> Result<Value> {
        let resource_type = bundle.get("resourceType").and_then(Value::as_str);
        if resource_type != Some("Bundle") {
            return Err(Error::InvalidResource("Invalid FHIR Bundle".to_string()));
        }

        let entries = bundle
            .get("entry")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut outcomes = Vec::with_capacity(entries.len());
        for entry in &entries {
            let outcome = match condition_draft_from_entry(entry) {
                Ok(draft) => match self.create_treatment(draft).await {
                    Ok((treatment, _, _)) => BundleEntryOutcome::Created { id: treatment.id },
                    Err(err) => BundleEntryOutcome::Failed {
                        message: entry_failure_message(err),
                    },
                },
                Err(message) => BundleEntryOutcome::Failed { message },
            };
            outcomes.push(outcome);
        }

        tracing::info!(
            entries = outcomes.len(),
            created = outcomes
                .iter()
                .filter(|o| matches!(o, BundleEntryOutcome::Created { .. }))
                .count(),
            "Bundle processed"
        );

        Ok(fhir::transaction_response(&outcomes))
    }

    async fn create_treatment(
        &self,
        draft: ConditionDraft,
    ) -> Result<(
        setu_terminology::TreatmentRecord,
        setu_terminology::PersonRef,
        setu_terminology::PersonRef,
    )> {
        let patient = self
            .clinical
            .find_patient(draft.patient_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Patient {} not found", draft.patient_id)))?;
        let doctor = self
            .clinical
            .find_doctor(draft.doctor_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Doctor {} not found", draft.doctor_id)))?;

        let namaste = self
            .terminology_repo
            .find_namaste(&draft.namaste_code)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!("NAMASTE code {} not found", draft.namaste_code))
            })?;

        // An unknown ICD-11 code does not block creation; the condition is
        // simply recorded single-coded.
        let mut icd11_id = None;
        if let Some(icd_code) = &draft.icd11_code {
            match self.terminology_repo.find_icd11(icd_code).await? {
                Some(row) => icd11_id = Some(row.id),
                None => tracing::warn!(icd_code, "ICD-11 code not found, recording single-coded"),
            }
        }

        let treatment = self
            .clinical
            .insert_treatment(
                patient.id,
                doctor.id,
                namaste.id,
                icd11_id,
                draft.clinical_notes.as_deref(),
                draft.consent_given,
            )
            .await?;

        Ok((treatment, patient, doctor))
    }
}

/// Flatten a per-entry error into the diagnostics string carried by the
/// failed response entry.
fn entry_failure_message(err: Error) -> String {
    match err {
        Error::NotFound(msg) | Error::Validation(msg) | Error::InvalidResource(msg) => msg,
        other => other.to_string(),
    }
}

/// Parse one Bundle entry into a condition draft. Returns the diagnostics
/// message for the failed response entry on any malformed input.
fn condition_draft_from_entry(entry: &Value) -> std::result::Result<ConditionDraft, String> {
    let resource = entry
        .get("resource")
        .ok_or_else(|| "Bundle entry has no resource".to_string())?;

    let resource_type = resource
        .get("resourceType")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    if resource_type != "Condition" {
        return Err(format!("Unsupported resource type {resource_type}"));
    }

    let codings = resource
        .pointer("/code/coding")
        .and_then(Value::as_array)
        .ok_or_else(|| "Condition has no code.coding".to_string())?;

    let coding_for = |needle: &str| {
        codings.iter().find(|c| {
            c.get("system")
                .and_then(Value::as_str)
                .is_some_and(|s| s.to_ascii_lowercase().contains(needle))
        })
    };

    let namaste_code = coding_for("namaste")
        .and_then(|c| c.get("code"))
        .and_then(Value::as_str)
        .ok_or_else(|| "NAMASTE code is required".to_string())?
        .to_string();
    let icd11_code = coding_for("icd")
        .and_then(|c| c.get("code"))
        .and_then(Value::as_str)
        .map(String::from);

    let patient_id = reference_id(resource, "/subject/reference", "Patient")
        .ok_or_else(|| "Condition subject must reference a Patient by id".to_string())?;
    let doctor_id = reference_id(resource, "/recorder/reference", "Practitioner")
        .ok_or_else(|| "Condition recorder must reference a Practitioner by id".to_string())?;

    let clinical_notes = resource
        .pointer("/note/0/text")
        .and_then(Value::as_str)
        .map(String::from);

    Ok(ConditionDraft {
        patient_id,
        doctor_id,
        namaste_code,
        icd11_code,
        clinical_notes,
        consent_given: true,
    })
}

/// Extract the UUID from a `Type/id` reference of the expected type.
fn reference_id(resource: &Value, pointer: &str, expected_type: &str) -> Option<Uuid> {
    let reference = resource.pointer(pointer)?.as_str()?;
    let (resource_type, id) = reference.split_once('/')?;
    if resource_type != expected_type {
        return None;
    }
    id.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn condition_entry(namaste: Option<&str>, icd: Option<&str>) -> Value {
        let mut coding = Vec::new();
        if let Some(code) = namaste {
            coding.push(json!({
                "system": "http://ayush.gov.in/fhir/CodeSystem/namaste-ayurveda",
                "code": code,
                "display": "Kasa",
            }));
        }
        if let Some(code) = icd {
            coding.push(json!({
                "system": "http://id.who.int/icd/release/11/2024-01",
                "code": code,
                "display": "Cough",
            }));
        }
        json!({
            "resource": {
                "resourceType": "Condition",
                "code": { "coding": coding },
                "subject": { "reference": "Patient/00000000-0000-0000-0000-000000000001" },
                "recorder": { "reference": "Practitioner/00000000-0000-0000-0000-000000000002" },
                "note": [{ "text": "productive cough" }],
            }
        })
    }

    #[test]
    fn parses_a_dual_coded_entry() {
        let draft = condition_draft_from_entry(&condition_entry(Some("AY-002"), Some("MD12")))
            .expect("entry should parse");
        assert_eq!(draft.namaste_code, "AY-002");
        assert_eq!(draft.icd11_code.as_deref(), Some("MD12"));
        assert_eq!(draft.clinical_notes.as_deref(), Some("productive cough"));
        assert!(draft.consent_given);
    }

    #[test]
    fn entry_without_namaste_coding_fails_with_a_message() {
        let err = condition_draft_from_entry(&condition_entry(None, Some("MD12"))).unwrap_err();
        assert_eq!(err, "NAMASTE code is required");
    }

    #[test]
    fn non_condition_entries_are_reported_not_dropped() {
        let entry = json!({ "resource": { "resourceType": "Observation" } });
        let err = condition_draft_from_entry(&entry).unwrap_err();
        assert_eq!(err, "Unsupported resource type Observation");
    }

    #[test]
    fn malformed_subject_reference_fails() {
        let mut entry = condition_entry(Some("AY-002"), None);
        entry["resource"]["subject"]["reference"] = json!("Patient/not-a-uuid");
        assert!(condition_draft_from_entry(&entry).is_err());

        let mut entry = condition_entry(Some("AY-002"), None);
        entry["resource"]["subject"]["reference"] = json!("Group/00000000-0000-0000-0000-000000000001");
        assert!(condition_draft_from_entry(&entry).is_err());
    }

    #[test]
    fn entry_without_resource_fails() {
        let err = condition_draft_from_entry(&json!({})).unwrap_err();
        assert_eq!(err, "Bundle entry has no resource");
    }
}
