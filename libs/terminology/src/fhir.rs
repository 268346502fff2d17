//! Pure FHIR document builders.
//!
//! Every builder is a deterministic function from store rows (plus an
//! explicit timestamp) to a finished JSON document: no I/O, no clock reads,
//! no writes. Given the same rows and timestamp the output is byte-identical;
//! ConceptMap elements are grouped through a `BTreeMap` so source ordering is
//! stable regardless of row order.

use crate::codes::{
    BundleEntryOutcome, Icd11Concept, MappingRow, NamasteConcept, PersonRef, SearchHit,
    SystemType, TranslationCandidate, TreatmentRecord, Vocabulary, ICD11_SYSTEM_URI,
    NAMASTE_SYSTEM_URI,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

const CONDITION_CLINICAL_URI: &str = "http://terminology.hl7.org/CodeSystem/condition-clinical";
const CONDITION_CATEGORY_URI: &str = "http://terminology.hl7.org/CodeSystem/condition-category";

/// CodeSystem for the NAMASTE vocabulary, optionally filtered to one stream.
/// `count` always equals the number of concept entries.
pub fn namaste_code_system(
    system: Option<SystemType>,
    concepts: &[NamasteConcept],
    timestamp: DateTime<Utc>,
) -> Value {
    let suffix = system.map(|s| format!("-{}", s.as_str())).unwrap_or_default();
    let name = match system {
        Some(s) => format!("NAMASTE_{}", s.as_str().to_uppercase()),
        None => "NAMASTE".to_string(),
    };
    let title = match system {
        Some(s) => format!("NAMASTE {} Codes", capitalize(s.as_str())),
        None => "NAMASTE - National AYUSH Morbidity & Standardized Terminologies Electronic"
            .to_string(),
    };
    let description = match system {
        Some(s) => format!("NAMASTE codes for {} system", s.as_str()),
        None => "Standardized terminology codes for Ayurveda, Siddha, and Unani systems of medicine"
            .to_string(),
    };

    json!({
        "resourceType": "CodeSystem",
        "id": format!("namaste{suffix}"),
        "url": format!("{NAMASTE_SYSTEM_URI}{suffix}"),
        "version": "1.0.0",
        "name": name,
        "title": title,
        "status": "active",
        "experimental": false,
        "date": timestamp.to_rfc3339(),
        "publisher": "Ministry of AYUSH, Government of India",
        "description": description,
        "caseSensitive": true,
        "content": "complete",
        "count": concepts.len(),
        "concept": concepts
            .iter()
            .map(|c| concept_entry(&c.code, &c.display, c.definition.as_deref()))
            .collect::<Vec<_>>()
    })
}

/// CodeSystem for ICD-11, optionally filtered to one module (TM2 or
/// biomedicine).
pub fn icd11_code_system(
    module: Option<&str>,
    concepts: &[Icd11Concept],
    timestamp: DateTime<Utc>,
) -> Value {
    let name = match module {
        Some(m) => format!("ICD11_{}", m.to_uppercase()),
        None => "ICD11".to_string(),
    };
    let title = match module {
        Some("TM2") => "ICD-11 Traditional Medicine Module 2".to_string(),
        Some(_) => "ICD-11 Biomedicine".to_string(),
        None => "ICD-11 - International Classification of Diseases 11th Revision".to_string(),
    };
    let description = match module {
        Some(m) => format!("ICD-11 {m} codes"),
        None => "International Classification of Diseases 11th Revision".to_string(),
    };

    json!({
        "resourceType": "CodeSystem",
        "id": match module {
            Some(m) => format!("icd11-{m}"),
            None => "icd11".to_string(),
        },
        "url": match module {
            Some(m) => format!("{ICD11_SYSTEM_URI}/{m}"),
            None => ICD11_SYSTEM_URI.to_string(),
        },
        "version": "2024-01",
        "name": name,
        "title": title,
        "status": "active",
        "experimental": false,
        "date": timestamp.to_rfc3339(),
        "publisher": "World Health Organization (WHO)",
        "description": description,
        "caseSensitive": true,
        "content": "complete",
        "count": concepts.len(),
        "concept": concepts
            .iter()
            .map(|c| concept_entry(&c.icd_code, &c.title, c.definition.as_deref()))
            .collect::<Vec<_>>()
    })
}

/// ConceptMap over all NAMASTE → ICD-11 edges, one element per source code
/// with its targets nested. Elements are emitted in source-code order so the
/// same rows always produce the same bytes.
pub fn concept_map(
    system: Option<SystemType>,
    rows: &[MappingRow],
    timestamp: DateTime<Utc>,
) -> Value {
    struct Element<'a> {
        display: &'a str,
        targets: Vec<Value>,
    }

    let mut elements: BTreeMap<&str, Element<'_>> = BTreeMap::new();
    for row in rows {
        let entry = elements
            .entry(row.namaste_code.as_str())
            .or_insert_with(|| Element {
                display: &row.namaste_display,
                targets: Vec::new(),
            });

        let mut target = Map::new();
        target.insert("code".into(), json!(row.icd_code));
        target.insert("display".into(), json!(row.icd_title));
        target.insert(
            "equivalence".into(),
            json!(row.mapping_type.as_deref().unwrap_or("equivalent")),
        );
        if let Some(confidence) = row.confidence {
            target.insert(
                "comment".into(),
                json!(format!("Confidence: {:.0}%", confidence * 100.0)),
            );
        }
        entry.targets.push(Value::Object(target));
    }

    let suffix = system.map(|s| format!("-{}", s.as_str())).unwrap_or_default();
    let source_uri = format!("{NAMASTE_SYSTEM_URI}{suffix}");

    json!({
        "resourceType": "ConceptMap",
        "id": format!("namaste-icd11{suffix}"),
        "url": format!("http://ayush.gov.in/fhir/ConceptMap/namaste-icd11{suffix}"),
        "version": "1.0.0",
        "name": match system {
            Some(s) => format!("NAMASTE_ICD11_{}", s.as_str().to_uppercase()),
            None => "NAMASTE_ICD11".to_string(),
        },
        "title": match system {
            Some(s) => format!("NAMASTE {} to ICD-11 Concept Map", s.as_str()),
            None => "NAMASTE to ICD-11 Concept Map".to_string(),
        },
        "status": "active",
        "experimental": false,
        "date": timestamp.to_rfc3339(),
        "publisher": "Ministry of AYUSH, Government of India",
        "description": "Mapping between NAMASTE codes and ICD-11 codes for interoperability",
        "sourceUri": source_uri,
        "targetUri": ICD11_SYSTEM_URI,
        "group": [{
            "source": source_uri,
            "target": ICD11_SYSTEM_URI,
            "element": elements
                .iter()
                .map(|(code, el)| json!({
                    "code": code,
                    "display": el.display,
                    "target": el.targets,
                }))
                .collect::<Vec<_>>()
        }]
    })
}

/// ValueSet expansion envelope around autocomplete hits (`$expand`).
pub fn value_set_expansion(hits: &[SearchHit], timestamp: DateTime<Utc>) -> Value {
    json!({
        "resourceType": "ValueSet",
        "id": "search-results",
        "url": "http://ayush.gov.in/fhir/ValueSet/search-results",
        "status": "active",
        "expansion": {
            "timestamp": timestamp.to_rfc3339(),
            "total": hits.len(),
            "contains": hits
                .iter()
                .map(|h| json!({
                    "system": h.system_uri(),
                    "code": h.code,
                    "display": h.display,
                }))
                .collect::<Vec<_>>()
        }
    })
}

/// Parameters result for `$translate`. `result` is true iff at least one
/// candidate exists; candidates are expected in descending-confidence order.
pub fn translate_parameters(target: Vocabulary, candidates: &[TranslationCandidate]) -> Value {
    let mut parameter = vec![json!({
        "name": "result",
        "valueBoolean": !candidates.is_empty(),
    })];

    for candidate in candidates {
        parameter.push(json!({
            "name": "match",
            "part": [
                {
                    "name": "equivalence",
                    "valueCode": candidate.mapping_type.as_deref().unwrap_or("equivalent"),
                },
                {
                    "name": "concept",
                    "valueCoding": {
                        "system": candidate.system_uri(target),
                        "code": candidate.code,
                        "display": candidate.display,
                    },
                },
                {
                    "name": "confidence",
                    "valueDecimal": candidate.confidence,
                },
            ]
        }));
    }

    json!({
        "resourceType": "Parameters",
        "parameter": parameter,
    })
}

/// Parameters result for `$lookup` on a single resolved concept.
pub fn lookup_parameters(hit: &SearchHit) -> Value {
    let mut parameter = vec![
        json!({
            "name": "name",
            "valueString": match hit.vocabulary {
                Vocabulary::Namaste => "NAMASTE",
                Vocabulary::Icd11 => "ICD11",
            },
        }),
        json!({
            "name": "display",
            "valueString": hit.display,
        }),
        json!({
            "name": "designation",
            "part": [{
                "name": "value",
                "valueString": hit.display,
            }]
        }),
    ];

    if let Some(definition) = &hit.definition {
        parameter.push(json!({
            "name": "definition",
            "valueString": definition,
        }));
    }

    json!({
        "resourceType": "Parameters",
        "parameter": parameter,
    })
}

/// Condition (problem-list entry) for one treatment record. The NAMASTE
/// coding is present whenever the record carries one; the ICD-11 coding only
/// when dual-coded. Null codings are omitted, never emitted as placeholders.
pub fn condition(treatment: &TreatmentRecord, patient: &PersonRef, doctor: &PersonRef) -> Value {
    let mut codings = Vec::new();
    if let (Some(code), Some(system)) = (&treatment.namaste_code, treatment.namaste_system) {
        codings.push(json!({
            "system": system.system_uri(),
            "code": code,
            "display": treatment.namaste_display,
        }));
    }
    if let Some(code) = &treatment.icd11_code {
        codings.push(json!({
            "system": ICD11_SYSTEM_URI,
            "code": code,
            "display": treatment.icd11_title,
        }));
    }

    let text = treatment
        .namaste_display
        .as_deref()
        .or(treatment.icd11_title.as_deref())
        .unwrap_or_default();

    let mut resource = json!({
        "resourceType": "Condition",
        "id": treatment.id,
        "meta": {
            "versionId": treatment.version.to_string(),
            "lastUpdated": treatment.updated_at.to_rfc3339(),
        },
        "clinicalStatus": {
            "coding": [{
                "system": CONDITION_CLINICAL_URI,
                "code": treatment.status,
                "display": capitalize(&treatment.status),
            }]
        },
        "category": [{
            "coding": [{
                "system": CONDITION_CATEGORY_URI,
                "code": "problem-list-item",
                "display": "Problem List Item",
            }]
        }],
        "code": {
            "coding": codings,
            "text": text,
        },
        "subject": {
            "reference": format!("Patient/{}", patient.id),
            "display": patient.name,
        },
        "encounter": {
            "reference": format!("Encounter/{}", treatment.id),
        },
        "onsetDateTime": treatment.encounter_date.to_rfc3339(),
        "recordedDate": treatment.created_at.to_rfc3339(),
        "recorder": {
            "reference": format!("Practitioner/{}", doctor.id),
            "display": doctor.name,
        },
    });

    if let Some(notes) = treatment
        .clinical_notes
        .as_deref()
        .filter(|n| !n.trim().is_empty())
    {
        resource["note"] = json!([{ "text": notes }]);
    }

    resource
}

/// Searchset Bundle wrapping a patient's problem list.
pub fn problem_list_bundle(conditions: Vec<Value>) -> Value {
    json!({
        "resourceType": "Bundle",
        "type": "searchset",
        "total": conditions.len(),
        "entry": conditions
            .into_iter()
            .map(|resource| {
                let full_url = resource
                    .get("id")
                    .and_then(Value::as_str)
                    .map(|id| format!("http://ayush.gov.in/fhir/Condition/{id}"))
                    .unwrap_or_default();
                json!({
                    "fullUrl": full_url,
                    "resource": resource,
                })
            })
            .collect::<Vec<_>>()
    })
}

/// Transaction-response Bundle: one entry per ingested entry, `201 Created`
/// with a location on success, `400 Bad Request` with an OperationOutcome
/// naming the problem on failure.
pub fn transaction_response(outcomes: &[BundleEntryOutcome]) -> Value {
    json!({
        "resourceType": "Bundle",
        "type": "transaction-response",
        "entry": outcomes
            .iter()
            .map(|outcome| match outcome {
                BundleEntryOutcome::Created { id } => json!({
                    "response": {
                        "status": "201 Created",
                        "location": format!("Condition/{id}"),
                    }
                }),
                BundleEntryOutcome::Failed { message } => json!({
                    "response": {
                        "status": "400 Bad Request",
                        "outcome": {
                            "resourceType": "OperationOutcome",
                            "issue": [{
                                "severity": "error",
                                "code": "processing",
                                "diagnostics": message,
                            }]
                        }
                    }
                }),
            })
            .collect::<Vec<_>>()
    })
}

fn concept_entry(code: &str, display: &str, definition: Option<&str>) -> Value {
    let mut entry = Map::new();
    entry.insert("code".into(), json!(code));
    entry.insert("display".into(), json!(display));
    if let Some(definition) = definition {
        entry.insert("definition".into(), json!(definition));
    }
    Value::Object(entry)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn mapping_row(namaste: &str, icd: &str, confidence: f64) -> MappingRow {
        MappingRow {
            namaste_code: namaste.to_string(),
            namaste_display: format!("{namaste} display"),
            system_type: SystemType::Ayurveda,
            icd_code: icd.to_string(),
            icd_title: format!("{icd} title"),
            mapping_type: None,
            confidence: Some(confidence),
        }
    }

    #[test]
    fn code_system_count_equals_concept_length() {
        let concepts = vec![
            NamasteConcept {
                code: "AY-001".into(),
                display: "Jwara".into(),
                system_type: SystemType::Ayurveda,
                definition: Some("Fever".into()),
            },
            NamasteConcept {
                code: "AY-002".into(),
                display: "Kasa".into(),
                system_type: SystemType::Ayurveda,
                definition: None,
            },
        ];
        let doc = namaste_code_system(Some(SystemType::Ayurveda), &concepts, ts());
        assert_eq!(doc["count"], json!(2));
        assert_eq!(doc["concept"].as_array().unwrap().len(), 2);
        assert_eq!(doc["url"], json!("http://ayush.gov.in/fhir/CodeSystem/namaste-ayurveda"));
        // A concept without a definition omits the field entirely.
        assert!(doc["concept"][1].get("definition").is_none());
    }

    #[test]
    fn empty_code_system_still_holds_the_count_invariant() {
        let doc = icd11_code_system(Some("TM2"), &[], ts());
        assert_eq!(doc["count"], json!(0));
        assert_eq!(doc["concept"].as_array().unwrap().len(), 0);
        assert_eq!(doc["title"], json!("ICD-11 Traditional Medicine Module 2"));
    }

    #[test]
    fn concept_map_groups_targets_under_their_source() {
        let rows = vec![
            mapping_row("AY-002", "MD12", 0.92),
            mapping_row("AY-001", "MG26", 0.95),
            mapping_row("AY-001", "TM2-001", 0.60),
        ];
        let doc = concept_map(None, &rows, ts());
        let elements = doc["group"][0]["element"].as_array().unwrap();
        assert_eq!(elements.len(), 2);
        // Sorted by source code regardless of row order.
        assert_eq!(elements[0]["code"], json!("AY-001"));
        assert_eq!(elements[0]["target"].as_array().unwrap().len(), 2);
        assert_eq!(elements[1]["code"], json!("AY-002"));
        assert_eq!(
            elements[1]["target"][0]["comment"],
            json!("Confidence: 92%")
        );
        assert_eq!(elements[1]["target"][0]["equivalence"], json!("equivalent"));
    }

    #[test]
    fn concept_map_is_deterministic_across_row_orderings() {
        let forward = vec![mapping_row("AY-001", "MG26", 0.95), mapping_row("AY-002", "MD12", 0.92)];
        let reversed: Vec<_> = forward.iter().rev().cloned().collect();
        let a = serde_json::to_string(&concept_map(None, &forward, ts())).unwrap();
        let b = serde_json::to_string(&concept_map(None, &reversed, ts())).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn translate_result_flag_follows_candidate_presence() {
        let doc = translate_parameters(Vocabulary::Icd11, &[]);
        assert_eq!(doc["parameter"][0]["valueBoolean"], json!(false));
        assert_eq!(doc["parameter"].as_array().unwrap().len(), 1);

        let candidates = vec![TranslationCandidate {
            code: "MD12".into(),
            display: "Cough".into(),
            kind: "biomedicine".into(),
            confidence: 0.92,
            mapping_type: None,
        }];
        let doc = translate_parameters(Vocabulary::Icd11, &candidates);
        assert_eq!(doc["parameter"][0]["valueBoolean"], json!(true));
        let m = &doc["parameter"][1]["part"];
        assert_eq!(m[0]["valueCode"], json!("equivalent"));
        assert_eq!(
            m[1]["valueCoding"]["system"],
            json!("http://id.who.int/icd/release/11/2024-01")
        );
        assert_eq!(m[2]["valueDecimal"], json!(0.92));
    }

    #[test]
    fn expansion_total_equals_contains_length() {
        let hits = vec![SearchHit {
            vocabulary: Vocabulary::Namaste,
            code: "AY-002".into(),
            display: "Kasa".into(),
            kind: "ayurveda".into(),
            definition: None,
        }];
        let doc = value_set_expansion(&hits, ts());
        assert_eq!(doc["expansion"]["total"], json!(1));
        assert_eq!(doc["expansion"]["contains"].as_array().unwrap().len(), 1);
        assert_eq!(
            doc["expansion"]["contains"][0]["system"],
            json!("http://ayush.gov.in/fhir/CodeSystem/namaste-ayurveda")
        );
    }

    fn sample_treatment() -> TreatmentRecord {
        TreatmentRecord {
            id: Uuid::nil(),
            status: "active".into(),
            version: 1,
            encounter_date: ts(),
            created_at: ts(),
            updated_at: ts(),
            namaste_code: Some("AY-002".into()),
            namaste_display: Some("Kasa".into()),
            namaste_system: Some(SystemType::Ayurveda),
            icd11_code: None,
            icd11_title: None,
            clinical_notes: None,
        }
    }

    #[test]
    fn condition_omits_absent_codings_and_notes() {
        let patient = PersonRef { id: Uuid::nil(), name: "Kabir Kumar".into() };
        let doctor = PersonRef { id: Uuid::nil(), name: "Dr. Shruti Sharma".into() };

        let doc = condition(&sample_treatment(), &patient, &doctor);
        let codings = doc["code"]["coding"].as_array().unwrap();
        assert_eq!(codings.len(), 1, "no ICD-11 coding without a dual code");
        assert_eq!(codings[0]["code"], json!("AY-002"));
        assert!(doc.get("note").is_none());
        assert_eq!(doc["clinicalStatus"]["coding"][0]["display"], json!("Active"));

        let mut dual = sample_treatment();
        dual.icd11_code = Some("MD12".into());
        dual.icd11_title = Some("Cough".into());
        dual.clinical_notes = Some("productive cough, two weeks".into());
        let doc = condition(&dual, &patient, &doctor);
        assert_eq!(doc["code"]["coding"].as_array().unwrap().len(), 2);
        assert_eq!(doc["note"][0]["text"], json!("productive cough, two weeks"));
    }

    #[test]
    fn transaction_response_mixes_created_and_failed_entries() {
        let id = Uuid::nil();
        let outcomes = vec![
            BundleEntryOutcome::Created { id },
            BundleEntryOutcome::Failed {
                message: "NAMASTE code AY-999 not found".into(),
            },
        ];
        let doc = transaction_response(&outcomes);
        let entries = doc["entry"].as_array().unwrap();
        assert_eq!(entries[0]["response"]["status"], json!("201 Created"));
        assert_eq!(
            entries[0]["response"]["location"],
            json!(format!("Condition/{id}"))
        );
        assert_eq!(entries[1]["response"]["status"], json!("400 Bad Request"));
        assert_eq!(
            entries[1]["response"]["outcome"]["issue"][0]["diagnostics"],
            json!("NAMASTE code AY-999 not found")
        );
    }
}
