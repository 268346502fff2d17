//! Search and translation orchestration over the terminology store.

use crate::db::terminology::{CorpusStats, DiagnosisRow, MappingListRow, TerminologyRepository};
use crate::Result;
use serde::Serialize;
use setu_terminology::{
    normalize::fold_diacritics, SearchHit, SystemType, TranslationCandidate, Vocabulary,
};
use std::collections::HashMap;

/// A diagnosis-search result: one NAMASTE code with its nested ICD-11
/// mapping candidates.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosisGroup {
    pub namaste_code: String,
    pub namaste_display: String,
    pub system_type: SystemType,
    pub namaste_definition: Option<String>,
    pub mappings: Vec<DiagnosisMapping>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosisMapping {
    pub icd_code: String,
    pub icd_title: Option<String>,
    pub icd_module: Option<String>,
    pub icd_definition: Option<String>,
    pub confidence_score: Option<f64>,
    pub mapping_type: Option<String>,
}

#[derive(Clone)]
pub struct TerminologyService {
    repo: TerminologyRepository,
}

impl TerminologyService {
    pub fn new(repo: TerminologyRepository) -> Self {
        Self { repo }
    }

    /// Autocomplete across one or both vocabularies. With no vocabulary
    /// given, the limit is split between NAMASTE and ICD-11 and the result
    /// lists are merged.
    pub async fn search_codes(
        &self,
        filter: &str,
        vocabulary: Option<Vocabulary>,
        limit: i64,
    ) -> Result<Vec<SearchHit>> {
        let limit = limit.max(0);
        match vocabulary {
            Some(Vocabulary::Namaste) => {
                self.repo
                    .search_namaste(&fold_diacritics(filter), limit)
                    .await
            }
            Some(Vocabulary::Icd11) => self.repo.search_icd11(filter, limit).await,
            None => {
                let half = (limit + 1) / 2;
                let mut hits = self
                    .repo
                    .search_namaste(&fold_diacritics(filter), half)
                    .await?;
                hits.extend(self.repo.search_icd11(filter, half).await?);
                Ok(hits)
            }
        }
    }

    /// Translate a code between the vocabularies. An unmapped (or unknown)
    /// code yields an empty list, not an error.
    pub async fn translate(
        &self,
        code: &str,
        source: Vocabulary,
        target: Vocabulary,
    ) -> Result<Vec<TranslationCandidate>> {
        match (source, target) {
            (Vocabulary::Namaste, Vocabulary::Icd11) => {
                self.repo.translate_namaste_to_icd11(code).await
            }
            (Vocabulary::Icd11, Vocabulary::Namaste) => {
                self.repo.translate_icd11_to_namaste(code).await
            }
            _ => Ok(Vec::new()),
        }
    }

    /// Diagnosis search: NAMASTE hits carrying their nested ICD-11 mapping
    /// candidates, codes with more mappings first. Queries under two
    /// characters return nothing.
    pub async fn diagnosis_search(
        &self,
        query: &str,
        system: Option<SystemType>,
        limit: i64,
    ) -> Result<Vec<DiagnosisGroup>> {
        if query.trim().chars().count() < 2 {
            return Ok(Vec::new());
        }

        let rows = self
            .repo
            .diagnosis_rows(&fold_diacritics(query), system, limit.max(0))
            .await?;

        Ok(group_diagnosis_rows(rows))
    }

    pub async fn stats(&self) -> Result<CorpusStats> {
        self.repo.stats().await
    }

    pub async fn mappings_page(
        &self,
        system: Option<SystemType>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<MappingListRow>, i64)> {
        self.repo.list_mappings(system, limit, offset).await
    }
}

/// Group join rows per NAMASTE code (preserving query order within a group)
/// and sort groups by mapping count descending, then display text.
fn group_diagnosis_rows(rows: Vec<DiagnosisRow>) -> Vec<DiagnosisGroup> {
    let mut groups: Vec<DiagnosisGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let at = *index.entry(row.namaste_code.clone()).or_insert_with(|| {
            groups.push(DiagnosisGroup {
                namaste_code: row.namaste_code.clone(),
                namaste_display: row.namaste_display.clone(),
                system_type: row.system_type,
                namaste_definition: row.namaste_definition.clone(),
                mappings: Vec::new(),
            });
            groups.len() - 1
        });

        if let Some(icd_code) = row.icd_code {
            groups[at].mappings.push(DiagnosisMapping {
                icd_code,
                icd_title: row.icd_title,
                icd_module: row.icd_module,
                icd_definition: row.icd_definition,
                confidence_score: row.confidence_score,
                mapping_type: row.mapping_type,
            });
        }
    }

    groups.sort_by(|a, b| {
        b.mappings
            .len()
            .cmp(&a.mappings.len())
            .then_with(|| a.namaste_display.cmp(&b.namaste_display))
    });
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(code: &str, display: &str, icd: Option<&str>) -> DiagnosisRow {
        DiagnosisRow {
            namaste_code: code.to_string(),
            namaste_display: display.to_string(),
            system_type: SystemType::Ayurveda,
            namaste_definition: None,
            icd_code: icd.map(String::from),
            icd_title: icd.map(|c| format!("{c} title")),
            icd_module: icd.map(|_| "biomedicine".to_string()),
            icd_definition: None,
            confidence_score: icd.map(|_| 0.9),
            mapping_type: None,
        }
    }

    #[test]
    fn groups_rows_per_code_and_nests_mappings() {
        let rows = vec![
            row("AY-001", "Jwara", Some("MG26")),
            row("AY-001", "Jwara", Some("TM2-001")),
            row("AY-010", "Jwaraghna", None),
        ];
        let groups = group_diagnosis_rows(rows);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].namaste_code, "AY-001");
        assert_eq!(groups[0].mappings.len(), 2);
        assert_eq!(groups[1].namaste_code, "AY-010");
        assert!(groups[1].mappings.is_empty());
    }

    #[test]
    fn codes_with_more_mappings_rank_first() {
        let rows = vec![
            row("AY-010", "Aruchi", None),
            row("AY-001", "Jwara", Some("MG26")),
        ];
        let groups = group_diagnosis_rows(rows);
        assert_eq!(groups[0].namaste_code, "AY-001");
        assert_eq!(groups[1].namaste_code, "AY-010");
    }

    #[test]
    fn equal_mapping_counts_fall_back_to_display_order() {
        let rows = vec![
            row("AY-020", "Kasa", Some("MD12")),
            row("AY-001", "Jwara", Some("MG26")),
        ];
        let groups = group_diagnosis_rows(rows);
        assert_eq!(groups[0].namaste_display, "Jwara");
        assert_eq!(groups[1].namaste_display, "Kasa");
    }
}
