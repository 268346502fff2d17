//! Body-region classifier: batch inference of code → region mappings.
//!
//! A rebuild recomputes the whole `body_region_mappings` table from scratch
//! inside one transaction: delete everything, then for each of the six
//! regions run two independent strategies and record their provenance.
//!
//! Strategy A (structural): every concept-mapping edge is classified by the
//! chapter prefix of its ICD-11 code; a hit inserts a `primary` row carrying
//! both codes, scored with the edge's confidence.
//!
//! Strategy B (lexical): each region's keyword list is substring-matched
//! against NAMASTE display texts; a hit inserts a `secondary` row carrying
//! only the NAMASTE code at a fixed relevance.
//!
//! Duplicate tuples are no-ops at the storage layer, so a code backed by both
//! strategies keeps two rows (dual provenance), and a code may land in more
//! than one region when the evidence points different ways. Running the
//! transaction end-to-end means readers never see the cleared table and a
//! crashed run rolls back; rebuilds must still not interleave, so concurrent
//! invocations are rejected by a single-flight guard.

use crate::db::body_regions::{
    BodyRegionRepository, MappingRecord, RegionDiagnosisRow, RegionRow, RegionSummary,
};
use crate::{Error, Result};
use serde::Serialize;
use setu_terminology::regions::{
    region_for_icd, BodyRegion, MappingOrigin, DEFAULT_CHAPTER_RELEVANCE, KEYWORD_MATCH_CAP,
    KEYWORD_RELEVANCE,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Per-region rebuild counts, split by strategy.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RegionStats {
    pub chapter: u64,
    pub keyword: u64,
    pub total: u64,
}

/// Full rebuild report: per-region stats plus the grand total.
#[derive(Debug, Clone, Serialize)]
pub struct RebuildReport {
    pub regions: BTreeMap<String, RegionStats>,
    pub total: u64,
}

/// One diagnosis in a region, with its ICD-11 sub-entries nested.
#[derive(Debug, Clone, Serialize)]
pub struct RegionDiagnosis {
    pub namaste_code: String,
    pub namaste_display: Option<String>,
    pub system_type: Option<String>,
    pub relevance_score: f64,
    pub mapping_type: String,
    pub verified: bool,
    pub notes: Option<String>,
    pub mappings: Vec<RegionIcdMapping>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionIcdMapping {
    pub icd_code: String,
    pub icd_title: Option<String>,
}

/// Region lookup response: the region plus its grouped diagnoses.
#[derive(Debug, Clone, Serialize)]
pub struct RegionDiagnoses {
    pub region: RegionRow,
    pub diagnoses: Vec<RegionDiagnosis>,
    pub total: usize,
}

/// Parameters of the manual mapping path.
#[derive(Debug, Clone)]
pub struct ManualMapping {
    pub namaste_code: Option<String>,
    pub icd_code: Option<String>,
    pub relevance_score: f64,
    pub mapping_type: String,
    pub verified_by: Option<String>,
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct BodyRegionMapper {
    repo: BodyRegionRepository,
    rebuild_guard: Arc<tokio::sync::Mutex<()>>,
}

impl BodyRegionMapper {
    pub fn new(repo: BodyRegionRepository) -> Self {
        Self {
            repo,
            rebuild_guard: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Recompute all region mappings from scratch. Rejected with a conflict
    /// while another rebuild is running; any failure mid-run aborts the whole
    /// batch (the transaction rolls back) and is surfaced to the operator.
    pub async fn rebuild(&self) -> Result<RebuildReport> {
        let _guard = self.rebuild_guard.try_lock().map_err(|_| {
            Error::Conflict("body-region rebuild already in progress".to_string())
        })?;

        let started = Instant::now();
        let report = match self.run_rebuild().await {
            Ok(report) => report,
            Err(err) => {
                return Err(Error::BatchAborted(format!(
                    "body-region rebuild failed: {err}"
                )))
            }
        };

        tracing::info!(
            total = report.total,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Body-region rebuild complete"
        );

        Ok(report)
    }

    async fn run_rebuild(&self) -> Result<RebuildReport> {
        let mut tx = self.repo.begin_transaction().await?;

        let catalog = BodyRegionRepository::regions_tx(&mut tx).await?;
        let region_ids: HashMap<&str, Uuid> = catalog
            .iter()
            .map(|(id, code)| (code.as_str(), *id))
            .collect();
        for region in BodyRegion::ALL {
            if !region_ids.contains_key(region.as_str()) {
                return Err(Error::NotFound(format!(
                    "body region '{region}' missing from catalog"
                )));
            }
        }

        let deleted = BodyRegionRepository::clear_mappings(&mut tx).await?;
        tracing::info!(deleted, "Cleared existing body-region mappings");

        let edges = BodyRegionRepository::concept_edges(&mut tx).await?;

        let mut regions = BTreeMap::new();
        let mut total = 0u64;

        for region in BodyRegion::ALL {
            let region_id = region_ids[region.as_str()];
            let mut stats = RegionStats::default();

            // Strategy A: ICD-11 chapter classification over mapping edges.
            for edge in &edges {
                let Some((chapter, mapped)) = region_for_icd(&edge.icd_code) else {
                    continue;
                };
                if mapped != region {
                    continue;
                }
                let note = format!("ICD chapter {chapter} -> {region}");
                let inserted = BodyRegionRepository::insert_generated(
                    &mut tx,
                    region_id,
                    Some(&edge.namaste_code),
                    Some(&edge.icd_code),
                    edge.confidence.unwrap_or(DEFAULT_CHAPTER_RELEVANCE),
                    MappingOrigin::Primary.as_str(),
                    &note,
                )
                .await?;
                if inserted {
                    stats.chapter += 1;
                }
            }

            // Strategy B: keyword matching over NAMASTE display texts.
            for keyword in region.keywords() {
                let codes = BodyRegionRepository::namaste_codes_matching(
                    &mut tx,
                    keyword,
                    KEYWORD_MATCH_CAP,
                )
                .await?;
                for code in codes {
                    let note = format!("keyword match: \"{keyword}\"");
                    let inserted = BodyRegionRepository::insert_generated(
                        &mut tx,
                        region_id,
                        Some(&code),
                        None,
                        KEYWORD_RELEVANCE,
                        MappingOrigin::Secondary.as_str(),
                        &note,
                    )
                    .await?;
                    if inserted {
                        stats.keyword += 1;
                    }
                }
            }

            stats.total = stats.chapter + stats.keyword;
            total += stats.total;
            tracing::info!(
                region = %region,
                chapter = stats.chapter,
                keyword = stats.keyword,
                "Region classified"
            );
            regions.insert(region.as_str().to_string(), stats);
        }

        tx.commit().await.map_err(Error::Database)?;

        Ok(RebuildReport { regions, total })
    }

    pub async fn list_regions(&self) -> Result<Vec<RegionSummary>> {
        self.repo.regions_with_counts().await
    }

    /// Diagnoses mapped to a region, grouped per NAMASTE code with ICD-11
    /// sub-entries nested. Rows without a NAMASTE code are skipped; the
    /// grouping key is always the NAMASTE code.
    pub async fn diagnoses_for_region(
        &self,
        region_code: &str,
        verified_only: bool,
        min_relevance: f64,
        limit: i64,
    ) -> Result<RegionDiagnoses> {
        let region = self
            .repo
            .find_region(region_code)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Body region {region_code} not found")))?;

        let rows = self
            .repo
            .region_diagnosis_rows(region.id, min_relevance, verified_only, limit.max(0))
            .await?;

        let diagnoses = group_region_rows(rows);
        let total = diagnoses.len();

        Ok(RegionDiagnoses {
            region,
            diagnoses,
            total,
        })
    }

    /// Manual authoring path: insert a curated mapping, auto-verified.
    pub async fn create_mapping(
        &self,
        region_code: &str,
        mapping: ManualMapping,
    ) -> Result<MappingRecord> {
        if mapping.namaste_code.is_none() && mapping.icd_code.is_none() {
            return Err(Error::Validation(
                "must provide either namaste_code or icd_code".to_string(),
            ));
        }
        if !matches!(mapping.mapping_type.as_str(), "primary" | "secondary") {
            return Err(Error::Validation(format!(
                "mapping_type '{}' must be primary or secondary",
                mapping.mapping_type
            )));
        }
        if !(0.0..=1.0).contains(&mapping.relevance_score) {
            return Err(Error::Validation(
                "relevance_score must be within [0, 1]".to_string(),
            ));
        }

        let region = self
            .repo
            .find_region(region_code)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Body region {region_code} not found")))?;

        self.repo
            .insert_manual(
                region.id,
                mapping.namaste_code.as_deref(),
                mapping.icd_code.as_deref(),
                mapping.relevance_score,
                &mapping.mapping_type,
                mapping.verified_by.as_deref(),
                mapping.notes.as_deref(),
            )
            .await
    }

    /// One-way verification flip (unverified → verified, never back).
    pub async fn verify_mapping(
        &self,
        id: Uuid,
        verified_by: Option<&str>,
    ) -> Result<MappingRecord> {
        self.repo
            .verify(id, verified_by)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Mapping {id} not found")))
    }

    pub async fn delete_mapping(&self, id: Uuid) -> Result<()> {
        if self.repo.delete(id).await? {
            Ok(())
        } else {
            Err(Error::NotFound(format!("Mapping {id} not found")))
        }
    }
}

/// Group mapping rows per NAMASTE code, nesting the ICD-11 sub-entries.
/// Rows lacking a NAMASTE code have no grouping key and are dropped.
fn group_region_rows(rows: Vec<RegionDiagnosisRow>) -> Vec<RegionDiagnosis> {
    let mut groups: Vec<RegionDiagnosis> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let Some(namaste_code) = row.namaste_code else {
            continue;
        };

        let at = *index.entry(namaste_code.clone()).or_insert_with(|| {
            groups.push(RegionDiagnosis {
                namaste_code,
                namaste_display: row.namaste_display.clone(),
                system_type: row.system_type.clone(),
                relevance_score: row.relevance_score,
                mapping_type: row.mapping_type.clone(),
                verified: row.verified,
                notes: row.notes.clone(),
                mappings: Vec::new(),
            });
            groups.len() - 1
        });

        if let Some(icd_code) = row.icd_code {
            groups[at].mappings.push(RegionIcdMapping {
                icd_code,
                icd_title: row.icd_title,
            });
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(
        namaste: Option<&str>,
        icd: Option<&str>,
        relevance: f64,
        mapping_type: &str,
    ) -> RegionDiagnosisRow {
        RegionDiagnosisRow {
            namaste_code: namaste.map(String::from),
            namaste_display: namaste.map(|c| format!("{c} display")),
            system_type: namaste.map(|_| "ayurveda".to_string()),
            icd_code: icd.map(String::from),
            icd_title: icd.map(|c| format!("{c} title")),
            relevance_score: relevance,
            mapping_type: mapping_type.to_string(),
            verified: false,
            notes: None,
        }
    }

    #[test]
    fn groups_dual_provenance_rows_under_one_diagnosis() {
        let rows = vec![
            row(Some("AY-002"), Some("MD12"), 0.92, "primary"),
            row(Some("AY-002"), None, 0.7, "secondary"),
        ];
        let groups = group_region_rows(rows);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].namaste_code, "AY-002");
        // The first row seen (highest relevance, query-ordered) wins the
        // group header; only rows with an icd_code contribute sub-entries.
        assert_eq!(groups[0].relevance_score, 0.92);
        assert_eq!(groups[0].mappings.len(), 1);
        assert_eq!(groups[0].mappings[0].icd_code, "MD12");
    }

    #[test]
    fn rows_without_namaste_code_are_skipped() {
        let rows = vec![
            row(None, Some("MD12"), 1.0, "primary"),
            row(Some("AY-001"), None, 0.7, "secondary"),
        ];
        let groups = group_region_rows(rows);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].namaste_code, "AY-001");
    }

    #[test]
    fn distinct_codes_stay_distinct() {
        let rows = vec![
            row(Some("AY-001"), Some("MG26"), 0.95, "primary"),
            row(Some("AY-002"), Some("MD12"), 0.92, "primary"),
        ];
        let groups = group_region_rows(rows);
        assert_eq!(groups.len(), 2);
    }
}
