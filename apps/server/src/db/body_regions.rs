//! Body-region repository - catalog reads and the derived mapping table the
//! classifier owns.
//!
//! `body_region_mappings` is regenerable cache: the rebuild deletes and
//! repopulates it inside one transaction, and every generated insert is
//! conflict-ignoring so duplicate evidence is a no-op rather than an error.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

/// Catalog row from `body_regions`.
#[derive(Debug, Clone, Serialize)]
pub struct RegionRow {
    pub id: Uuid,
    pub code: String,
    pub display_name: String,
    pub anatomical_system: Option<String>,
    pub description: Option<String>,
}

/// Catalog row with per-region mapping counts for the region listing.
#[derive(Debug, Clone, Serialize)]
pub struct RegionSummary {
    pub id: Uuid,
    pub code: String,
    pub display_name: String,
    pub anatomical_system: Option<String>,
    pub description: Option<String>,
    pub parent_region_id: Option<Uuid>,
    pub mapping_count: i64,
    pub verified_count: i64,
}

/// Full row from `body_region_mappings`.
#[derive(Debug, Clone, Serialize)]
pub struct MappingRecord {
    pub id: Uuid,
    pub body_region_id: Uuid,
    pub namaste_code: Option<String>,
    pub icd_code: Option<String>,
    pub relevance_score: f64,
    pub mapping_type: String,
    pub verified: bool,
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MappingRecord {
    fn from_row(row: &PgRow) -> Self {
        Self {
            id: row.get("id"),
            body_region_id: row.get("body_region_id"),
            namaste_code: row.get("namaste_code"),
            icd_code: row.get("icd_code"),
            relevance_score: row.get("relevance_score"),
            mapping_type: row.get("mapping_type"),
            verified: row.get("verified"),
            verified_by: row.get("verified_by"),
            verified_at: row.get("verified_at"),
            notes: row.get("notes"),
            created_at: row.get("created_at"),
        }
    }
}

/// One row of the region-diagnosis join, enriched with vocabulary displays.
#[derive(Debug, Clone)]
pub struct RegionDiagnosisRow {
    pub namaste_code: Option<String>,
    pub namaste_display: Option<String>,
    pub system_type: Option<String>,
    pub icd_code: Option<String>,
    pub icd_title: Option<String>,
    pub relevance_score: f64,
    pub mapping_type: String,
    pub verified: bool,
    pub notes: Option<String>,
}

/// A concept-mapping edge as consumed by the chapter strategy.
#[derive(Debug, Clone)]
pub struct EdgeRow {
    pub namaste_code: String,
    pub icd_code: String,
    pub confidence: Option<f64>,
}

/// Repository for body-region catalog and mapping queries.
#[derive(Clone)]
pub struct BodyRegionRepository {
    pool: PgPool,
}

impl BodyRegionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn begin_transaction(&self) -> Result<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(Error::Database)
    }

    /// All regions with mapping and verified counts, in catalog order.
    pub async fn regions_with_counts(&self) -> Result<Vec<RegionSummary>> {
        let rows = sqlx::query(
            "SELECT br.id, br.code, br.display_name, br.anatomical_system, br.description,
                    br.parent_region_id,
                    COUNT(brm.id) AS mapping_count,
                    COUNT(brm.id) FILTER (WHERE brm.verified) AS verified_count
             FROM body_regions br
             LEFT JOIN body_region_mappings brm ON br.id = brm.body_region_id
             GROUP BY br.id
             ORDER BY br.code",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| RegionSummary {
                id: r.get("id"),
                code: r.get("code"),
                display_name: r.get("display_name"),
                anatomical_system: r.get("anatomical_system"),
                description: r.get("description"),
                parent_region_id: r.get("parent_region_id"),
                mapping_count: r.get("mapping_count"),
                verified_count: r.get("verified_count"),
            })
            .collect())
    }

    pub async fn find_region(&self, code: &str) -> Result<Option<RegionRow>> {
        let row = sqlx::query(
            "SELECT id, code, display_name, anatomical_system, description
             FROM body_regions WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|r| RegionRow {
            id: r.get("id"),
            code: r.get("code"),
            display_name: r.get("display_name"),
            anatomical_system: r.get("anatomical_system"),
            description: r.get("description"),
        }))
    }

    /// The full catalog inside the rebuild transaction.
    pub async fn regions_tx(tx: &mut Transaction<'static, Postgres>) -> Result<Vec<(Uuid, String)>> {
        let rows: Vec<(Uuid, String)> =
            sqlx::query_as("SELECT id, code FROM body_regions ORDER BY code")
                .fetch_all(&mut **tx)
                .await
                .map_err(Error::Database)?;
        Ok(rows)
    }

    /// Wholesale reset of the derived table (start of a rebuild).
    pub async fn clear_mappings(tx: &mut Transaction<'static, Postgres>) -> Result<u64> {
        let deleted = sqlx::query("DELETE FROM body_region_mappings")
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?
            .rows_affected();
        Ok(deleted)
    }

    /// All mapping edges joined to their code strings, for the chapter
    /// strategy.
    pub async fn concept_edges(tx: &mut Transaction<'static, Postgres>) -> Result<Vec<EdgeRow>> {
        let rows = sqlx::query(
            "SELECT DISTINCT nc.code AS namaste_code, ic.icd_code, cm.confidence_score
             FROM concept_mappings cm
             JOIN namaste_codes nc ON cm.namaste_code_id = nc.id
             JOIN icd11_codes ic ON cm.icd11_code_id = ic.id",
        )
        .fetch_all(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| EdgeRow {
                namaste_code: r.get("namaste_code"),
                icd_code: r.get("icd_code"),
                confidence: r.get("confidence_score"),
            })
            .collect())
    }

    /// NAMASTE codes whose display contains the keyword, capped.
    pub async fn namaste_codes_matching(
        tx: &mut Transaction<'static, Postgres>,
        keyword: &str,
        cap: i64,
    ) -> Result<Vec<String>> {
        let pattern = format!("%{keyword}%");
        let codes: Vec<String> = sqlx::query_scalar(
            "SELECT code FROM namaste_codes WHERE display ILIKE $1 ORDER BY code LIMIT $2",
        )
        .bind(pattern)
        .bind(cap)
        .fetch_all(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(codes)
    }

    /// Insert one generated mapping; a duplicate tuple is a no-op. Returns
    /// whether a row was actually written.
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_generated(
        tx: &mut Transaction<'static, Postgres>,
        region_id: Uuid,
        namaste_code: Option<&str>,
        icd_code: Option<&str>,
        relevance: f64,
        mapping_type: &str,
        notes: &str,
    ) -> Result<bool> {
        let inserted = sqlx::query(
            "INSERT INTO body_region_mappings
                 (body_region_id, namaste_code, icd_code, relevance_score, mapping_type, verified, notes)
             VALUES ($1, $2, $3, $4, $5, false, $6)
             ON CONFLICT DO NOTHING",
        )
        .bind(region_id)
        .bind(namaste_code)
        .bind(icd_code)
        .bind(relevance)
        .bind(mapping_type)
        .bind(notes)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?
        .rows_affected();

        Ok(inserted > 0)
    }

    /// Region-diagnosis rows ordered by relevance then verification state.
    pub async fn region_diagnosis_rows(
        &self,
        region_id: Uuid,
        min_relevance: f64,
        verified_only: bool,
        limit: i64,
    ) -> Result<Vec<RegionDiagnosisRow>> {
        let mut qb: sqlx::QueryBuilder<'_, Postgres> = sqlx::QueryBuilder::new(
            "SELECT brm.namaste_code, nc.display AS namaste_display, nc.system_type,
                    brm.icd_code, ic.title AS icd_title,
                    brm.relevance_score, brm.mapping_type, brm.verified, brm.notes
             FROM body_region_mappings brm
             LEFT JOIN namaste_codes nc ON brm.namaste_code = nc.code
             LEFT JOIN icd11_codes ic ON brm.icd_code = ic.icd_code
             WHERE brm.body_region_id = ",
        );
        qb.push_bind(region_id);
        qb.push(" AND brm.relevance_score >= ");
        qb.push_bind(min_relevance);
        if verified_only {
            qb.push(" AND brm.verified = true");
        }
        qb.push(" ORDER BY brm.relevance_score DESC, brm.verified DESC, brm.namaste_code LIMIT ");
        qb.push_bind(limit);

        let rows = qb.build().fetch_all(&self.pool).await.map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| RegionDiagnosisRow {
                namaste_code: r.get("namaste_code"),
                namaste_display: r.get("namaste_display"),
                system_type: r.get("system_type"),
                icd_code: r.get("icd_code"),
                icd_title: r.get("icd_title"),
                relevance_score: r.get("relevance_score"),
                mapping_type: r.get("mapping_type"),
                verified: r.get("verified"),
                notes: r.get("notes"),
            })
            .collect())
    }

    /// Manual authoring path. Referential integrity rejects unknown codes; a
    /// duplicate tuple returns the existing row instead of erroring, keeping
    /// the insert boundary idempotent.
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_manual(
        &self,
        region_id: Uuid,
        namaste_code: Option<&str>,
        icd_code: Option<&str>,
        relevance: f64,
        mapping_type: &str,
        verified_by: Option<&str>,
        notes: Option<&str>,
    ) -> Result<MappingRecord> {
        let row = sqlx::query(
            "INSERT INTO body_region_mappings
                 (body_region_id, namaste_code, icd_code, relevance_score, mapping_type,
                  verified, verified_by, verified_at, notes)
             VALUES ($1, $2, $3, $4, $5, true, $6, now(), $7)
             ON CONFLICT DO NOTHING
             RETURNING *",
        )
        .bind(region_id)
        .bind(namaste_code)
        .bind(icd_code)
        .bind(relevance)
        .bind(mapping_type)
        .bind(verified_by)
        .bind(notes)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_fk_violation)?;

        if let Some(row) = row {
            return Ok(MappingRecord::from_row(&row));
        }

        // Conflict: the tuple already exists, hand back the current row.
        let existing = sqlx::query(
            "SELECT * FROM body_region_mappings
             WHERE body_region_id = $1
               AND namaste_code IS NOT DISTINCT FROM $2
               AND icd_code IS NOT DISTINCT FROM $3",
        )
        .bind(region_id)
        .bind(namaste_code)
        .bind(icd_code)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(MappingRecord::from_row(&existing))
    }

    /// One-way verification flip. Already-verified rows keep their original
    /// verifier and timestamp.
    pub async fn verify(
        &self,
        id: Uuid,
        verified_by: Option<&str>,
    ) -> Result<Option<MappingRecord>> {
        let row = sqlx::query(
            "UPDATE body_region_mappings
             SET verified = true,
                 verified_by = CASE WHEN verified THEN verified_by ELSE $2 END,
                 verified_at = CASE WHEN verified THEN verified_at ELSE now() END
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(verified_by)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|r| MappingRecord::from_row(&r)))
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM body_region_mappings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?
            .rows_affected();
        Ok(deleted > 0)
    }
}

/// Foreign-key violations on the manual path mean the referenced code string
/// does not exist in its vocabulary table.
fn map_fk_violation(err: sqlx::Error) -> Error {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.code().as_deref() == Some("23503") {
            return Error::NotFound(
                "referenced code does not exist in its vocabulary table".to_string(),
            );
        }
    }
    Error::Database(err)
}
