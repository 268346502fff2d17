//! Terminology repository - database access for the two vocabularies and the
//! concept mappings between them.
//!
//! Search predicates match both the diacritic-folded and the raw form of the
//! stored display text; the folded side uses the same character tables as the
//! in-process folding so both agree on one canonical form. Optional filters
//! are composed with `sqlx::QueryBuilder` so parameter indexes are never
//! managed by hand.

use crate::{Error, Result};
use serde::Serialize;
use setu_terminology::{
    codes::{Icd11Concept, MappingRow, NamasteConcept, SearchHit, TranslationCandidate},
    normalize::{SQL_FOLD_FROM, SQL_FOLD_TO},
    SystemType, Vocabulary,
};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

/// Full row from `namaste_codes`.
#[derive(Debug, Clone)]
pub struct NamasteRow {
    pub id: Uuid,
    pub code: String,
    pub display: String,
    pub system_type: SystemType,
    pub definition: Option<String>,
}

/// Full row from `icd11_codes`.
#[derive(Debug, Clone)]
pub struct Icd11Row {
    pub id: Uuid,
    pub icd_code: String,
    pub title: String,
    pub module: String,
    pub definition: Option<String>,
}

/// One row of the diagnosis-search join: a NAMASTE hit with at most one of
/// its ICD-11 mapping candidates (the service groups rows per code).
#[derive(Debug, Clone)]
pub struct DiagnosisRow {
    pub namaste_code: String,
    pub namaste_display: String,
    pub system_type: SystemType,
    pub namaste_definition: Option<String>,
    pub icd_code: Option<String>,
    pub icd_title: Option<String>,
    pub icd_module: Option<String>,
    pub icd_definition: Option<String>,
    pub confidence_score: Option<f64>,
    pub mapping_type: Option<String>,
}

/// Corpus statistics for `/api/stats`.
#[derive(Debug, Clone, Serialize)]
pub struct CorpusStats {
    pub namaste_total: i64,
    pub ayurveda: i64,
    pub siddha: i64,
    pub unani: i64,
    pub icd11_total: i64,
    pub mapping_total: i64,
    pub mapped_namaste_codes: i64,
    pub average_confidence: Option<f64>,
}

/// One row of the paginated mapping browser.
#[derive(Debug, Clone, Serialize)]
pub struct MappingListRow {
    pub namaste_code: String,
    pub namaste_display: String,
    pub system_type: SystemType,
    pub icd_code: String,
    pub icd_title: String,
    pub module: String,
    pub confidence_score: Option<f64>,
    pub mapping_type: Option<String>,
}

/// Repository for vocabulary and concept-mapping queries.
#[derive(Clone)]
pub struct TerminologyRepository {
    pool: PgPool,
}

impl TerminologyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// SQL expression folding a column the same way
    /// [`setu_terminology::normalize::fold_diacritics`] folds queries.
    fn fold_expr(qb: &mut QueryBuilder<'_, Postgres>, column: &str) {
        qb.push("translate(lower(");
        qb.push(column);
        qb.push("), ");
        qb.push_bind(SQL_FOLD_FROM);
        qb.push(", ");
        qb.push_bind(SQL_FOLD_TO);
        qb.push(")");
    }

    /// Autocomplete over NAMASTE displays and codes. `folded` must already be
    /// run through `fold_diacritics`; prefix matches rank before substring
    /// matches, ties break on display text.
    pub async fn search_namaste(&self, folded: &str, limit: i64) -> Result<Vec<SearchHit>> {
        let contains = format!("%{folded}%");
        let prefix = format!("{folded}%");

        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT code, display, system_type, definition FROM namaste_codes WHERE (");
        Self::fold_expr(&mut qb, "display");
        qb.push(" LIKE ");
        qb.push_bind(contains.clone());
        qb.push(" OR lower(display) LIKE ");
        qb.push_bind(contains.clone());
        qb.push(" OR lower(code) LIKE ");
        qb.push_bind(contains);
        qb.push(") ORDER BY CASE WHEN ");
        Self::fold_expr(&mut qb, "display");
        qb.push(" LIKE ");
        qb.push_bind(prefix.clone());
        qb.push(" OR lower(display) LIKE ");
        qb.push_bind(prefix);
        qb.push(" THEN 0 ELSE 1 END, display LIMIT ");
        qb.push_bind(limit);

        let rows = qb.build().fetch_all(&self.pool).await.map_err(Error::Database)?;

        rows.into_iter()
            .map(|r| {
                Ok(SearchHit {
                    vocabulary: Vocabulary::Namaste,
                    code: r.get("code"),
                    display: r.get("display"),
                    kind: r.get("system_type"),
                    definition: r.get("definition"),
                })
            })
            .collect()
    }

    /// Autocomplete over ICD-11 titles and codes.
    pub async fn search_icd11(&self, filter: &str, limit: i64) -> Result<Vec<SearchHit>> {
        let lowered = filter.trim().to_lowercase();
        let contains = format!("%{lowered}%");
        let prefix = format!("{lowered}%");

        let rows = sqlx::query(
            "SELECT icd_code, title, module, definition
             FROM icd11_codes
             WHERE lower(title) LIKE $1 OR lower(icd_code) LIKE $1
             ORDER BY
                 CASE WHEN lower(title) LIKE $2 THEN 0 ELSE 1 END,
                 title
             LIMIT $3",
        )
        .bind(&contains)
        .bind(&prefix)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| SearchHit {
                vocabulary: Vocabulary::Icd11,
                code: r.get("icd_code"),
                display: r.get("title"),
                kind: r.get("module"),
                definition: r.get("definition"),
            })
            .collect())
    }

    /// NAMASTE -> ICD-11 translation candidates, best confidence first.
    pub async fn translate_namaste_to_icd11(
        &self,
        code: &str,
    ) -> Result<Vec<TranslationCandidate>> {
        let rows = sqlx::query(
            "SELECT ic.icd_code, ic.title, ic.module, cm.confidence_score, cm.mapping_type
             FROM concept_mappings cm
             JOIN namaste_codes nc ON cm.namaste_code_id = nc.id
             JOIN icd11_codes ic ON cm.icd11_code_id = ic.id
             WHERE nc.code = $1
             ORDER BY cm.confidence_score DESC NULLS LAST",
        )
        .bind(code)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| TranslationCandidate {
                code: r.get("icd_code"),
                display: r.get("title"),
                kind: r.get("module"),
                confidence: r.get::<Option<f64>, _>("confidence_score").unwrap_or(1.0),
                mapping_type: r.get("mapping_type"),
            })
            .collect())
    }

    /// ICD-11 -> NAMASTE translation candidates, best confidence first.
    pub async fn translate_icd11_to_namaste(
        &self,
        code: &str,
    ) -> Result<Vec<TranslationCandidate>> {
        let rows = sqlx::query(
            "SELECT nc.code, nc.display, nc.system_type, cm.confidence_score, cm.mapping_type
             FROM concept_mappings cm
             JOIN namaste_codes nc ON cm.namaste_code_id = nc.id
             JOIN icd11_codes ic ON cm.icd11_code_id = ic.id
             WHERE ic.icd_code = $1
             ORDER BY cm.confidence_score DESC NULLS LAST",
        )
        .bind(code)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| TranslationCandidate {
                code: r.get("code"),
                display: r.get("display"),
                kind: r.get("system_type"),
                confidence: r.get::<Option<f64>, _>("confidence_score").unwrap_or(1.0),
                mapping_type: r.get("mapping_type"),
            })
            .collect())
    }

    pub async fn find_namaste(&self, code: &str) -> Result<Option<NamasteRow>> {
        let row = sqlx::query(
            "SELECT id, code, display, system_type, definition FROM namaste_codes WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(|r| {
            Ok(NamasteRow {
                id: r.get("id"),
                code: r.get("code"),
                display: r.get("display"),
                system_type: parse_system_type(&r.get::<String, _>("system_type"))?,
                definition: r.get("definition"),
            })
        })
        .transpose()
    }

    pub async fn find_icd11(&self, icd_code: &str) -> Result<Option<Icd11Row>> {
        let row = sqlx::query(
            "SELECT id, icd_code, title, module, definition FROM icd11_codes WHERE icd_code = $1",
        )
        .bind(icd_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|r| Icd11Row {
            id: r.get("id"),
            icd_code: r.get("icd_code"),
            title: r.get("title"),
            module: r.get("module"),
            definition: r.get("definition"),
        }))
    }

    /// All NAMASTE concepts, optionally filtered to one stream, in code order
    /// (CodeSystem materialization).
    pub async fn list_namaste(&self, system: Option<SystemType>) -> Result<Vec<NamasteConcept>> {
        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT code, display, system_type, definition FROM namaste_codes");
        if let Some(system) = system {
            qb.push(" WHERE system_type = ");
            qb.push_bind(system.as_str());
        }
        qb.push(" ORDER BY code");

        let rows = qb.build().fetch_all(&self.pool).await.map_err(Error::Database)?;

        rows.into_iter()
            .map(|r| {
                Ok(NamasteConcept {
                    code: r.get("code"),
                    display: r.get("display"),
                    system_type: parse_system_type(&r.get::<String, _>("system_type"))?,
                    definition: r.get("definition"),
                })
            })
            .collect()
    }

    /// All ICD-11 concepts, optionally filtered to one module, in code order.
    pub async fn list_icd11(&self, module: Option<&str>) -> Result<Vec<Icd11Concept>> {
        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT icd_code, title, module, definition FROM icd11_codes");
        if let Some(module) = module {
            qb.push(" WHERE module = ");
            qb.push_bind(module.to_string());
        }
        qb.push(" ORDER BY icd_code");

        let rows = qb.build().fetch_all(&self.pool).await.map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| Icd11Concept {
                icd_code: r.get("icd_code"),
                title: r.get("title"),
                module: r.get("module"),
                definition: r.get("definition"),
            })
            .collect())
    }

    /// All mapping edges joined with endpoint displays (ConceptMap
    /// materialization).
    pub async fn mapping_rows(&self, system: Option<SystemType>) -> Result<Vec<MappingRow>> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "SELECT nc.code AS namaste_code, nc.display AS namaste_display, nc.system_type,
                    ic.icd_code, ic.title AS icd_title, cm.confidence_score, cm.mapping_type
             FROM concept_mappings cm
             JOIN namaste_codes nc ON cm.namaste_code_id = nc.id
             JOIN icd11_codes ic ON cm.icd11_code_id = ic.id",
        );
        if let Some(system) = system {
            qb.push(" WHERE nc.system_type = ");
            qb.push_bind(system.as_str());
        }
        qb.push(" ORDER BY nc.code");

        let rows = qb.build().fetch_all(&self.pool).await.map_err(Error::Database)?;

        rows.into_iter()
            .map(|r| {
                Ok(MappingRow {
                    namaste_code: r.get("namaste_code"),
                    namaste_display: r.get("namaste_display"),
                    system_type: parse_system_type(&r.get::<String, _>("system_type"))?,
                    icd_code: r.get("icd_code"),
                    icd_title: r.get("icd_title"),
                    mapping_type: r.get("mapping_type"),
                    confidence: r.get("confidence_score"),
                })
            })
            .collect()
    }

    /// Diagnosis search join: NAMASTE matches with their mapping candidates,
    /// one row per (code, candidate). `folded` must already be folded.
    pub async fn diagnosis_rows(
        &self,
        folded: &str,
        system: Option<SystemType>,
        limit: i64,
    ) -> Result<Vec<DiagnosisRow>> {
        let contains = format!("%{folded}%");
        let prefix = format!("{folded}%");

        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "SELECT nc.code AS namaste_code, nc.display AS namaste_display, nc.system_type,
                    nc.definition AS namaste_definition,
                    ic.icd_code, ic.title AS icd_title, ic.module AS icd_module,
                    ic.definition AS icd_definition,
                    cm.confidence_score, cm.mapping_type
             FROM namaste_codes nc
             LEFT JOIN concept_mappings cm ON nc.id = cm.namaste_code_id
             LEFT JOIN icd11_codes ic ON cm.icd11_code_id = ic.id
             WHERE (",
        );
        Self::fold_expr(&mut qb, "nc.display");
        qb.push(" LIKE ");
        qb.push_bind(contains.clone());
        qb.push(" OR lower(nc.display) LIKE ");
        qb.push_bind(contains.clone());
        qb.push(" OR lower(nc.code) LIKE ");
        qb.push_bind(contains);
        qb.push(")");
        if let Some(system) = system {
            qb.push(" AND nc.system_type = ");
            qb.push_bind(system.as_str());
        }
        qb.push(" ORDER BY CASE WHEN ");
        Self::fold_expr(&mut qb, "nc.display");
        qb.push(" LIKE ");
        qb.push_bind(prefix);
        qb.push(" THEN 0 ELSE 1 END, nc.display, cm.confidence_score DESC NULLS LAST LIMIT ");
        qb.push_bind(limit);

        let rows = qb.build().fetch_all(&self.pool).await.map_err(Error::Database)?;

        rows.into_iter()
            .map(|r| {
                Ok(DiagnosisRow {
                    namaste_code: r.get("namaste_code"),
                    namaste_display: r.get("namaste_display"),
                    system_type: parse_system_type(&r.get::<String, _>("system_type"))?,
                    namaste_definition: r.get("namaste_definition"),
                    icd_code: r.get("icd_code"),
                    icd_title: r.get("icd_title"),
                    icd_module: r.get("icd_module"),
                    icd_definition: r.get("icd_definition"),
                    confidence_score: r.get("confidence_score"),
                    mapping_type: r.get("mapping_type"),
                })
            })
            .collect()
    }

    /// Insert a concept mapping by code. Missing codes are an error naming
    /// the identifier; a duplicate pair is a no-op (returns false).
    pub async fn insert_mapping(
        &self,
        namaste_code: &str,
        icd_code: &str,
        confidence: Option<f64>,
        mapping_type: Option<&str>,
    ) -> Result<bool> {
        let namaste_id: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM namaste_codes WHERE code = $1")
                .bind(namaste_code)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Database)?;
        let namaste_id = namaste_id
            .ok_or_else(|| Error::NotFound(format!("NAMASTE code {namaste_code} not found")))?;

        let icd_id: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM icd11_codes WHERE icd_code = $1")
                .bind(icd_code)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Database)?;
        let icd_id =
            icd_id.ok_or_else(|| Error::NotFound(format!("ICD-11 code {icd_code} not found")))?;

        let inserted = sqlx::query(
            "INSERT INTO concept_mappings (namaste_code_id, icd11_code_id, confidence_score, mapping_type)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (namaste_code_id, icd11_code_id) DO NOTHING",
        )
        .bind(namaste_id)
        .bind(icd_id)
        .bind(confidence)
        .bind(mapping_type)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?
        .rows_affected();

        Ok(inserted > 0)
    }

    /// Corpus counts for `/api/stats`.
    pub async fn stats(&self) -> Result<CorpusStats> {
        let row = sqlx::query(
            "SELECT
                (SELECT COUNT(*) FROM namaste_codes) AS namaste_total,
                (SELECT COUNT(*) FROM namaste_codes WHERE system_type = 'ayurveda') AS ayurveda,
                (SELECT COUNT(*) FROM namaste_codes WHERE system_type = 'siddha') AS siddha,
                (SELECT COUNT(*) FROM namaste_codes WHERE system_type = 'unani') AS unani,
                (SELECT COUNT(*) FROM icd11_codes) AS icd11_total,
                (SELECT COUNT(*) FROM concept_mappings) AS mapping_total,
                (SELECT COUNT(DISTINCT namaste_code_id) FROM concept_mappings) AS mapped_namaste_codes,
                (SELECT AVG(confidence_score) FROM concept_mappings) AS average_confidence",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(CorpusStats {
            namaste_total: row.get("namaste_total"),
            ayurveda: row.get("ayurveda"),
            siddha: row.get("siddha"),
            unani: row.get("unani"),
            icd11_total: row.get("icd11_total"),
            mapping_total: row.get("mapping_total"),
            mapped_namaste_codes: row.get("mapped_namaste_codes"),
            average_confidence: row.get("average_confidence"),
        })
    }

    /// Paginated mapping browser rows plus the total row count.
    pub async fn list_mappings(
        &self,
        system: Option<SystemType>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<MappingListRow>, i64)> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "SELECT nc.code AS namaste_code, nc.display AS namaste_display, nc.system_type,
                    ic.icd_code, ic.title AS icd_title, ic.module,
                    cm.confidence_score, cm.mapping_type
             FROM concept_mappings cm
             JOIN namaste_codes nc ON cm.namaste_code_id = nc.id
             JOIN icd11_codes ic ON cm.icd11_code_id = ic.id",
        );
        if let Some(system) = system {
            qb.push(" WHERE nc.system_type = ");
            qb.push_bind(system.as_str());
        }
        qb.push(" ORDER BY nc.display LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb.build().fetch_all(&self.pool).await.map_err(Error::Database)?;

        let mut count_qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "SELECT COUNT(*) FROM concept_mappings cm
             JOIN namaste_codes nc ON cm.namaste_code_id = nc.id",
        );
        if let Some(system) = system {
            count_qb.push(" WHERE nc.system_type = ");
            count_qb.push_bind(system.as_str());
        }
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;

        let mappings = rows
            .into_iter()
            .map(|r| {
                Ok(MappingListRow {
                    namaste_code: r.get("namaste_code"),
                    namaste_display: r.get("namaste_display"),
                    system_type: parse_system_type(&r.get::<String, _>("system_type"))?,
                    icd_code: r.get("icd_code"),
                    icd_title: r.get("icd_title"),
                    module: r.get("module"),
                    confidence_score: r.get("confidence_score"),
                    mapping_type: r.get("mapping_type"),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok((mappings, total))
    }
}

/// Stored `system_type` values are constrained by a CHECK; anything else is
/// data corruption, not caller error.
pub(crate) fn parse_system_type(value: &str) -> Result<SystemType> {
    value
        .parse()
        .map_err(|_| Error::Internal(format!("unexpected system_type '{value}' in database")))
}
