//! Clinical repository - patients, doctors and the treatment records the
//! Condition materializer reads. Treatments are written once on creation and
//! never mutated here.

use crate::db::terminology::parse_system_type;
use crate::{Error, Result};
use setu_terminology::{PersonRef, TreatmentRecord};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

/// Repository for clinical reads and treatment creation.
#[derive(Clone)]
pub struct ClinicalRepository {
    pool: PgPool,
}

impl ClinicalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_patient(&self, id: Uuid) -> Result<Option<PersonRef>> {
        let row = sqlx::query("SELECT id, name FROM patients WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(|r| PersonRef {
            id: r.get("id"),
            name: r.get("name"),
        }))
    }

    pub async fn find_doctor(&self, id: Uuid) -> Result<Option<PersonRef>> {
        let row = sqlx::query("SELECT id, name FROM doctors WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(|r| PersonRef {
            id: r.get("id"),
            name: r.get("name"),
        }))
    }

    /// Create a treatment record and return it joined with its code displays.
    pub async fn insert_treatment(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        namaste_code_id: Uuid,
        icd11_code_id: Option<Uuid>,
        clinical_notes: Option<&str>,
        consent_given: bool,
    ) -> Result<TreatmentRecord> {
        let row = sqlx::query(
            "INSERT INTO patient_treatments
                 (patient_id, doctor_id, namaste_code_id, icd11_code_id, clinical_notes,
                  consent_given, consent_timestamp)
             VALUES ($1, $2, $3, $4, $5, $6, CASE WHEN $6 THEN now() END)
             RETURNING id",
        )
        .bind(patient_id)
        .bind(doctor_id)
        .bind(namaste_code_id)
        .bind(icd11_code_id)
        .bind(clinical_notes)
        .bind(consent_given)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        let id: Uuid = row.get("id");
        let record = self
            .find_treatment(id)
            .await?
            .ok_or_else(|| Error::Internal(format!("treatment {id} vanished after insert")))?;
        Ok(record)
    }

    pub async fn find_treatment(&self, id: Uuid) -> Result<Option<TreatmentRecord>> {
        let row = sqlx::query(
            "SELECT pt.id, pt.status, pt.version, pt.encounter_date, pt.created_at, pt.updated_at,
                    pt.clinical_notes,
                    nc.code AS namaste_code, nc.display AS namaste_display,
                    nc.system_type AS namaste_system,
                    ic.icd_code AS icd11_code, ic.title AS icd11_title
             FROM patient_treatments pt
             LEFT JOIN namaste_codes nc ON pt.namaste_code_id = nc.id
             LEFT JOIN icd11_codes ic ON pt.icd11_code_id = ic.id
             WHERE pt.id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(|r| treatment_from_row(&r)).transpose()
    }

    /// A patient's treatments with code displays and the people involved,
    /// newest encounter first.
    pub async fn problem_list(
        &self,
        patient_id: Uuid,
        status: Option<&str>,
    ) -> Result<Vec<(TreatmentRecord, PersonRef, PersonRef)>> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "SELECT pt.id, pt.status, pt.version, pt.encounter_date, pt.created_at, pt.updated_at,
                    pt.clinical_notes,
                    nc.code AS namaste_code, nc.display AS namaste_display,
                    nc.system_type AS namaste_system,
                    ic.icd_code AS icd11_code, ic.title AS icd11_title,
                    p.id AS patient_id, p.name AS patient_name,
                    d.id AS doctor_id, d.name AS doctor_name
             FROM patient_treatments pt
             JOIN patients p ON pt.patient_id = p.id
             JOIN doctors d ON pt.doctor_id = d.id
             LEFT JOIN namaste_codes nc ON pt.namaste_code_id = nc.id
             LEFT JOIN icd11_codes ic ON pt.icd11_code_id = ic.id
             WHERE pt.patient_id = ",
        );
        qb.push_bind(patient_id);
        if let Some(status) = status {
            qb.push(" AND pt.status = ");
            qb.push_bind(status.to_string());
        }
        qb.push(" ORDER BY pt.encounter_date DESC");

        let rows = qb.build().fetch_all(&self.pool).await.map_err(Error::Database)?;

        rows.iter()
            .map(|r| {
                let treatment = treatment_from_row(r)?;
                let patient = PersonRef {
                    id: r.get("patient_id"),
                    name: r.get("patient_name"),
                };
                let doctor = PersonRef {
                    id: r.get("doctor_id"),
                    name: r.get("doctor_name"),
                };
                Ok((treatment, patient, doctor))
            })
            .collect()
    }
}

fn treatment_from_row(row: &sqlx::postgres::PgRow) -> Result<TreatmentRecord> {
    let namaste_system = row
        .get::<Option<String>, _>("namaste_system")
        .map(|s| parse_system_type(&s))
        .transpose()?;

    Ok(TreatmentRecord {
        id: row.get("id"),
        status: row.get("status"),
        version: row.get("version"),
        encounter_date: row.get("encounter_date"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        namaste_code: row.get("namaste_code"),
        namaste_display: row.get("namaste_display"),
        namaste_system,
        icd11_code: row.get("icd11_code"),
        icd11_title: row.get("icd11_title"),
        clinical_notes: row.get("clinical_notes"),
    })
}
