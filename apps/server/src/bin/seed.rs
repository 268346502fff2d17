//! Sample-data seeder for development and demos.
//!
//! Loads a small NAMASTE/ICD-11 corpus with confidence-scored concept
//! mappings, and optionally demo patients and doctors for exercising the
//! Condition endpoints. Every insert is conflict-ignoring, so re-running the
//! seeder against a populated database is a no-op.
//!
//! Usage:
//!   cargo run --bin setu-seed -- [--database-url <url>] [--with-clinical]

use anyhow::{Context, Result};
use clap::Parser;
use setu::config::Config;
use setu::db::TerminologyRepository;
use sqlx::PgPool;
use tracing::info;

#[derive(Parser, Debug)]
#[clap(name = "setu-seed")]
#[clap(about = "Seed the terminology database with sample data")]
struct Args {
    /// Database connection URL (or set DATABASE_URL env var)
    #[clap(short, long)]
    database_url: Option<String>,

    /// Also seed demo patients and doctors
    #[clap(long)]
    with_clinical: bool,
}

const NAMASTE_CODES: &[(&str, &str, &str, &str)] = &[
    ("AY-001", "Jwara", "ayurveda", "Fever - elevated body temperature"),
    ("AY-002", "Kasa", "ayurveda", "Cough - respiratory symptom"),
    ("AY-003", "Shwasa", "ayurveda", "Dyspnea - difficulty breathing"),
    ("AY-004", "Atisara", "ayurveda", "Diarrhea - loose stools"),
    ("AY-005", "Arsha", "ayurveda", "Hemorrhoids - piles"),
    ("SI-001", "Suram", "siddha", "Fever in Siddha medicine"),
    ("SI-002", "Irumal", "siddha", "Cough in Siddha medicine"),
    ("UN-001", "Humma", "unani", "Fever in Unani medicine"),
    ("UN-002", "Sual", "unani", "Cough in Unani medicine"),
];

const ICD11_CODES: &[(&str, &str, &str, &str)] = &[
    ("MG26", "Fever", "biomedicine", "Elevated body temperature"),
    ("MD12", "Cough", "biomedicine", "Respiratory symptom"),
    ("MD11", "Dyspnoea", "biomedicine", "Difficulty breathing"),
    ("DD70", "Diarrhoea", "biomedicine", "Loose or watery stools"),
    ("DB35", "Haemorrhoids", "biomedicine", "Swollen veins in rectum"),
    (
        "TM2-001",
        "Traditional Medicine Fever Pattern",
        "TM2",
        "TM2 fever classification",
    ),
];

const MAPPINGS: &[(&str, &str, f64)] = &[
    ("AY-001", "MG26", 0.95),
    ("AY-002", "MD12", 0.92),
    ("AY-003", "MD11", 0.90),
    ("AY-004", "DD70", 0.93),
    ("AY-005", "DB35", 0.94),
    ("SI-001", "MG26", 0.95),
    ("SI-002", "MD12", 0.92),
    ("UN-001", "MG26", 0.95),
    ("UN-002", "MD12", 0.92),
];

#[tokio::main]
async fn main() -> Result<()> {
    setu::logging::init_simple_logging();

    let args = Args::parse();

    let database_url = match args.database_url {
        Some(url) => url,
        None => {
            let config = Config::load().context("Failed to load configuration")?;
            config.database.url
        }
    };

    let pool = PgPool::connect(&database_url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to apply migrations")?;

    for (code, display, system, definition) in NAMASTE_CODES {
        sqlx::query(
            "INSERT INTO namaste_codes (code, display, system_type, definition)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (code) DO NOTHING",
        )
        .bind(code)
        .bind(display)
        .bind(system)
        .bind(definition)
        .execute(&pool)
        .await?;
    }
    info!(count = NAMASTE_CODES.len(), "Seeded NAMASTE codes");

    for (code, title, module, definition) in ICD11_CODES {
        sqlx::query(
            "INSERT INTO icd11_codes (icd_code, title, module, definition)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (icd_code) DO NOTHING",
        )
        .bind(code)
        .bind(title)
        .bind(module)
        .bind(definition)
        .execute(&pool)
        .await?;
    }
    info!(count = ICD11_CODES.len(), "Seeded ICD-11 codes");

    // Mapping inserts go through the repository so unknown codes fail loudly
    // and duplicate pairs stay no-ops.
    let repo = TerminologyRepository::new(pool.clone());
    let mut inserted = 0usize;
    for (namaste, icd, confidence) in MAPPINGS {
        if repo
            .insert_mapping(namaste, icd, Some(*confidence), Some("equivalent"))
            .await
            .with_context(|| format!("failed to map {namaste} -> {icd}"))?
        {
            inserted += 1;
        }
    }
    info!(
        count = MAPPINGS.len(),
        inserted, "Seeded concept mappings"
    );

    if args.with_clinical {
        sqlx::query(
            "INSERT INTO doctors (abha_id, name, license_number, specialization)
             VALUES ('ABHA-DR-001', 'Dr. Shruti Sharma', 'MH-AYU-12345', 'Kayachikitsa')
             ON CONFLICT (abha_id) DO NOTHING",
        )
        .execute(&pool)
        .await?;
        sqlx::query(
            "INSERT INTO patients (abha_id, name, date_of_birth, gender, contact_phone)
             VALUES ('ABHA-PT-001', 'Kabir Kumar', '1985-03-12', 'male', '+91-9876543210')
             ON CONFLICT (abha_id) DO NOTHING",
        )
        .execute(&pool)
        .await?;
        info!("Seeded demo doctor and patient");
    }

    info!("Database seeding complete");

    Ok(())
}
