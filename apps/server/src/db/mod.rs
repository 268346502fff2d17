//! Database layer - repositories and data access

pub mod body_regions;
pub mod clinical;
pub mod terminology;

pub use body_regions::BodyRegionRepository;
pub use clinical::ClinicalRepository;
pub use terminology::TerminologyRepository;

use crate::config::DatabaseConfig;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Create the shared connection pool.
pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .min_connections(config.pool_min_size)
        .max_connections(config.pool_max_size)
        .acquire_timeout(Duration::from_secs(config.pool_timeout_seconds))
        .connect(&config.url)
        .await?;

    Ok(pool)
}
