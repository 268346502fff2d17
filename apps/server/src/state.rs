//! Shared application state handed to every handler.

use crate::{
    config::Config,
    db::{self, BodyRegionRepository, ClinicalRepository, TerminologyRepository},
    services::{
        body_mapper::BodyRegionMapper, fhir::FhirService, prediction::PredictionService,
        terminology::TerminologyService,
    },
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: sqlx::PgPool,
    pub terminology: TerminologyService,
    pub fhir: FhirService,
    pub body_mapper: BodyRegionMapper,
    pub prediction: PredictionService,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let pool = db::connect(&config.database).await?;

        if config.database.run_migrations {
            sqlx::migrate!("./migrations").run(&pool).await?;
            tracing::info!("Database migrations applied");
        }

        let terminology_repo = TerminologyRepository::new(pool.clone());
        let body_region_repo = BodyRegionRepository::new(pool.clone());
        let clinical_repo = ClinicalRepository::new(pool.clone());

        let terminology = TerminologyService::new(terminology_repo.clone());
        let fhir = FhirService::new(
            terminology_repo.clone(),
            terminology.clone(),
            clinical_repo,
        );
        let body_mapper = BodyRegionMapper::new(body_region_repo);
        let prediction = PredictionService::new(&config.prediction)?;

        Ok(Self {
            config: Arc::new(config),
            pool,
            terminology,
            fhir,
            body_mapper,
            prediction,
        })
    }
}
