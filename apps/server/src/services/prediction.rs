//! Proxy to the external disease-prediction service. The upstream is a black
//! box reached over HTTP; an unreachable or misbehaving upstream surfaces as
//! a 503 with a retry hint, never as a crashed request.

use crate::config::PredictionConfig;
use crate::{Error, Result};
use serde_json::{json, Value};
use std::time::Duration;

#[derive(Clone)]
pub struct PredictionService {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl PredictionService {
    pub fn new(config: &PredictionConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.as_ref().map(|u| u.trim_end_matches('/').to_string()),
        })
    }

    /// Forward a symptom list to the upstream `/predict` endpoint and return
    /// its JSON response verbatim.
    pub async fn predict(&self, symptoms: &[String], model: Option<&str>) -> Result<Value> {
        let base_url = self.base_url.as_deref().ok_or_else(|| {
            Error::Upstream("disease-prediction service is not configured".to_string())
        })?;

        let response = self
            .client
            .post(format!("{base_url}/predict"))
            .json(&json!({ "symptoms": symptoms, "model": model }))
            .send()
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, "Prediction upstream unreachable");
                Error::Upstream("disease-prediction service is unreachable, retry later".to_string())
            })?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "Prediction upstream returned an error");
            return Err(Error::Upstream(format!(
                "disease-prediction service returned {}",
                response.status()
            )));
        }

        response.json().await.map_err(|err| {
            tracing::warn!(error = %err, "Prediction upstream returned malformed JSON");
            Error::Upstream("disease-prediction service returned a malformed response".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_upstream_is_a_503_not_a_panic() {
        let service = PredictionService::new(&PredictionConfig {
            url: None,
            timeout_seconds: 1,
        })
        .unwrap();

        let err = service.predict(&["fever".to_string()], None).await.unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let service = PredictionService::new(&PredictionConfig {
            url: Some("http://localhost:8001/".to_string()),
            timeout_seconds: 1,
        })
        .unwrap();
        assert_eq!(service.base_url.as_deref(), Some("http://localhost:8001"));
    }
}
