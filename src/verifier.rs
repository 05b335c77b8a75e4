//! Client for the Verifier service.
//!
//! Verifies that models behave as advertised, scores them, and tracks the
//! health of their providers. Every call is a thin typed wrapper over one
//! endpoint under `/api/v1/verifier`.

use crate::config::ClientConfig;
use crate::error::{Result, SdkError};
use crate::transport::{segment, take_field, Method, Transport};
use crate::types::verifier::{
    BatchVerifyRequest, BatchVerifyResult, CodeVisibilityRequest, CodeVisibilityResult,
    FastestProvider, ModelRef, ModelWithScore, ProviderHealth, ScoreResult, ScoringWeights,
    VerificationRequest, VerificationResult,
};

use serde_json::{json, Value};
use std::collections::HashMap;

const API_PREFIX: &str = "/api/v1/verifier";

fn path(suffix: &str) -> String {
    format!("{API_PREFIX}{suffix}")
}

#[derive(Debug, Clone)]
pub struct VerifierClient {
    transport: Transport,
}

impl VerifierClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            transport: Transport::new(config)?,
        })
    }

    /// Client with the built-in defaults and the key from `VERIFIER_API_KEY`.
    pub fn from_env() -> Result<Self> {
        Self::new(&ClientConfig::verifier())
    }

    pub fn with_http_client(client: reqwest::Client, config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            transport: Transport::with_client(client, config)?,
        })
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    // -- Verification --

    pub async fn verify_model(&self, request: &VerificationRequest) -> Result<VerificationResult> {
        self.transport.post(&path("/verify"), request).await
    }

    pub async fn batch_verify(&self, models: Vec<ModelRef>) -> Result<BatchVerifyResult> {
        let request = BatchVerifyRequest { models };
        self.transport.post(&path("/verify/batch"), &request).await
    }

    pub async fn verification_status(&self, model_id: &str) -> Result<VerificationResult> {
        self.transport
            .get(&path(&format!("/status/{}", segment(model_id))))
            .await
    }

    /// Check whether the model can see code injected into its context.
    pub async fn test_code_visibility(
        &self,
        request: &CodeVisibilityRequest,
    ) -> Result<CodeVisibilityResult> {
        self.transport
            .post(&path("/test/code-visibility"), request)
            .await
    }

    pub async fn reverify_model(
        &self,
        model_id: &str,
        provider: &str,
        force: bool,
    ) -> Result<VerificationResult> {
        let body = json!({ "model_id": model_id, "provider": provider, "force": force });
        self.transport.post(&path("/reverify"), &body).await
    }

    // -- Scoring --

    pub async fn model_score(&self, model_id: &str) -> Result<ScoreResult> {
        self.transport
            .get(&path(&format!("/scores/{}", segment(model_id))))
            .await
    }

    pub async fn batch_calculate_scores(&self, model_ids: &[String]) -> Result<Vec<ScoreResult>> {
        let envelope: Value = self
            .transport
            .post(&path("/scores/batch"), &json!({ "model_ids": model_ids }))
            .await?;
        take_field(envelope, "scores")
    }

    pub async fn top_models(&self, limit: u32) -> Result<Vec<ModelWithScore>> {
        let envelope: Value = self
            .transport
            .get_with_query(&path("/scores/top"), &[("limit", limit.to_string())])
            .await?;
        take_field(envelope, "models")
    }

    /// Models whose overall score lies in `[min_score, max_score]` (scores run 0-10).
    pub async fn models_by_score_range(
        &self,
        min_score: f64,
        max_score: f64,
        limit: u32,
    ) -> Result<Vec<ModelWithScore>> {
        let query = [
            ("min_score", min_score.to_string()),
            ("max_score", max_score.to_string()),
            ("limit", limit.to_string()),
        ];
        let envelope: Value = self
            .transport
            .get_with_query(&path("/scores/range"), &query)
            .await?;
        take_field(envelope, "models")
    }

    /// Display name with the score suffix, e.g. `GPT-4 (SC:9.2)`.
    pub async fn model_name_with_score(&self, model_id: &str) -> Result<String> {
        let envelope: Value = self
            .transport
            .get(&path(&format!("/scores/{}/name", segment(model_id))))
            .await?;
        take_field(envelope, "name_with_score")
    }

    pub async fn scoring_weights(&self) -> Result<ScoringWeights> {
        let envelope: Value = self.transport.get(&path("/scores/weights")).await?;
        take_field(envelope, "weights")
    }

    /// Replace the scoring weights. Weights that do not add up to 1.0 are
    /// rejected without contacting the service.
    pub async fn update_scoring_weights(&self, weights: &ScoringWeights) -> Result<ScoringWeights> {
        if !weights.validate() {
            return Err(SdkError::validation(format!(
                "Weights must sum to 1.0 (got {:.3})",
                weights.total()
            )));
        }
        let envelope: Value = self
            .transport
            .put(&path("/scores/weights"), weights)
            .await?;
        take_field(envelope, "weights")
    }

    pub async fn compare_models(&self, model_ids: &[String]) -> Result<Value> {
        self.transport
            .post(&path("/scores/compare"), &json!({ "model_ids": model_ids }))
            .await
    }

    /// Drop cached scores for one model, or for every model when `all` is set.
    pub async fn invalidate_cache(&self, model_id: Option<&str>, all: bool) -> Result<()> {
        let body = json!({ "model_id": model_id, "all": all });
        self.transport
            .request(
                Method::POST,
                &path("/scores/cache/invalidate"),
                Some(&body),
                &[],
            )
            .await?;
        Ok(())
    }

    // -- Provider health --

    pub async fn provider_health(&self, provider_id: &str) -> Result<ProviderHealth> {
        self.transport
            .get(&path(&format!("/health/providers/{}", segment(provider_id))))
            .await
    }

    pub async fn all_providers_health(&self) -> Result<Vec<ProviderHealth>> {
        let envelope: Value = self.transport.get(&path("/health/providers")).await?;
        take_field(envelope, "providers")
    }

    pub async fn healthy_providers(&self) -> Result<Vec<String>> {
        let envelope: Value = self.transport.get(&path("/health/healthy")).await?;
        take_field(envelope, "providers")
    }

    pub async fn fastest_provider(&self, providers: &[String]) -> Result<FastestProvider> {
        self.transport
            .post(&path("/health/fastest"), &json!({ "providers": providers }))
            .await
    }

    pub async fn is_provider_available(&self, provider_id: &str) -> Result<bool> {
        let envelope: Value = self
            .transport
            .get(&path(&format!("/health/available/{}", segment(provider_id))))
            .await?;
        take_field(envelope, "available")
    }

    /// Start monitoring a provider.
    pub async fn add_provider(&self, provider_id: &str, provider_name: &str) -> Result<()> {
        let body = json!({ "provider_id": provider_id, "provider_name": provider_name });
        self.transport
            .request(Method::POST, &path("/health/providers"), Some(&body), &[])
            .await?;
        Ok(())
    }

    pub async fn remove_provider(&self, provider_id: &str) -> Result<()> {
        self.transport
            .request(
                Method::DELETE,
                &path(&format!("/health/providers/{}", segment(provider_id))),
                None,
                &[],
            )
            .await?;
        Ok(())
    }

    // -- Service --

    pub async fn health(&self) -> Result<Value> {
        self.transport.get(&path("/health")).await
    }

    /// Available verification tests, keyed by name with a description.
    pub async fn verification_tests(&self) -> Result<HashMap<String, String>> {
        self.transport.get(&path("/tests")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_paths_are_prefixed() {
        assert_eq!(path("/verify"), "/api/v1/verifier/verify");
        assert_eq!(path("/health"), "/api/v1/verifier/health");
    }

    #[tokio::test]
    async fn test_invalid_weights_rejected_locally() {
        // Nothing listens on port 9; a request would fail with a connection error.
        let config = ClientConfig::verifier().base_url("http://127.0.0.1:9");
        let client = VerifierClient::new(&config).unwrap();
        let weights = ScoringWeights {
            response_speed: 0.5,
            model_efficiency: 0.5,
            cost_effectiveness: 0.5,
            capability: 0.0,
            recency: 0.0,
        };

        let err = client.update_scoring_weights(&weights).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.status_code().is_none());
        assert!(err.message().contains("1.500"));
    }
}
