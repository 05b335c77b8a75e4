//! Records for the Verifier service: verification, scoring and provider health.

use super::nullable;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Allowed drift when checking that scoring weights add up to one.
const WEIGHT_TOLERANCE: f64 = 1e-3;

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelRef {
    #[serde(deserialize_with = "nullable")]
    pub model_id: String,
    #[serde(deserialize_with = "nullable")]
    pub provider: String,
}

impl ModelRef {
    pub fn new(model_id: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            provider: provider.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub model_id: String,
    pub provider: String,
    /// Run only these tests; all tests when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tests: Option<Vec<String>>,
}

impl VerificationRequest {
    pub fn new(model_id: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            provider: provider.into(),
            tests: None,
        }
    }

    #[must_use]
    pub fn tests(mut self, tests: Vec<String>) -> Self {
        self.tests = Some(tests);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationResult {
    #[serde(deserialize_with = "nullable")]
    pub model_id: String,
    #[serde(deserialize_with = "nullable")]
    pub provider: String,
    #[serde(deserialize_with = "nullable")]
    pub verified: bool,
    #[serde(deserialize_with = "nullable")]
    pub score: f64,
    #[serde(deserialize_with = "nullable")]
    pub overall_score: f64,
    #[serde(deserialize_with = "nullable")]
    pub score_suffix: String,
    #[serde(deserialize_with = "nullable")]
    pub code_visible: bool,
    #[serde(deserialize_with = "nullable")]
    pub tests: HashMap<String, bool>,
    /// Milliseconds.
    #[serde(deserialize_with = "nullable")]
    pub verification_time: u64,
    #[serde(deserialize_with = "nullable")]
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchVerifyRequest {
    pub models: Vec<ModelRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSummary {
    #[serde(deserialize_with = "nullable")]
    pub total: u64,
    #[serde(deserialize_with = "nullable")]
    pub verified: u64,
    #[serde(deserialize_with = "nullable")]
    pub failed: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchVerifyResult {
    #[serde(deserialize_with = "nullable")]
    pub results: Vec<VerificationResult>,
    #[serde(deserialize_with = "nullable")]
    pub summary: BatchSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeVisibilityRequest {
    pub model_id: String,
    pub provider: String,
    pub language: String,
}

impl CodeVisibilityRequest {
    pub fn new(model_id: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            provider: provider.into(),
            language: "python".to_string(),
        }
    }

    #[must_use]
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeVisibilityResult {
    #[serde(deserialize_with = "nullable")]
    pub model_id: String,
    #[serde(deserialize_with = "nullable")]
    pub provider: String,
    #[serde(deserialize_with = "nullable")]
    pub code_visible: bool,
    #[serde(deserialize_with = "nullable")]
    pub language: String,
    #[serde(deserialize_with = "nullable")]
    pub confidence: f64,
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreComponents {
    #[serde(deserialize_with = "nullable")]
    pub speed_score: f64,
    #[serde(deserialize_with = "nullable")]
    pub efficiency_score: f64,
    #[serde(deserialize_with = "nullable")]
    pub cost_score: f64,
    #[serde(deserialize_with = "nullable")]
    pub capability_score: f64,
    #[serde(deserialize_with = "nullable")]
    pub recency_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreResult {
    #[serde(deserialize_with = "nullable")]
    pub model_id: String,
    #[serde(deserialize_with = "nullable")]
    pub model_name: String,
    #[serde(deserialize_with = "nullable")]
    pub overall_score: f64,
    /// Display suffix such as `(SC:9.2)`.
    #[serde(deserialize_with = "nullable")]
    pub score_suffix: String,
    #[serde(deserialize_with = "nullable")]
    pub components: ScoreComponents,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calculated_at: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub data_source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelWithScore {
    #[serde(deserialize_with = "nullable")]
    pub model_id: String,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub provider: String,
    #[serde(deserialize_with = "nullable")]
    pub overall_score: f64,
    #[serde(deserialize_with = "nullable")]
    pub score_suffix: String,
    #[serde(deserialize_with = "nullable")]
    pub rank: u32,
}

/// Relative weight of each score component. Must add up to 1.0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    #[serde(deserialize_with = "nullable")]
    pub response_speed: f64,
    #[serde(deserialize_with = "nullable")]
    pub model_efficiency: f64,
    #[serde(deserialize_with = "nullable")]
    pub cost_effectiveness: f64,
    #[serde(deserialize_with = "nullable")]
    pub capability: f64,
    #[serde(deserialize_with = "nullable")]
    pub recency: f64,
}

impl ScoringWeights {
    pub fn total(&self) -> f64 {
        self.response_speed
            + self.model_efficiency
            + self.cost_effectiveness
            + self.capability
            + self.recency
    }

    pub fn validate(&self) -> bool {
        (self.total() - 1.0).abs() <= WEIGHT_TOLERANCE
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderHealth {
    #[serde(deserialize_with = "nullable")]
    pub provider_id: String,
    #[serde(deserialize_with = "nullable")]
    pub provider_name: String,
    #[serde(deserialize_with = "nullable")]
    pub healthy: bool,
    /// `closed`, `half-open` or `open`.
    #[serde(deserialize_with = "nullable")]
    pub circuit_state: String,
    #[serde(deserialize_with = "nullable")]
    pub failure_count: u64,
    #[serde(deserialize_with = "nullable")]
    pub success_count: u64,
    #[serde(deserialize_with = "nullable")]
    pub avg_response_ms: u64,
    #[serde(deserialize_with = "nullable")]
    pub uptime_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checked_at: Option<String>,
}

impl ProviderHealth {
    /// `last_checked_at` as a timestamp, when present and RFC 3339.
    pub fn last_checked(&self) -> Option<DateTime<Utc>> {
        let raw = self.last_checked_at.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FastestProvider {
    #[serde(deserialize_with = "nullable")]
    pub provider_id: String,
    #[serde(deserialize_with = "nullable")]
    pub avg_response_ms: u64,
}
