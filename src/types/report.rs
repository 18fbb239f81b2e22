//! Engine result — the JSON contract consumed by the dashboard and the API
//! serialization layer.
//!
//! Field names here are the wire contract; renaming one is a breaking
//! change for every consumer. Nullable contract fields are `Option` and are
//! always serialized (no `skip_serializing_if`) so consumers see explicit
//! nulls.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Where the prior came from (three-tier fallback).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorSource {
    UserSpecified,
    ProjectHistorical,
    PlatformDefault,
}

/// Experiment lifecycle decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    CollectingData,
    KeepTesting,
    ReadyToShip,
    PracticallyEquivalent,
}

impl DecisionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CollectingData => "collecting_data",
            Self::KeepTesting => "keep_testing",
            Self::ReadyToShip => "ready_to_ship",
            Self::PracticallyEquivalent => "practically_equivalent",
        }
    }
}

/// Outcome of the HDI-vs-ROPE comparison for the top-two pair.
///
/// `a` is whichever of the pair appears earlier in the snapshot's variant
/// ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RopeVerdict {
    Equivalent,
    ShipA,
    ShipB,
    Undecided,
}

/// Per-variant posterior and diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantReport {
    pub variant_key: String,
    pub visitors: u64,
    pub conversions: u64,
    /// k/n, or 0 when n = 0.
    pub conversion_rate: f64,
    pub posterior_alpha: f64,
    pub posterior_beta: f64,
    pub posterior_mean: f64,
    /// HDI at the configured mass.
    pub credible_interval: [f64; 2],
    /// Proxy mean in `[0, 1]`, when engagement was recorded.
    pub engagement_score: Option<f64>,
    pub probability_best: f64,
    /// Expected regret of shipping this variant versus the unknown best.
    pub expected_loss: f64,
}

/// The ship/keep-testing call and its supporting numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionSummary {
    pub decision_status: DecisionStatus,
    pub winning_variant: Option<String>,
    pub leading_variant_loss: f64,
    pub epsilon_threshold: f64,
    /// min(100, ε / leading loss × 100).
    pub confidence_pct: f64,
    /// Projected days to a decision at the recent traffic rate, when the
    /// history makes that rate known.
    pub estimated_days: Option<u32>,
}

/// HDI-vs-ROPE comparison for the top-two pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RopeAnalysis {
    /// [−rope_half_width, +rope_half_width].
    pub rope: [f64; 2],
    /// HDI of the difference between the top two variants (earlier-ordered
    /// minus later-ordered).
    pub hdi: [f64; 2],
    pub decision: RopeVerdict,
}

/// Complete engine output for one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineResult {
    pub experiment_key: String,
    pub total_visitors: u64,
    pub variants: Vec<VariantReport>,
    /// Only populated for two-variant experiments.
    pub probability_b_beats_a: Option<f64>,
    pub decision: DecisionSummary,
    pub rope_analysis: Option<RopeAnalysis>,
    /// Proper distribution over variants; paused arms get 0.
    pub suggested_allocation: BTreeMap<String, f64>,
    /// Best non-control arm versus control, posterior means.
    pub raw_effect_size: Option<f64>,
    /// James-Stein corrected effect, equal to raw when shrinkage is off or
    /// history is thin.
    pub shrunk_effect_size: Option<f64>,
    pub prior_used: PriorSource,
    /// Plain-English summary of the decision record.
    pub recommendation: String,
}
