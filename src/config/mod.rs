//! Engine Configuration — the fixed record of recognised options.
//!
//! The config travels inside the [`crate::ExperimentSnapshot`]; defaults
//! are supplied here by the engine, never by the caller. Unknown keys fail
//! deserialization (`deny_unknown_fields`) so a typoed option surfaces as a
//! [`validation::ConfigError`] instead of silently falling back to a
//! default.
//!
//! There is no global configuration state: an engine invocation is a pure
//! function and reads only the config it was handed.

pub mod defaults;
pub mod validation;

use serde::{Deserialize, Serialize};

use defaults as d;

/// Explicit Beta(α, β) prior supplied by the caller.
///
/// When present it is used as-is for every arm; asymmetric per-arm priors
/// are not supported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BetaPrior {
    pub alpha: f64,
    pub beta: f64,
}

impl BetaPrior {
    /// Prior mean α / (α + β).
    pub fn mean(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }
}

/// How the CUPED θ coefficient is pooled across arms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CupedThetaSource {
    /// One θ from all arms' (score, covariate) pairs.
    #[default]
    Pooled,
    /// A separate θ per arm.
    PerVariant,
}

/// Engagement feature weights for (scroll depth, active time, clicks, form).
///
/// Defaults are the platform launch weights; over time they are replaced by
/// [`crate::calibration::calibrate`] output that the caller persists and
/// passes back in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngagementWeights {
    pub scroll: f64,
    pub active_time: f64,
    pub clicks: f64,
    pub form: f64,
}

impl Default for EngagementWeights {
    fn default() -> Self {
        Self {
            scroll: d::DEFAULT_WEIGHT_SCROLL,
            active_time: d::DEFAULT_WEIGHT_ACTIVE_TIME,
            clicks: d::DEFAULT_WEIGHT_CLICKS,
            form: d::DEFAULT_WEIGHT_FORM,
        }
    }
}

impl EngagementWeights {
    pub fn sum(&self) -> f64 {
        self.scroll + self.active_time + self.clicks + self.form
    }

    /// Weights rescaled to sum to 1. A zero-sum vector normalizes to
    /// uniform so a degenerate calibration cannot zero out the proxy.
    pub fn normalized(&self) -> Self {
        let sum = self.sum();
        if sum <= 0.0 || !sum.is_finite() {
            return Self {
                scroll: 0.25,
                active_time: 0.25,
                clicks: 0.25,
                form: 0.25,
            };
        }
        Self {
            scroll: self.scroll / sum,
            active_time: self.active_time / sum,
            clicks: self.clicks / sum,
            form: self.form / sum,
        }
    }

    /// Weights as an array in feature order (scroll, time, clicks, form).
    pub fn as_array(&self) -> [f64; 4] {
        [self.scroll, self.active_time, self.clicks, self.form]
    }

    /// Construct from an array in feature order.
    pub fn from_array(w: [f64; 4]) -> Self {
        Self {
            scroll: w[0],
            active_time: w[1],
            clicks: w[2],
            form: w[3],
        }
    }
}

/// Recognised engine options with platform defaults.
///
/// Every field has a documented range enforced by
/// [`validation::validate`] before the pipeline runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct EngineConfig {
    /// Explicit prior. Absent → project empirical Bayes → platform default.
    pub prior: Option<BetaPrior>,

    /// Expected-loss ship threshold ε, in conversion-rate units.
    pub loss_threshold: f64,

    /// ± margin around zero difference treated as practically equivalent.
    pub rope_half_width: f64,

    /// Credible-interval mass, in (0, 1).
    pub hdi_mass: f64,

    /// Monte-Carlo draws per variant.
    pub mc_samples: usize,

    /// Seed for deterministic sampling. Unset → entropy-seeded.
    pub mc_seed: Option<u64>,

    /// Total exposure below which the decision is forced to collecting_data.
    pub min_total_n: u64,

    /// Minimum total allocation reserved for exploration, split across
    /// active arms.
    pub explore_floor: f64,

    /// Probability of consulting the challenger draw in top-two Thompson
    /// sampling.
    pub top_two_beta: f64,

    /// Blend the engagement proxy into posteriors while conversions are
    /// sparse.
    pub use_proxy: bool,

    /// Upper quantile for pooled proxy winsorization, in (0, 1].
    pub winsorize_p: f64,

    /// CUPED θ pooling.
    pub cuped_theta_source: CupedThetaSource,

    /// James-Stein shrinkage of reported effect sizes.
    pub shrinkage: bool,

    /// Engagement feature weights (calibrated offline, persisted by the
    /// caller).
    pub engagement_weights: EngagementWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            prior: None,
            loss_threshold: d::DEFAULT_LOSS_THRESHOLD,
            rope_half_width: d::DEFAULT_ROPE_HALF_WIDTH,
            hdi_mass: d::DEFAULT_HDI_MASS,
            mc_samples: d::DEFAULT_MC_SAMPLES,
            mc_seed: None,
            min_total_n: d::DEFAULT_MIN_TOTAL_N,
            explore_floor: d::DEFAULT_EXPLORE_FLOOR,
            top_two_beta: d::DEFAULT_TOP_TWO_BETA,
            use_proxy: true,
            winsorize_p: d::DEFAULT_WINSORIZE_P,
            cuped_theta_source: CupedThetaSource::Pooled,
            shrinkage: true,
            engagement_weights: EngagementWeights::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a config from JSON, turning unknown or malformed keys into a
    /// [`validation::ConfigError`] and range-checking the result.
    pub fn from_json(json: &str) -> Result<Self, validation::ConfigError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| validation::ConfigError::Unrecognized(e.to_string()))?;
        validation::validate(&config)?;
        Ok(config)
    }
}
