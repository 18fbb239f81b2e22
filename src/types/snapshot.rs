//! Experiment snapshot — the immutable input to an engine invocation.
//!
//! The snapshot carries everything a single evaluation needs: variant
//! counts, optional engagement signals, the config record, and past
//! completed experiments for the same project. Validation happens up front
//! and produces a [`DataError`]; the pipeline itself assumes a valid
//! snapshot.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{defaults as d, EngineConfig};

// ============================================================================
// Error Types
// ============================================================================

/// Malformed experiment data. Fatal to the call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("experiment needs at least 2 variants, got {0}")]
    TooFewVariants(usize),

    #[error("duplicate variant key '{0}'")]
    DuplicateVariant(String),

    #[error("{field} references unknown variant key '{key}'")]
    UnknownVariant { field: &'static str, key: String },

    #[error("variant '{variant}': {conversions} conversions exceed {exposures} exposures")]
    ConversionsExceedExposures {
        variant: String,
        conversions: u64,
        exposures: u64,
    },

    #[error("variant '{variant}': engagement score {value} outside [0, 1]")]
    EngagementOutOfRange { variant: String, value: f64 },

    #[error("variant '{variant}': covariate vector length {covariates} does not match engagement length {engagement}")]
    CovariateLengthMismatch {
        variant: String,
        covariates: usize,
        engagement: usize,
    },

    #[error("every variant is paused; at least one active arm is required")]
    AllVariantsPaused,

    #[error("history entry {index} is invalid: {reason}")]
    InvalidHistory { index: usize, reason: String },

    #[error("non-finite numeric input: {0}")]
    NonFinite(String),
}

// ============================================================================
// Engagement Signals
// ============================================================================

/// Raw per-visitor engagement signals as collected by the tracking layer.
///
/// Callers score these into `[0, 1]` with
/// [`crate::engine::proxy::score_visitor`] before building a snapshot; the
/// calibrator consumes them directly.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EngagementSignals {
    /// Maximum scroll depth reached, in percent.
    pub scroll_depth_pct: f64,
    /// Active (non-idle) time on page, in milliseconds.
    pub active_time_ms: f64,
    /// Click count.
    pub clicks: u32,
    /// Whether the visitor engaged with a form.
    pub form_engaged: bool,
}

impl EngagementSignals {
    /// Features saturated into `[0, 1]` in canonical order
    /// (scroll, active time, clicks, form).
    pub fn saturated(&self) -> [f64; 4] {
        [
            (self.scroll_depth_pct / d::SCROLL_SATURATION_PCT).clamp(0.0, 1.0),
            (self.active_time_ms / d::ACTIVE_TIME_SATURATION_MS).clamp(0.0, 1.0),
            (f64::from(self.clicks) / d::CLICK_SATURATION).clamp(0.0, 1.0),
            if self.form_engaged { 1.0 } else { 0.0 },
        ]
    }
}

// ============================================================================
// History
// ============================================================================

/// One completed past experiment for the same project.
///
/// Control-arm rates feed the empirical-Bayes prior; effects feed the
/// shrinkage corrector; dated entries feed the traffic-rate projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalExperiment {
    /// Observed control-arm conversion rate.
    pub control_rate: f64,
    /// Observed treatment-arm conversion rate.
    pub treatment_rate: f64,
    /// Control-arm sample size.
    pub control_n: u64,
    /// Treatment-arm sample size.
    pub treatment_n: u64,
    /// When the experiment started.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// When the experiment completed.
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
}

impl HistoricalExperiment {
    /// Observed effect size (treatment − control).
    pub fn effect(&self) -> f64 {
        self.treatment_rate - self.control_rate
    }

    /// Visitors per day, when both dates are present and ordered.
    pub fn daily_visitors(&self) -> Option<f64> {
        let (start, end) = (self.started_at?, self.ended_at?);
        let days = (end - start).num_seconds() as f64 / 86_400.0;
        if days <= 0.0 {
            return None;
        }
        Some((self.control_n + self.treatment_n) as f64 / days)
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Immutable input to a single engine evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSnapshot {
    /// Opaque experiment identifier, echoed into the result.
    pub experiment_key: String,

    /// Ordered variant keys (≥2). The first is conventionally the control.
    pub variants: Vec<String>,

    /// Visitors assigned per variant. Missing key ⇒ 0.
    #[serde(default)]
    pub exposures: BTreeMap<String, u64>,

    /// Conversions per variant; never more than exposures. Missing key ⇒ 0.
    #[serde(default)]
    pub conversions: BTreeMap<String, u64>,

    /// Per-visitor proxy scores in `[0, 1]`. Lengths need not equal
    /// exposures; unassigned visitors simply omit engagement.
    #[serde(default)]
    pub engagement: BTreeMap<String, Vec<f64>>,

    /// Pre-exposure covariate parallel to `engagement[v]`, for CUPED.
    #[serde(default)]
    pub covariates: BTreeMap<String, Vec<f64>>,

    /// Variants excluded from the allocation support. Posteriors are still
    /// reported for them.
    #[serde(default)]
    pub paused: BTreeSet<String>,

    /// Engine options.
    #[serde(default)]
    pub config: EngineConfig,

    /// Past completed experiments for the same project.
    #[serde(default)]
    pub history: Vec<HistoricalExperiment>,
}

impl ExperimentSnapshot {
    /// Empty snapshot for the given variants, everything else defaulted.
    pub fn new(experiment_key: impl Into<String>, variants: Vec<String>) -> Self {
        Self {
            experiment_key: experiment_key.into(),
            variants,
            exposures: BTreeMap::new(),
            conversions: BTreeMap::new(),
            engagement: BTreeMap::new(),
            covariates: BTreeMap::new(),
            paused: BTreeSet::new(),
            config: EngineConfig::default(),
            history: Vec::new(),
        }
    }

    pub fn exposures_of(&self, variant: &str) -> u64 {
        self.exposures.get(variant).copied().unwrap_or(0)
    }

    pub fn conversions_of(&self, variant: &str) -> u64 {
        self.conversions.get(variant).copied().unwrap_or(0)
    }

    pub fn total_exposures(&self) -> u64 {
        self.variants.iter().map(|v| self.exposures_of(v)).sum()
    }

    pub fn total_conversions(&self) -> u64 {
        self.variants.iter().map(|v| self.conversions_of(v)).sum()
    }

    /// Indices of variants eligible for traffic allocation.
    pub fn active_indices(&self) -> Vec<usize> {
        self.variants
            .iter()
            .enumerate()
            .filter(|(_, v)| !self.paused.contains(*v))
            .map(|(i, _)| i)
            .collect()
    }

    /// Check snapshot integrity. Run before the pipeline; the stages assume
    /// a snapshot that passed.
    pub fn validate(&self) -> Result<(), DataError> {
        if self.variants.len() < 2 {
            return Err(DataError::TooFewVariants(self.variants.len()));
        }

        let mut seen = BTreeSet::new();
        for v in &self.variants {
            if !seen.insert(v.as_str()) {
                return Err(DataError::DuplicateVariant(v.clone()));
            }
        }

        for (field, keys) in [
            ("exposures", self.exposures.keys().collect::<Vec<_>>()),
            ("conversions", self.conversions.keys().collect()),
            ("engagement", self.engagement.keys().collect()),
            ("covariates", self.covariates.keys().collect()),
            ("paused", self.paused.iter().collect()),
        ] {
            for key in keys {
                if !seen.contains(key.as_str()) {
                    return Err(DataError::UnknownVariant {
                        field,
                        key: key.clone(),
                    });
                }
            }
        }

        if self.active_indices().is_empty() {
            return Err(DataError::AllVariantsPaused);
        }

        for v in &self.variants {
            let exposures = self.exposures_of(v);
            let conversions = self.conversions_of(v);
            if conversions > exposures {
                return Err(DataError::ConversionsExceedExposures {
                    variant: v.clone(),
                    conversions,
                    exposures,
                });
            }

            if let Some(scores) = self.engagement.get(v) {
                for &score in scores {
                    if !score.is_finite() || !(0.0..=1.0).contains(&score) {
                        return Err(DataError::EngagementOutOfRange {
                            variant: v.clone(),
                            value: score,
                        });
                    }
                }
            }

            if let Some(covariates) = self.covariates.get(v) {
                let engagement_len = self.engagement.get(v).map_or(0, Vec::len);
                if covariates.len() != engagement_len {
                    return Err(DataError::CovariateLengthMismatch {
                        variant: v.clone(),
                        covariates: covariates.len(),
                        engagement: engagement_len,
                    });
                }
                for &x in covariates {
                    if !x.is_finite() {
                        return Err(DataError::NonFinite(format!(
                            "covariate for variant '{v}'"
                        )));
                    }
                }
            }
        }

        for (index, entry) in self.history.iter().enumerate() {
            for (name, rate) in [
                ("control_rate", entry.control_rate),
                ("treatment_rate", entry.treatment_rate),
            ] {
                if !rate.is_finite() || !(0.0..=1.0).contains(&rate) {
                    return Err(DataError::InvalidHistory {
                        index,
                        reason: format!("{name} = {rate} outside [0, 1]"),
                    });
                }
            }
        }

        Ok(())
    }
}
