//! James-Stein shrinkage of reported effect sizes.
//!
//! Raw posterior effects on small samples overstate whatever happened to
//! win (winner's curse). With enough project history the reported effect is
//! pulled toward the cross-experiment mean by τ² / (τ² + σ²), where τ² is
//! the between-experiment variance of past effects and σ² the posterior
//! variance of this experiment's effect. Shrinkage is diagnostic only:
//! decisions always consume the raw posterior.

use tracing::debug;

use crate::config::defaults as d;
use crate::engine::sampler::PosteriorDraws;
use crate::engine::stats;
use crate::types::snapshot::HistoricalExperiment;

/// Raw and shrunk effect estimates for one comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectEstimate {
    pub raw: f64,
    pub shrunk: f64,
}

/// Effect of `treatment` versus `control` (posterior means), with the
/// shrunk companion when history supports it.
///
/// Below [`d::MIN_HISTORY_FOR_SHRINKAGE`] experiments — or with zero
/// between-experiment variance, or shrinkage disabled — the shrunk value
/// equals the raw value.
pub fn estimate(
    posterior_means: &[f64],
    draws: &PosteriorDraws,
    control: usize,
    treatment: usize,
    history: &[HistoricalExperiment],
    enabled: bool,
) -> EffectEstimate {
    let raw = posterior_means[treatment] - posterior_means[control];

    if !enabled || history.len() < d::MIN_HISTORY_FOR_SHRINKAGE {
        return EffectEstimate { raw, shrunk: raw };
    }

    let effects: Vec<f64> = history.iter().map(HistoricalExperiment::effect).collect();
    let grand_mean = stats::mean(&effects);
    let tau_squared = stats::sample_variance(&effects);
    if tau_squared <= 0.0 {
        return EffectEstimate { raw, shrunk: raw };
    }

    let diff = draws.diff_samples(treatment, control);
    let sigma_squared = stats::sample_variance(&diff);
    let factor = tau_squared / (tau_squared + sigma_squared);
    let shrunk = grand_mean + factor * (raw - grand_mean);

    debug!(raw, shrunk, tau_squared, sigma_squared, "effect shrinkage");
    EffectEstimate { raw, shrunk }
}
