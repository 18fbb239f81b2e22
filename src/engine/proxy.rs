//! Engagement proxy scoring.
//!
//! Two responsibilities: turn raw engagement signals into a bounded
//! per-visitor score (`score_visitor`, used by callers and the
//! calibrator), and summarize the per-variant score arrays carried in a
//! snapshot for posterior blending (`summarize`). Summarization winsorizes
//! pooled across variants at the configured quantile, applies CUPED
//! variance reduction when a pre-exposure covariate is present, and clamps
//! the adjusted scores back into `[0, 1]`.

use std::collections::BTreeMap;

use crate::config::{CupedThetaSource, EngagementWeights, EngineConfig};
use crate::engine::stats;
use crate::types::snapshot::EngagementSignals;

/// Mean and effective sample size of one variant's proxy scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProxySummary {
    pub mean: f64,
    pub n: usize,
}

/// Score one visitor's engagement into `[0, 1]`.
///
/// Weighted combination of the saturated features; weights are normalized
/// so a calibrated vector that does not sum to exactly 1 still yields a
/// bounded score.
pub fn score_visitor(signals: &EngagementSignals, weights: &EngagementWeights) -> f64 {
    let w = weights.normalized().as_array();
    let f = signals.saturated();
    let score: f64 = w.iter().zip(&f).map(|(wi, fi)| wi * fi).sum();
    score.clamp(0.0, 1.0)
}

/// Summarize the per-variant engagement arrays of a snapshot.
///
/// Returns an entry for every variant that carried at least one score.
pub fn summarize(
    variants: &[String],
    engagement: &BTreeMap<String, Vec<f64>>,
    covariates: &BTreeMap<String, Vec<f64>>,
    config: &EngineConfig,
) -> BTreeMap<String, ProxySummary> {
    // Winsorization cap from the pooled distribution
    let mut pooled: Vec<f64> = variants
        .iter()
        .filter_map(|v| engagement.get(v))
        .flatten()
        .copied()
        .collect();
    if pooled.is_empty() {
        return BTreeMap::new();
    }
    pooled.sort_by(f64::total_cmp);
    let cap = stats::quantile_sorted(&pooled, config.winsorize_p);

    let mut scores: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for v in variants {
        if let Some(raw) = engagement.get(v) {
            if !raw.is_empty() {
                scores.insert(v.clone(), raw.iter().map(|&x| x.min(cap)).collect());
            }
        }
    }

    apply_cuped(&mut scores, covariates, config.cuped_theta_source);

    scores
        .into_iter()
        .map(|(v, s)| {
            let summary = ProxySummary {
                mean: stats::mean(&s),
                n: s.len(),
            };
            (v, summary)
        })
        .collect()
}

/// CUPED adjustment `y − θ·(x − x̄)` over the variants that carry a
/// covariate vector, clamped back to `[0, 1]`. A zero-variance covariate
/// contributes θ = 0 (no adjustment).
fn apply_cuped(
    scores: &mut BTreeMap<String, Vec<f64>>,
    covariates: &BTreeMap<String, Vec<f64>>,
    source: CupedThetaSource,
) {
    match source {
        CupedThetaSource::Pooled => {
            let mut all_y = Vec::new();
            let mut all_x = Vec::new();
            for (v, y) in scores.iter() {
                if let Some(x) = covariates.get(v) {
                    if x.len() == y.len() {
                        all_y.extend_from_slice(y);
                        all_x.extend_from_slice(x);
                    }
                }
            }
            let theta = cuped_theta(&all_y, &all_x);
            let x_bar = stats::mean(&all_x);
            for (v, y) in scores.iter_mut() {
                if let Some(x) = covariates.get(v) {
                    if x.len() == y.len() {
                        adjust(y, x, theta, x_bar);
                    }
                }
            }
        }
        CupedThetaSource::PerVariant => {
            for (v, y) in scores.iter_mut() {
                if let Some(x) = covariates.get(v) {
                    if x.len() == y.len() {
                        let theta = cuped_theta(y, x);
                        let x_bar = stats::mean(x);
                        adjust(y, x, theta, x_bar);
                    }
                }
            }
        }
    }
}

fn cuped_theta(y: &[f64], x: &[f64]) -> f64 {
    let var_x = stats::sample_variance(x);
    if var_x <= f64::EPSILON {
        return 0.0;
    }
    stats::covariance(y, x) / var_x
}

fn adjust(y: &mut [f64], x: &[f64], theta: f64, x_bar: f64) {
    for (yi, &xi) in y.iter_mut().zip(x) {
        *yi = (*yi - theta * (xi - x_bar)).clamp(0.0, 1.0);
    }
}
