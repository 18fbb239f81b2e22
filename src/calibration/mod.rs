//! Offline engagement-weight calibration.
//!
//! Fits ordinary least squares over the saturated engagement features of
//! historical visitors against their conversion outcomes, projects the
//! coefficients onto the non-negative orthant, and normalizes them to sum
//! to 1. The output becomes the default proxy weights for future
//! evaluations; callers persist it. Calibration is pure and idempotent —
//! re-running on the same batch reproduces the same weights.
//!
//! Alongside the fit, each feature's Pearson correlation against
//! conversion is tested with a Student's-t p-value; only correlations with
//! at least 30 observations and p < 0.05 are reported, so a caller can see
//! whether the fitted weights rest on real signal before adopting them.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use thiserror::Error;
use tracing::debug;

use crate::config::{defaults as d, EngagementWeights};
use crate::engine::stats;
use crate::types::snapshot::EngagementSignals;

const FEATURES: usize = 4;
const FEATURE_NAMES: [&str; FEATURES] = ["scroll", "active_time", "clicks", "form"];

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalibrationError {
    #[error("calibration needs at least {required} observations, got {got}")]
    TooFewObservations { got: usize, required: usize },

    #[error("winsorize_p = {0} out of range: must be in (0, 1]")]
    InvalidQuantile(f64),

    #[error("feature matrix is singular: {0}")]
    Degenerate(String),
}

// ============================================================================
// Input / Output
// ============================================================================

/// One historical visitor: what they did, and whether they converted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationObservation {
    pub signals: EngagementSignals,
    pub converted: bool,
}

/// A feature's correlation with conversion, reported only when it clears
/// the significance gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCorrelation {
    pub feature: String,
    pub r_value: f64,
    pub r_squared: f64,
    pub p_value: f64,
    pub sample_count: usize,
}

/// Calibration output: the weight vector plus its supporting diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub weights: EngagementWeights,
    pub observations: usize,
    pub correlations: Vec<FeatureCorrelation>,
}

// ============================================================================
// Calibration
// ============================================================================

/// Fit engagement weights from a batch of historical visitors.
pub fn calibrate(
    observations: &[CalibrationObservation],
    winsorize_p: f64,
) -> Result<CalibrationResult, CalibrationError> {
    if observations.len() < d::MIN_CALIBRATION_OBSERVATIONS {
        return Err(CalibrationError::TooFewObservations {
            got: observations.len(),
            required: d::MIN_CALIBRATION_OBSERVATIONS,
        });
    }
    if !(winsorize_p > 0.0 && winsorize_p <= 1.0) {
        return Err(CalibrationError::InvalidQuantile(winsorize_p));
    }

    let mut columns: [Vec<f64>; FEATURES] = Default::default();
    for observation in observations {
        let features = observation.signals.saturated();
        for (column, &value) in columns.iter_mut().zip(&features) {
            column.push(value);
        }
    }
    let outcomes: Vec<f64> = observations
        .iter()
        .map(|o| if o.converted { 1.0 } else { 0.0 })
        .collect();

    for column in &mut columns {
        winsorize(column, winsorize_p);
    }

    // Features that never fire carry no information and would make the
    // normal equations singular; they are excluded and weighted zero.
    let included: Vec<usize> = (0..FEATURES)
        .filter(|&f| columns[f].iter().any(|&x| x != 0.0))
        .collect();
    if included.is_empty() {
        return Err(CalibrationError::Degenerate(
            "every feature column is zero".to_string(),
        ));
    }

    let coefficients = fit_ols(&columns, &outcomes, &included)?;

    // Non-negative orthant, then normalize to sum 1
    let mut weights = [0.0f64; FEATURES];
    for (slot, &f) in included.iter().enumerate() {
        weights[f] = coefficients[slot].max(0.0);
    }
    let sum: f64 = weights.iter().sum();
    let weights = if sum > 0.0 {
        EngagementWeights::from_array([
            weights[0] / sum,
            weights[1] / sum,
            weights[2] / sum,
            weights[3] / sum,
        ])
    } else {
        debug!("every OLS coefficient clipped to zero, keeping launch weights");
        EngagementWeights::default().normalized()
    };

    let correlations = significant_correlations(&columns, &outcomes);

    Ok(CalibrationResult {
        weights,
        observations: observations.len(),
        correlations,
    })
}

/// Cap a feature column at its own `p` quantile.
fn winsorize(column: &mut [f64], p: f64) {
    let mut sorted = column.to_vec();
    sorted.sort_by(f64::total_cmp);
    let cap = stats::quantile_sorted(&sorted, p);
    for value in column.iter_mut() {
        *value = value.min(cap);
    }
}

/// Solve the normal equations XᵀX β = Xᵀy over the included columns.
fn fit_ols(
    columns: &[Vec<f64>; FEATURES],
    outcomes: &[f64],
    included: &[usize],
) -> Result<Vec<f64>, CalibrationError> {
    let k = included.len();
    let mut xtx = vec![vec![0.0f64; k]; k];
    let mut xty = vec![0.0f64; k];
    for (i, &fi) in included.iter().enumerate() {
        for (j, &fj) in included.iter().enumerate() {
            xtx[i][j] = columns[fi]
                .iter()
                .zip(&columns[fj])
                .map(|(a, b)| a * b)
                .sum();
        }
        xty[i] = columns[fi].iter().zip(outcomes).map(|(a, y)| a * y).sum();
    }
    solve_linear_system(xtx, xty)
        .ok_or_else(|| CalibrationError::Degenerate("collinear feature columns".to_string()))
}

/// Gaussian elimination with partial pivoting.
fn solve_linear_system(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let mut pivot = col;
        for row in col + 1..n {
            if a[row][col].abs() > a[pivot][col].abs() {
                pivot = row;
            }
        }
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0f64; n];
    for col in (0..n).rev() {
        let mut sum = b[col];
        for k in col + 1..n {
            sum -= a[col][k] * x[k];
        }
        x[col] = sum / a[col][col];
    }
    if x.iter().all(|v| v.is_finite()) {
        Some(x)
    } else {
        None
    }
}

// ============================================================================
// Significance Diagnostics
// ============================================================================

/// Per-feature Pearson correlations against conversion that clear the
/// sample-count and p-value gates.
fn significant_correlations(
    columns: &[Vec<f64>; FEATURES],
    outcomes: &[f64],
) -> Vec<FeatureCorrelation> {
    let n = outcomes.len();
    if n < d::MIN_SAMPLES_FOR_CORRELATION {
        return Vec::new();
    }

    let mut significant = Vec::new();
    for (f, column) in columns.iter().enumerate() {
        let r = pearson(column, outcomes);
        let p_value = p_value_for_r(r, n);
        if p_value < d::SIGNIFICANCE_THRESHOLD {
            significant.push(FeatureCorrelation {
                feature: FEATURE_NAMES[f].to_string(),
                r_value: r,
                r_squared: r * r,
                p_value,
                sample_count: n,
            });
        }
    }
    significant
}

/// Pearson correlation coefficient; 0 when either side has no spread.
fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let var_x = stats::sample_variance(x);
    let var_y = stats::sample_variance(y);
    if var_x <= 0.0 || var_y <= 0.0 {
        return 0.0;
    }
    stats::covariance(x, y) / (var_x * var_y).sqrt()
}

/// Two-tailed p-value from the t-statistic r·√(n−2)/√(1−r²) under a
/// Student's-t distribution with n − 2 degrees of freedom.
fn p_value_for_r(r: f64, n: usize) -> f64 {
    if n < 3 {
        return 1.0;
    }
    if r.abs() >= 0.9999 {
        return 0.0;
    }

    let df = (n - 2) as f64;
    let t_stat = r * df.sqrt() / (1.0 - r * r).sqrt();

    match StudentsT::new(0.0, 1.0, df) {
        Ok(t_dist) => 2.0 * (1.0 - t_dist.cdf(t_stat.abs())),
        Err(_) => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Visitors whose conversion tracks scroll depth: deep scrollers
    /// convert, shallow ones do not.
    fn scroll_driven_batch(n: usize) -> Vec<CalibrationObservation> {
        (0..n)
            .map(|i| {
                let deep = i % 2 == 0;
                CalibrationObservation {
                    signals: EngagementSignals {
                        scroll_depth_pct: if deep { 90.0 } else { 10.0 },
                        active_time_ms: 15_000.0 + (i % 7) as f64 * 1_000.0,
                        clicks: (i % 3) as u32,
                        form_engaged: i % 5 == 0,
                    },
                    converted: deep,
                }
            })
            .collect()
    }

    #[test]
    fn too_few_observations_rejected() {
        let batch = scroll_driven_batch(3);
        assert!(matches!(
            calibrate(&batch, 0.99),
            Err(CalibrationError::TooFewObservations { got: 3, .. })
        ));
    }

    #[test]
    fn invalid_quantile_rejected() {
        let batch = scroll_driven_batch(50);
        assert!(matches!(
            calibrate(&batch, 0.0),
            Err(CalibrationError::InvalidQuantile(_))
        ));
        assert!(matches!(
            calibrate(&batch, 1.5),
            Err(CalibrationError::InvalidQuantile(_))
        ));
    }

    #[test]
    fn weights_are_normalized_and_non_negative() {
        let result = calibrate(&scroll_driven_batch(100), 0.99).unwrap();
        let w = result.weights.as_array();
        assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-9, "{w:?}");
        assert!(w.iter().all(|&x| x >= 0.0), "{w:?}");
    }

    #[test]
    fn dominant_feature_gets_the_largest_weight() {
        let result = calibrate(&scroll_driven_batch(200), 0.99).unwrap();
        let w = result.weights;
        assert!(
            w.scroll > w.active_time && w.scroll > w.clicks && w.scroll > w.form,
            "scroll drives conversion here: {w:?}"
        );
    }

    #[test]
    fn calibration_is_idempotent() {
        let batch = scroll_driven_batch(120);
        let first = calibrate(&batch, 0.99).unwrap();
        let second = calibrate(&batch, 0.99).unwrap();
        let (a, b) = (first.weights.as_array(), second.weights.as_array());
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-9, "{a:?} vs {b:?}");
        }
        assert_eq!(first.correlations, second.correlations);
    }

    #[test]
    fn scroll_correlation_is_reported_as_significant() {
        let result = calibrate(&scroll_driven_batch(100), 0.99).unwrap();
        let scroll = result
            .correlations
            .iter()
            .find(|c| c.feature == "scroll")
            .expect("scroll strongly predicts conversion here");
        assert!(scroll.r_value > 0.9, "r = {}", scroll.r_value);
        assert!(scroll.p_value < 0.05);
        assert_eq!(scroll.sample_count, 100);
    }

    #[test]
    fn small_batches_skip_correlation_reporting() {
        let result = calibrate(&scroll_driven_batch(20), 0.99).unwrap();
        assert!(
            result.correlations.is_empty(),
            "below 30 observations no correlation is trustworthy"
        );
    }

    #[test]
    fn anti_correlated_feature_is_clipped_to_zero() {
        // Clickers never convert; everything else is flat.
        let batch: Vec<CalibrationObservation> = (0..100)
            .map(|i| {
                let clicker = i % 2 == 0;
                CalibrationObservation {
                    signals: EngagementSignals {
                        scroll_depth_pct: 50.0,
                        active_time_ms: 20_000.0 + (i % 11) as f64 * 1_500.0,
                        clicks: if clicker { 8 } else { 0 },
                        form_engaged: false,
                    },
                    converted: !clicker,
                }
            })
            .collect();
        let result = calibrate(&batch, 0.99).unwrap();
        assert_eq!(result.weights.clicks, 0.0, "{:?}", result.weights);
        assert_eq!(result.weights.form, 0.0, "dead feature stays at zero");
    }

    #[test]
    fn all_zero_features_are_degenerate() {
        let batch: Vec<CalibrationObservation> = (0..50)
            .map(|i| CalibrationObservation {
                signals: EngagementSignals::default(),
                converted: i % 4 == 0,
            })
            .collect();
        assert!(matches!(
            calibrate(&batch, 0.99),
            Err(CalibrationError::Degenerate(_))
        ));
    }
}
