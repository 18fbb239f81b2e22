//! Engine-wide default constants.
//!
//! Centralises the statistical defaults so the config structs, validation,
//! and docs stay in agreement. Grouped by pipeline stage.

// ============================================================================
// Prior Resolution
// ============================================================================

/// Platform default prior α. Beta(1, 19) has mean 5%, a reasonable belief
/// about conversion rates before any project history exists.
pub const DEFAULT_PRIOR_ALPHA: f64 = 1.0;

/// Platform default prior β.
pub const DEFAULT_PRIOR_BETA: f64 = 19.0;

/// Completed experiments required before an empirical-Bayes prior is fit.
pub const MIN_HISTORY_FOR_EMPIRICAL_PRIOR: usize = 3;

// ============================================================================
// Decision
// ============================================================================

/// Expected-loss ship threshold ε (conversion-rate units). 0.005 = half a
/// percentage point of regret tolerated when shipping.
pub const DEFAULT_LOSS_THRESHOLD: f64 = 0.005;

/// Half-width of the region of practical equivalence (conversion-rate units).
pub const DEFAULT_ROPE_HALF_WIDTH: f64 = 0.005;

/// Credible-interval mass for all reported HDIs.
pub const DEFAULT_HDI_MASS: f64 = 0.95;

/// Total exposure below which the decision is forced to collecting_data.
pub const DEFAULT_MIN_TOTAL_N: u64 = 30;

/// Expected-loss ties within this tolerance resolve to the earlier variant.
pub const LOSS_TIE_EPSILON: f64 = 1e-12;

// ============================================================================
// Monte-Carlo Sampling
// ============================================================================

/// Default draws per variant.
pub const DEFAULT_MC_SAMPLES: usize = 20_000;

/// Hard ceiling on draws per variant; exceeding it fails fast.
pub const MAX_MC_SAMPLES: usize = 200_000;

/// Hard ceiling on variants per experiment.
pub const MAX_VARIANTS: usize = 64;

// ============================================================================
// Bandit Allocation
// ============================================================================

/// Minimum total allocation reserved for exploration across active arms.
pub const DEFAULT_EXPLORE_FLOOR: f64 = 0.10;

/// Probability of consulting the challenger draw in top-two sampling.
pub const DEFAULT_TOP_TWO_BETA: f64 = 0.5;

// ============================================================================
// Engagement Proxy
// ============================================================================

/// Upper quantile for pooled proxy winsorization.
pub const DEFAULT_WINSORIZE_P: f64 = 0.99;

/// Cap on the proxy pseudo-observation weight (visitor-equivalents). Keeps
/// a strong engagement signal from outweighing real conversions once they
/// start arriving.
pub const PROXY_PSEUDO_WEIGHT_CAP: f64 = 30.0;

/// The proxy is blended only while min(conversions, non-conversions) is
/// below this count.
pub const PROXY_SPARSITY_LIMIT: u64 = 5;

/// Scroll depth saturates at this percentage.
pub const SCROLL_SATURATION_PCT: f64 = 100.0;

/// Active time saturates at this many milliseconds (one minute).
pub const ACTIVE_TIME_SATURATION_MS: f64 = 60_000.0;

/// Click count saturates at this many clicks.
pub const CLICK_SATURATION: f64 = 10.0;

/// Platform launch weights for (scroll, active time, clicks, form).
pub const DEFAULT_WEIGHT_SCROLL: f64 = 0.3;
pub const DEFAULT_WEIGHT_ACTIVE_TIME: f64 = 0.3;
pub const DEFAULT_WEIGHT_CLICKS: f64 = 0.2;
pub const DEFAULT_WEIGHT_FORM: f64 = 0.2;

// ============================================================================
// Shrinkage
// ============================================================================

/// Historical experiments required before between-experiment variance is
/// trusted; below this, shrinkage is disabled and raw effects are reported.
pub const MIN_HISTORY_FOR_SHRINKAGE: usize = 5;

// ============================================================================
// Sample-Size Projection
// ============================================================================

/// Two-sided significance level for the remaining-sample projection.
pub const PROJECTION_ALPHA: f64 = 0.05;

/// Target power for the remaining-sample projection.
pub const PROJECTION_POWER: f64 = 0.80;

// ============================================================================
// Calibration
// ============================================================================

/// Minimum samples before a feature correlation is reported.
pub const MIN_SAMPLES_FOR_CORRELATION: usize = 30;

/// P-value threshold for reporting a feature correlation.
pub const SIGNIFICANCE_THRESHOLD: f64 = 0.05;

/// Observations required for an OLS weight fit (system is 4-dimensional).
pub const MIN_CALIBRATION_OBSERVATIONS: usize = 4;
