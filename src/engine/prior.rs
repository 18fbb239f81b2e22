//! Three-tier prior resolution.
//!
//! First match wins: an explicit user prior, a project-historical
//! empirical-Bayes fit over past control arms, then the platform default
//! Beta(1, 19). The same prior applies to every arm.

use tracing::{debug, warn};

use crate::config::{defaults as d, BetaPrior, EngineConfig};
use crate::engine::stats;
use crate::types::report::PriorSource;
use crate::types::snapshot::HistoricalExperiment;

/// Resolve the Beta prior for this evaluation.
pub fn resolve(
    config: &EngineConfig,
    history: &[HistoricalExperiment],
) -> (BetaPrior, PriorSource) {
    if let Some(prior) = config.prior {
        return (prior, PriorSource::UserSpecified);
    }
    if let Some(prior) = empirical_prior(history) {
        return (prior, PriorSource::ProjectHistorical);
    }
    (
        BetaPrior {
            alpha: d::DEFAULT_PRIOR_ALPHA,
            beta: d::DEFAULT_PRIOR_BETA,
        },
        PriorSource::PlatformDefault,
    )
}

/// Method-of-moments Beta fit over historical control-arm conversion rates.
///
/// With mean m and sample variance s² the moment equations give
/// α = m·((m(1−m)/s²) − 1) and β = (1−m)·((m(1−m)/s²) − 1). The fit is
/// only usable when s² is strictly inside (0, m(1−m)); outside that region
/// (or with non-positive parameters from numeric edge cases) the platform
/// default takes over.
fn empirical_prior(history: &[HistoricalExperiment]) -> Option<BetaPrior> {
    if history.len() < d::MIN_HISTORY_FOR_EMPIRICAL_PRIOR {
        return None;
    }

    let rates: Vec<f64> = history.iter().map(|h| h.control_rate).collect();
    let m = stats::mean(&rates);
    let s2 = stats::sample_variance(&rates);

    if s2 <= 0.0 || s2 >= m * (1.0 - m) {
        debug!(
            mean = m,
            variance = s2,
            "historical control rates outside the feasible moment region"
        );
        return None;
    }

    let scale = m * (1.0 - m) / s2 - 1.0;
    let alpha = m * scale;
    let beta = (1.0 - m) * scale;

    if !(alpha > 0.0 && beta > 0.0 && alpha.is_finite() && beta.is_finite()) {
        warn!(alpha, beta, "degenerate empirical-Bayes fit, using platform default");
        return None;
    }

    debug!(
        alpha,
        beta,
        experiments = rates.len(),
        "using project-historical prior"
    );
    Some(BetaPrior { alpha, beta })
}
