//! Statistical decision pipeline.
//!
//! A single [`evaluate`] call runs the stages leaves-first over one
//! immutable snapshot:
//!
//! - `prior`: three-tier Beta prior resolution (user → project history →
//!   platform default)
//! - `proxy`: engagement scoring, pooled winsorization, CUPED
//! - `posterior`: Beta-Binomial conjugate updates with capped proxy
//!   blending for sparse arms
//! - `sampler`: the one seeded Monte-Carlo pass every later stage reads
//! - `decision`: ROPE + epsilon status ladder and the traffic projection
//! - `allocator`: top-two Thompson allocation with an exploration floor
//! - `shrinkage`: James-Stein effect-size reporting
//! - `recommend`: plain-English rendering of the decision record
//!
//! The call is pure: no global state, no logging beyond debug-level
//! narration, and with `mc_seed` set the output is byte-identical across
//! runs. Diagnostics travel back as fields of
//! [`crate::types::report::EngineResult`].

pub mod stats;
pub mod prior;
pub mod proxy;
pub mod posterior;
pub mod sampler;
pub mod decision;
pub mod allocator;
pub mod shrinkage;
pub mod recommend;

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::debug;

use crate::config::defaults as d;
use crate::config::validation::{self, ConfigError};
use crate::types::report::{EngineResult, VariantReport};
use crate::types::snapshot::{DataError, ExperimentSnapshot};
use posterior::BetaPosterior;

/// Any failure an evaluation can surface. The caller decides how to
/// present it; the engine never retries.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Data(#[from] DataError),
}

/// Evaluate one experiment snapshot into the full decision record.
pub fn evaluate(snapshot: &ExperimentSnapshot) -> Result<EngineResult, EngineError> {
    let config = &snapshot.config;
    validation::validate(config)?;
    validation::check_variant_ceiling(snapshot.variants.len())?;
    snapshot.validate()?;

    let total_visitors = snapshot.total_exposures();
    debug!(
        experiment = %snapshot.experiment_key,
        variants = snapshot.variants.len(),
        total_visitors,
        "evaluating snapshot"
    );

    let (prior, prior_used) = prior::resolve(config, &snapshot.history);
    let proxies = proxy::summarize(
        &snapshot.variants,
        &snapshot.engagement,
        &snapshot.covariates,
        config,
    );
    let proxy_present = !proxies.is_empty();

    let posteriors: Vec<BetaPosterior> = snapshot
        .variants
        .iter()
        .map(|v| {
            posterior::for_variant(
                prior,
                snapshot.exposures_of(v),
                snapshot.conversions_of(v),
                proxies.get(v).copied(),
                config,
            )
        })
        .collect();
    let posterior_means: Vec<f64> = posteriors.iter().map(BetaPosterior::mean).collect();

    let active = snapshot.active_indices();
    let mut rng = match config.mc_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let draws = sampler::sample(
        &posteriors,
        config.mc_samples,
        config.top_two_beta,
        &active,
        &mut rng,
    )?;

    let probability_best = draws.probability_best();
    let losses = draws.expected_loss();

    let decision = decision::decide(snapshot, &posterior_means, &losses, &draws, proxy_present);

    let suggested_allocation = if total_visitors == 0 {
        allocator::uniform(&snapshot.variants, &active)
    } else {
        allocator::allocate(&snapshot.variants, &active, &draws, config.explore_floor)
    };

    let treatment = best_non_control(&losses);
    let effect = shrinkage::estimate(
        &posterior_means,
        &draws,
        0,
        treatment,
        &snapshot.history,
        config.shrinkage,
    );

    let recommendation = recommend::recommendation(snapshot, &decision);

    let variants: Vec<VariantReport> = snapshot
        .variants
        .iter()
        .enumerate()
        .map(|(i, key)| {
            let visitors = snapshot.exposures_of(key);
            let conversions = snapshot.conversions_of(key);
            let conversion_rate = if visitors > 0 {
                conversions as f64 / visitors as f64
            } else {
                0.0
            };
            VariantReport {
                variant_key: key.clone(),
                visitors,
                conversions,
                conversion_rate,
                posterior_alpha: posteriors[i].alpha,
                posterior_beta: posteriors[i].beta,
                posterior_mean: posterior_means[i],
                credible_interval: sampler::hdi(draws.column(i), config.hdi_mass),
                engagement_score: proxies.get(key).map(|p| p.mean),
                probability_best: probability_best[i],
                expected_loss: losses[i],
            }
        })
        .collect();

    let probability_b_beats_a = if snapshot.variants.len() == 2 {
        Some(draws.probability_greater(1, 0))
    } else {
        None
    };

    Ok(EngineResult {
        experiment_key: snapshot.experiment_key.clone(),
        total_visitors,
        variants,
        probability_b_beats_a,
        decision: decision.summary,
        rope_analysis: decision.rope_analysis,
        suggested_allocation,
        raw_effect_size: Some(effect.raw),
        shrunk_effect_size: Some(effect.shrunk),
        prior_used,
        recommendation,
    })
}

/// Best non-control arm by expected loss, earlier index winning ties.
/// Effect sizes are reported for this arm against the control.
fn best_non_control(losses: &[f64]) -> usize {
    let mut best = 1;
    for v in 2..losses.len() {
        if losses[v] < losses[best] - d::LOSS_TIE_EPSILON {
            best = v;
        }
    }
    best
}
