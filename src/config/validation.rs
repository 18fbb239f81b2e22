//! Config range validation.
//!
//! Every option is checked against its documented range before the
//! pipeline runs; the first violation fails the call. Validation is pure
//! and reports the offending option by name so the API layer can surface
//! it verbatim.

use thiserror::Error;

use super::defaults as d;
use super::EngineConfig;

/// A config option outside its documented range. Fatal to the call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{option} = {value} out of range: {requirement}")]
    OutOfRange {
        option: &'static str,
        value: f64,
        requirement: &'static str,
    },

    #[error("mc_samples = {requested} exceeds the ceiling of {ceiling}")]
    TooManySamples { requested: usize, ceiling: usize },

    #[error("{count} variants exceeds the ceiling of {ceiling}")]
    TooManyVariants { count: usize, ceiling: usize },

    #[error("unrecognized or malformed option: {0}")]
    Unrecognized(String),
}

/// Validate every option against its documented range.
pub fn validate(config: &EngineConfig) -> Result<(), ConfigError> {
    check_finite_non_negative("loss_threshold", config.loss_threshold)?;
    check_finite_non_negative("rope_half_width", config.rope_half_width)?;

    if !(config.hdi_mass > 0.0 && config.hdi_mass < 1.0) {
        return Err(ConfigError::OutOfRange {
            option: "hdi_mass",
            value: config.hdi_mass,
            requirement: "must be in (0, 1)",
        });
    }

    if config.mc_samples == 0 {
        return Err(ConfigError::OutOfRange {
            option: "mc_samples",
            value: 0.0,
            requirement: "must be at least 1",
        });
    }
    if config.mc_samples > d::MAX_MC_SAMPLES {
        return Err(ConfigError::TooManySamples {
            requested: config.mc_samples,
            ceiling: d::MAX_MC_SAMPLES,
        });
    }

    if !(config.explore_floor >= 0.0 && config.explore_floor <= 1.0) {
        return Err(ConfigError::OutOfRange {
            option: "explore_floor",
            value: config.explore_floor,
            requirement: "must be in [0, 1]",
        });
    }

    if !(config.top_two_beta >= 0.0 && config.top_two_beta <= 1.0) {
        return Err(ConfigError::OutOfRange {
            option: "top_two_beta",
            value: config.top_two_beta,
            requirement: "must be in [0, 1]",
        });
    }

    if !(config.winsorize_p > 0.0 && config.winsorize_p <= 1.0) {
        return Err(ConfigError::OutOfRange {
            option: "winsorize_p",
            value: config.winsorize_p,
            requirement: "must be in (0, 1]",
        });
    }

    if let Some(prior) = config.prior {
        if !(prior.alpha > 0.0 && prior.alpha.is_finite()) {
            return Err(ConfigError::OutOfRange {
                option: "prior.alpha",
                value: prior.alpha,
                requirement: "must be finite and > 0",
            });
        }
        if !(prior.beta > 0.0 && prior.beta.is_finite()) {
            return Err(ConfigError::OutOfRange {
                option: "prior.beta",
                value: prior.beta,
                requirement: "must be finite and > 0",
            });
        }
    }

    let weights = config.engagement_weights;
    for (name, value) in [
        ("engagement_weights.scroll", weights.scroll),
        ("engagement_weights.active_time", weights.active_time),
        ("engagement_weights.clicks", weights.clicks),
        ("engagement_weights.form", weights.form),
    ] {
        check_finite_non_negative(name, value)?;
    }

    Ok(())
}

/// Fail fast when an experiment carries more arms than the sampler supports.
pub fn check_variant_ceiling(count: usize) -> Result<(), ConfigError> {
    if count > d::MAX_VARIANTS {
        return Err(ConfigError::TooManyVariants {
            count,
            ceiling: d::MAX_VARIANTS,
        });
    }
    Ok(())
}

fn check_finite_non_negative(option: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(value.is_finite() && value >= 0.0) {
        return Err(ConfigError::OutOfRange {
            option,
            value,
            requirement: "must be finite and >= 0",
        });
    }
    Ok(())
}
