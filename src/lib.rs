//! Uplift Engine: Bayesian decision-making for small-sample A/B experiments
//!
//! Given per-variant exposure counts, conversion counts, and optional
//! engagement signals, the engine produces posterior beliefs, an
//! expected-loss ship/keep-testing/equivalence decision, a Thompson-sampling
//! traffic allocation for the next period, and a plain-English
//! recommendation. It is built to stay useful where classical tests are
//! silent: one conversion against zero on ~100 visitors.
//!
//! ## Architecture
//!
//! - **Prior Resolver**: three-tier Beta prior fallback (user-specified →
//!   project empirical Bayes → platform default)
//! - **Proxy Scorer**: bounded engagement score with pooled winsorization
//!   and CUPED variance reduction
//! - **Posterior Engine**: Beta-Binomial conjugate updates with capped
//!   proxy pseudo-observations for sparse arms
//! - **Monte-Carlo Sampler**: one seeded sampling pass feeding every
//!   downstream stage (P(best), expected loss, highest-density intervals)
//! - **Decision / Allocator / Shrinkage**: ROPE + epsilon rule ladder,
//!   top-two Thompson allocation with an exploration floor, James-Stein
//!   effect-size reporting
//! - **Calibrator**: offline OLS fit of engagement weights against
//!   historical conversions
//!
//! The engine is a pure function of an [`ExperimentSnapshot`]. All
//! cross-call state (priors, calibrated weights) is persisted by the caller
//! and arrives as explicit input.

pub mod config;
pub mod types;
pub mod engine;
pub mod calibration;

// Re-export configuration
pub use config::{BetaPrior, CupedThetaSource, EngagementWeights, EngineConfig};
pub use config::validation::ConfigError;

// Re-export input types
pub use types::snapshot::{
    DataError, EngagementSignals, ExperimentSnapshot, HistoricalExperiment,
};

// Re-export the result contract
pub use types::report::{
    DecisionStatus, DecisionSummary, EngineResult, PriorSource, RopeAnalysis,
    RopeVerdict, VariantReport,
};

// Re-export the engine entry point
pub use engine::{evaluate, EngineError};

// Re-export offline calibration
pub use calibration::{
    calibrate, CalibrationError, CalibrationObservation, CalibrationResult,
};
