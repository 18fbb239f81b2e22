//! Input and output types: snapshot (input contract) and report (the JSON
//! result contract consumed by the dashboard and API layer).

pub mod snapshot;
pub mod report;

pub use snapshot::{DataError, EngagementSignals, ExperimentSnapshot, HistoricalExperiment};
pub use report::{
    DecisionStatus, DecisionSummary, EngineResult, PriorSource, RopeAnalysis, RopeVerdict,
    VariantReport,
};
