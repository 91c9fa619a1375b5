//! Phase-gated enrichment pipeline.
mod batch;
mod controller;
mod phase;

pub use batch::{BatchCursor, BatchEnricher, EnrichContext, ProgressSnapshot};
pub use controller::{
    BuildResult, BuiltCard, EnrichmentProgress, PipelineBuilder, PipelineController,
    PipelineSummary,
};
pub use phase::{PhaseViolation, PipelinePhase};
