use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage. Stages only move forward, one step at a time.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    Initialized,
    DataLoaded,
    MediaEnriched,
    CardsBuilt,
    DeckExported,
}

impl PipelinePhase {
    /// Following phase, or `None` once the deck is exported.
    pub fn next(self) -> Option<PipelinePhase> {
        match self {
            PipelinePhase::Initialized => Some(PipelinePhase::DataLoaded),
            PipelinePhase::DataLoaded => Some(PipelinePhase::MediaEnriched),
            PipelinePhase::MediaEnriched => Some(PipelinePhase::CardsBuilt),
            PipelinePhase::CardsBuilt => Some(PipelinePhase::DeckExported),
            PipelinePhase::DeckExported => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelinePhase::Initialized => "initialized",
            PipelinePhase::DataLoaded => "data_loaded",
            PipelinePhase::MediaEnriched => "media_enriched",
            PipelinePhase::CardsBuilt => "cards_built",
            PipelinePhase::DeckExported => "deck_exported",
        }
    }
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operation was invoked outside the phase it requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation requires phase {required}, pipeline is in {actual}")]
pub struct PhaseViolation {
    pub required: PipelinePhase,
    pub actual: PipelinePhase,
}
