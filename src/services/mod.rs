//! External generation services used during enrichment.
//!
//! The pipeline only sees the traits below; the concrete command- and
//! HTTP-backed implementations are wired in by the workflow layer.
mod command;
mod image;
mod query;
mod tts;

pub use image::HttpImageSearch;
pub use query::CommandQueryGenerator;
pub use tts::CommandSynthesizer;

use anyhow::Result;
use std::path::Path;

/// Text-to-speech backend writing one audio file per call.
pub trait SpeechSynthesizer {
    /// Synthesize `text` into `destination`. Errors and empty output are both
    /// treated as a miss by the caller.
    fn synthesize(&self, text: &str, destination: &Path) -> Result<()>;
}

/// Image search backend writing the best match for a query.
pub trait ImageSearch {
    /// Download the best image for `query` into `destination`.
    ///
    /// Returns `Ok(false)` when the search produced no usable result.
    fn download(&self, query: &str, destination: &Path) -> Result<bool>;
}

/// Optional generator turning item context into an image search query.
pub trait QueryGenerator {
    fn generate_query(&self, context: &str) -> Result<String>;
}
