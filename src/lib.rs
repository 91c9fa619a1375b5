//! vocab-deck library: vocabulary rows in, flashcard deck package out.
//!
//! [`pipeline::PipelineController`] gates load, enrichment, card assembly and
//! export behind a strict phase order. Media comes from
//! [`media::MediaGenerationCache`], which reuses any file already produced
//! for the same text or word, and reaches the package through
//! [`media::MediaFileManager`], which embeds identical bytes once.

pub mod cli;
pub mod config;
pub mod handlers;
pub mod media;
pub mod model;
pub mod package;
pub mod paths;
pub mod pipeline;
pub mod report;
pub mod services;
pub mod source;
#[cfg(test)]
mod testing;
pub mod util;
pub mod workflow;
