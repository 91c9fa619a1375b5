//! Workflow entry points behind each CLI command.
//!
//! Every step loads the project config, wires collaborators from it, and
//! keeps printing and persistence out of the pipeline itself.
mod context;
mod init;
mod run;
mod stats;

pub use init::run_init;
pub use run::{run_build, run_preview};
pub use stats::run_media_stats;
