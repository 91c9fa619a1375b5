//! CLI argument parsing for the deck workflow.
//!
//! The CLI stays thin: each command maps to one workflow entry point that
//! loads the project config and drives the pipeline.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint for the deck workflow.
#[derive(Parser, Debug)]
#[command(
    name = "vdeck",
    version,
    about = "Vocabulary deck builder with cached audio and image enrichment",
    after_help = "Commands:\n  init --project <dir>                      Write deck/config.json with defaults\n  preview --project <dir> --input <dir>     Load, enrich and assemble cards without exporting\n  build --project <dir> --input <dir>       Run the full pipeline and write the package\n  media-stats --project <dir>               Summarize the on-disk media cache\n\nExamples:\n  vdeck init --project ~/decks/german\n  vdeck preview --project ~/decks/german --input ~/vocab\n  vdeck build --project ~/decks/german --input ~/vocab --json\n  vdeck media-stats --project ~/decks/german",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Log debug events (RUST_LOG overrides)
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level workflow commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    Init(InitArgs),
    Preview(PreviewArgs),
    Build(BuildArgs),
    MediaStats(MediaStatsArgs),
}

/// Init command inputs for bootstrapping a project.
#[derive(Parser, Debug)]
#[command(about = "Initialize a deck project (config + media directories)")]
pub struct InitArgs {
    /// Project root holding deck/, media/ and output/
    #[arg(long, value_name = "DIR")]
    pub project: PathBuf,

    /// Deck name written to the new config
    #[arg(long, value_name = "NAME")]
    pub deck_name: Option<String>,

    /// Overwrite an existing config.json
    #[arg(long)]
    pub force: bool,
}

/// Preview command inputs: everything up to card assembly.
#[derive(Parser, Debug)]
#[command(about = "Load, enrich and preview cards without writing a package")]
pub struct PreviewArgs {
    /// Project root holding deck/, media/ and output/
    #[arg(long, value_name = "DIR")]
    pub project: PathBuf,

    /// Directory of vocabulary CSV files
    #[arg(long, value_name = "DIR")]
    pub input: PathBuf,

    /// Items per enrichment batch (defaults to the config value)
    #[arg(long, value_name = "N")]
    pub batch_size: Option<usize>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

/// Build command inputs for a full pipeline run.
#[derive(Parser, Debug)]
#[command(about = "Build the deck package and write deck/report.json")]
pub struct BuildArgs {
    /// Project root holding deck/, media/ and output/
    #[arg(long, value_name = "DIR")]
    pub project: PathBuf,

    /// Directory of vocabulary CSV files
    #[arg(long, value_name = "DIR")]
    pub input: PathBuf,

    /// Package path (defaults to output/<deck name>.deck)
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Items per enrichment batch (defaults to the config value)
    #[arg(long, value_name = "N")]
    pub batch_size: Option<usize>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

/// Media cache summary inputs.
#[derive(Parser, Debug)]
#[command(about = "Count cached audio and image files")]
pub struct MediaStatsArgs {
    /// Project root holding deck/, media/ and output/
    #[arg(long, value_name = "DIR")]
    pub project: PathBuf,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        RootArgs::command().debug_assert();
    }

    #[test]
    fn build_accepts_optional_output_and_batch_size() {
        let args = RootArgs::try_parse_from([
            "vdeck",
            "build",
            "--project",
            "/tmp/deck",
            "--input",
            "/tmp/vocab",
            "--batch-size",
            "4",
            "--verbose",
        ])
        .expect("parse");
        assert!(args.verbose);
        match args.command {
            Command::Build(build) => {
                assert_eq!(build.batch_size, Some(4));
                assert!(build.output.is_none());
                assert!(!build.json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
