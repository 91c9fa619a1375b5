use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use vocab_deck::cli::{Command, RootArgs};
use vocab_deck::workflow;

fn main() -> Result<()> {
    let args = RootArgs::parse();
    init_tracing(args.verbose);

    match args.command {
        Command::Init(args) => workflow::run_init(&args),
        Command::Preview(args) => workflow::run_preview(&args),
        Command::Build(args) => workflow::run_build(&args),
        Command::MediaStats(args) => workflow::run_media_stats(&args),
    }
}

/// Log to stderr; `RUST_LOG` wins over the `--verbose` default.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
