//! Workflow init step.
//!
//! Init writes a default config and the media cache directories so later
//! steps can rely on the project layout.
use crate::cli::InitArgs;
use crate::config;
use crate::paths::{ensure_project_root, ProjectPaths};
use anyhow::{anyhow, Context, Result};
use std::fs;

/// Run the init step, creating the config and project directories.
pub fn run_init(args: &InitArgs) -> Result<()> {
    let root = ensure_project_root(&args.project, true)?;
    let paths = ProjectPaths::new(root);
    let config_path = paths.config_path();
    if config_path.is_file() && !args.force {
        return Err(anyhow!(
            "config already exists at {} (use --force to overwrite)",
            config_path.display()
        ));
    }

    let mut config = config::default_config();
    if let Some(name) = args.deck_name.as_deref().map(str::trim) {
        config.deck_name = name.to_string();
    }
    config::validate_config(&config)?;

    for dir in [paths.audio_dir(), paths.images_dir(), paths.output_dir()] {
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    }
    config::write_config(paths.root(), &config)?;
    tracing::info!(path = %config_path.display(), deck = config.deck_name.as_str(), "project initialized");
    println!("wrote {}", config_path.display());
    Ok(())
}

#[cfg(test)]
#[path = "init_tests.rs"]
mod tests;
