//! Typed paths into a deck project layout.
//!
//! Centralizing path construction keeps file access consistent across the
//! workflow and prevents drift when the layout evolves.
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Convenience wrapper for locating common project artifacts.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    root: PathBuf,
}

impl ProjectPaths {
    /// Create a new path helper rooted at the project root.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Return the project root used for path derivation.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Return the `deck/` directory path.
    pub fn deck_dir(&self) -> PathBuf {
        self.root.join("deck")
    }

    /// Return the `deck/config.json` path.
    pub fn config_path(&self) -> PathBuf {
        self.deck_dir().join("config.json")
    }

    /// Return the `deck/report.json` path.
    pub fn report_path(&self) -> PathBuf {
        self.deck_dir().join("report.json")
    }

    /// Return the `deck/history.jsonl` path.
    pub fn history_path(&self) -> PathBuf {
        self.deck_dir().join("history.jsonl")
    }

    /// Return the `media/` root holding the generation cache.
    pub fn media_root(&self) -> PathBuf {
        self.root.join("media")
    }

    /// Return the `media/audio/` cache directory.
    pub fn audio_dir(&self) -> PathBuf {
        self.media_root().join("audio")
    }

    /// Return the `media/images/` cache directory.
    pub fn images_dir(&self) -> PathBuf {
        self.media_root().join("images")
    }

    /// Return the `output/` directory path.
    pub fn output_dir(&self) -> PathBuf {
        self.root.join("output")
    }

    /// Return the default package path for a deck name.
    pub fn default_package_path(&self, deck_name: &str) -> PathBuf {
        self.output_dir()
            .join(format!("{}.deck", package_stem(deck_name)))
    }
}

/// Create (when requested) and canonicalize a project root.
pub fn ensure_project_root(path: &Path, create: bool) -> Result<PathBuf> {
    if create {
        fs::create_dir_all(path).context("create project root")?;
    }
    path.canonicalize()
        .with_context(|| format!("resolve project root {}", path.display()))
}

fn package_stem(deck_name: &str) -> String {
    let stem: String = deck_name
        .trim()
        .chars()
        .map(|ch| if ch.is_alphanumeric() || ch == '-' { ch } else { '_' })
        .collect();
    if stem.is_empty() {
        "deck".to_string()
    } else {
        stem
    }
}
