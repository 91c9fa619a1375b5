//! Build report snapshot and append-only run history.
use crate::model::ErrorBuckets;
use crate::paths::ProjectPaths;
use crate::pipeline::PipelineSummary;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;

pub const REPORT_SCHEMA_VERSION: u32 = 1;
pub const HISTORY_SCHEMA_VERSION: u32 = 1;

/// Latest build outcome, rewritten by every `build` run.
#[derive(Debug, Serialize)]
pub struct BuildReport {
    pub schema_version: u32,
    pub generated_at_epoch_ms: u128,
    pub deck_name: String,
    pub input: String,
    pub summary: PipelineSummary,
    pub errors: ErrorBuckets,
}

/// One line of `deck/history.jsonl`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct HistoryEntry {
    pub schema_version: u32,
    pub started_at_epoch_ms: u128,
    pub finished_at_epoch_ms: u128,
    pub step: String,
    pub success: bool,
    #[serde(default)]
    pub cards: usize,
    #[serde(default)]
    pub errors: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Write the latest build report snapshot.
pub fn write_report(project_root: &Path, report: &BuildReport) -> Result<()> {
    let paths = ProjectPaths::new(project_root.to_path_buf());
    let path = paths.report_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("create deck dir")?;
    }
    let text = serde_json::to_string_pretty(report).context("serialize build report")?;
    fs::write(&path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Append a history entry as JSONL.
pub fn append_history(project_root: &Path, entry: &HistoryEntry) -> Result<()> {
    let paths = ProjectPaths::new(project_root.to_path_buf());
    let path = paths.history_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("create deck dir")?;
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open {}", path.display()))?;
    let line = serde_json::to_string(entry).context("serialize history entry")?;
    file.write_all(line.as_bytes())
        .with_context(|| format!("write {}", path.display()))?;
    file.write_all(b"\n")
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Read every history entry, oldest first.
pub fn load_history(project_root: &Path) -> Result<Vec<HistoryEntry>> {
    let paths = ProjectPaths::new(project_root.to_path_buf());
    let path = paths.history_path();
    if !path.is_file() {
        return Ok(Vec::new());
    }
    let text = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(idx, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("parse {} entry {}", path.display(), idx + 1))
        })
        .collect()
}
