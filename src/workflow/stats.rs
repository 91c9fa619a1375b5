//! Media cache inspection.
use super::context::ProjectContext;
use crate::cli::MediaStatsArgs;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// File count and byte total for one cache directory.
#[derive(Debug, Serialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirStats {
    pub files: usize,
    pub bytes: u64,
}

#[derive(Debug, Serialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaCacheSummary {
    pub audio: DirStats,
    pub images: DirStats,
    pub total_files: usize,
    pub total_bytes: u64,
}

/// Summarize the on-disk media cache without touching any service.
pub fn run_media_stats(args: &MediaStatsArgs) -> Result<()> {
    let ctx = ProjectContext::load(&args.project)?;
    let audio = dir_stats(&ctx.paths.audio_dir())?;
    let images = dir_stats(&ctx.paths.images_dir())?;
    let summary = MediaCacheSummary {
        audio,
        images,
        total_files: audio.files + images.files,
        total_bytes: audio.bytes + images.bytes,
    };

    if args.json {
        let text = serde_json::to_string_pretty(&summary).context("serialize media stats")?;
        println!("{text}");
    } else {
        println!("media root: {}", ctx.paths.media_root().display());
        println!("audio: {} file(s), {} bytes", audio.files, audio.bytes);
        println!("images: {} file(s), {} bytes", images.files, images.bytes);
        println!(
            "total: {} file(s), {} bytes",
            summary.total_files, summary.total_bytes
        );
    }
    Ok(())
}

/// Count published, non-empty files; pending temp files are ignored.
fn dir_stats(dir: &Path) -> Result<DirStats> {
    let mut stats = DirStats::default();
    if !dir.is_dir() {
        return Ok(stats);
    }
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry.with_context(|| format!("read entry in {}", dir.display()))?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let meta = entry
            .metadata()
            .with_context(|| format!("stat {}", entry.path().display()))?;
        if meta.is_file() && meta.len() > 0 {
            stats.files += 1;
            stats.bytes += meta.len();
        }
    }
    Ok(stats)
}
