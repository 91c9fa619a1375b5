//! Content-hash registry for files embedded in the deck package.
//!
//! The generation cache dedups by request key; this layer dedups by the
//! bytes themselves, so the same file reached through two different paths is
//! embedded once.
use super::CacheStats;
use crate::package::PackageWriter;
use crate::util::sha256_hex;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Reference to a file embedded in the package.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MediaReference {
    /// Name used by cards to reference the file.
    pub name: String,
    pub sha256: String,
    pub source: PathBuf,
    pub size_bytes: u64,
}

/// Counters for files offered to the registry.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaStats {
    pub files_added: usize,
    pub duplicates_skipped: usize,
    pub total_size_bytes: u64,
}

/// Registry counters merged with the generation cache counters.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetailedMediaStats {
    pub files_added: usize,
    pub duplicates_skipped: usize,
    pub total_size_bytes: u64,
    pub audio_generated: usize,
    pub audio_reused: usize,
    pub audio_errors: usize,
    pub images_downloaded: usize,
    pub images_reused: usize,
    pub image_errors: usize,
    pub total_media_generated: usize,
    pub total_media_reused: usize,
}

/// Tracks every file embedded in the package and skips repeated content.
pub struct MediaFileManager {
    writer: Box<dyn PackageWriter>,
    registered: HashMap<String, MediaReference>,
    stats: MediaStats,
}

impl MediaFileManager {
    pub fn new(writer: Box<dyn PackageWriter>) -> Self {
        Self {
            writer,
            registered: HashMap::new(),
            stats: MediaStats::default(),
        }
    }

    /// Embed `path` in the package unless identical bytes were added before.
    ///
    /// Returns `Ok(None)` for a skipped duplicate. Unreadable files and
    /// writer failures are errors.
    pub fn add_file(&mut self, path: &Path, allow_duplicates: bool) -> Result<Option<MediaReference>> {
        let (reference, added) = self.embed(path, allow_duplicates)?;
        Ok(added.then_some(reference))
    }

    /// Like [`add_file`](Self::add_file) without duplicates, but a skipped
    /// duplicate resolves to the reference of the file embedded first.
    pub fn register(&mut self, path: &Path) -> Result<MediaReference> {
        self.embed(path, false).map(|(reference, _)| reference)
    }

    fn embed(&mut self, path: &Path, allow_duplicates: bool) -> Result<(MediaReference, bool)> {
        let bytes = fs::read(path).with_context(|| format!("read media {}", path.display()))?;
        let sha256 = sha256_hex(&bytes);

        if !allow_duplicates {
            if let Some(first) = self.registered.get(&sha256) {
                self.stats.duplicates_skipped += 1;
                tracing::debug!(
                    path = %path.display(),
                    first = %first.source.display(),
                    "duplicate media skipped"
                );
                return Ok((first.clone(), false));
            }
        }

        let name = self
            .writer
            .add_media(path)
            .with_context(|| format!("add {} to package", path.display()))?;
        let size_bytes = bytes.len() as u64;
        let reference = MediaReference {
            name,
            sha256: sha256.clone(),
            source: path.to_path_buf(),
            size_bytes,
        };
        self.registered
            .entry(sha256)
            .or_insert_with(|| reference.clone());
        self.stats.files_added += 1;
        self.stats.total_size_bytes += size_bytes;
        Ok((reference, true))
    }

    /// Name [`register`](Self::register) would give `path`, without
    /// embedding anything.
    ///
    /// `pending` remembers content first seen during the same dry run, so
    /// repeated bytes resolve to the earlier file just as they do when
    /// registering. Content not yet in the package keeps its file name.
    pub fn resolve_name(
        &self,
        path: &Path,
        pending: &mut HashMap<String, String>,
    ) -> Result<String> {
        let bytes = fs::read(path).with_context(|| format!("read media {}", path.display()))?;
        let sha256 = sha256_hex(&bytes);
        if let Some(first) = self.registered.get(&sha256) {
            return Ok(first.name.clone());
        }
        if let Some(name) = pending.get(&sha256) {
            return Ok(name.clone());
        }
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| anyhow!("media path has no file name: {}", path.display()))?;
        pending.insert(sha256, name.clone());
        Ok(name)
    }

    pub fn is_registered(&self, sha256: &str) -> bool {
        self.registered.contains_key(sha256)
    }

    pub fn get_media_stats(&self) -> MediaStats {
        self.stats
    }

    pub fn get_detailed_stats(&self, cache: &CacheStats) -> DetailedMediaStats {
        DetailedMediaStats {
            files_added: self.stats.files_added,
            duplicates_skipped: self.stats.duplicates_skipped,
            total_size_bytes: self.stats.total_size_bytes,
            audio_generated: cache.audio_generated,
            audio_reused: cache.audio_reused,
            audio_errors: cache.audio_errors,
            images_downloaded: cache.images_downloaded,
            images_reused: cache.images_reused,
            image_errors: cache.image_errors,
            total_media_generated: cache.generated(),
            total_media_reused: cache.reused(),
        }
    }

    /// Forget every registered hash.
    ///
    /// Later `add_file` calls can then embed content that is already in the
    /// package; only use this when re-processing a directory on purpose.
    pub fn clear_cache(&mut self) {
        tracing::warn!(
            forgotten = self.registered.len(),
            "media dedup set cleared; duplicate files may be embedded"
        );
        self.registered.clear();
    }

    pub fn writer_mut(&mut self) -> &mut dyn PackageWriter {
        self.writer.as_mut()
    }
}
