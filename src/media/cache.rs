//! Content-addressed cache in front of the speech and image services.
//!
//! Every request maps to a deterministic path under `audio/` or `images/`.
//! An existing non-empty file at that path is reused without touching the
//! service; a miss calls the service exactly once and publishes the result
//! with a temp-file rename so a partial write never looks like a hit.
use crate::services::{ImageSearch, SpeechSynthesizer};
use crate::util::sha256_hex;
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

const AUDIO_EXTENSION: &str = "mp3";
const IMAGE_EXTENSION: &str = "jpg";
const NAME_HASH_CHARS: usize = 16;

static NON_ALNUM_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{Alphabetic}\p{Nd}]+").expect("valid regex"));

/// Generation counters since the cache was constructed.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub audio_generated: usize,
    pub audio_reused: usize,
    pub audio_errors: usize,
    pub images_downloaded: usize,
    pub images_reused: usize,
    pub image_errors: usize,
}

impl CacheStats {
    /// Files produced by a service call, as opposed to reused from disk.
    pub fn generated(&self) -> usize {
        self.audio_generated + self.images_downloaded
    }

    pub fn reused(&self) -> usize {
        self.audio_reused + self.images_reused
    }
}

/// Deterministic audio file name for a piece of text.
pub fn audio_file_name(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let hash = sha256_hex(text.as_bytes());
    Some(format!(
        "audio_{}.{AUDIO_EXTENSION}",
        &hash[..NAME_HASH_CHARS]
    ))
}

/// Deterministic image file name for a target word.
pub fn image_file_name(word: &str) -> Option<String> {
    let word = word.trim();
    if word.is_empty() {
        return None;
    }
    let lowered = word.to_lowercase();
    let normalized = NON_ALNUM_RUN.replace_all(&lowered, "_");
    let normalized = normalized.trim_matches('_');
    if normalized.is_empty() {
        let hash = sha256_hex(word.as_bytes());
        return Some(format!(
            "image_{}.{IMAGE_EXTENSION}",
            &hash[..NAME_HASH_CHARS]
        ));
    }
    Some(format!("{normalized}.{IMAGE_EXTENSION}"))
}

/// Deduplicating front for the generation services.
pub struct MediaGenerationCache {
    audio_dir: PathBuf,
    images_dir: PathBuf,
    speech: Option<Box<dyn SpeechSynthesizer>>,
    images: Option<Box<dyn ImageSearch>>,
    stats: CacheStats,
}

impl MediaGenerationCache {
    pub fn new(audio_dir: PathBuf, images_dir: PathBuf) -> Self {
        Self {
            audio_dir,
            images_dir,
            speech: None,
            images: None,
            stats: CacheStats::default(),
        }
    }

    pub fn with_speech(mut self, speech: Box<dyn SpeechSynthesizer>) -> Self {
        self.speech = Some(speech);
        self
    }

    pub fn with_images(mut self, images: Box<dyn ImageSearch>) -> Self {
        self.images = Some(images);
        self
    }

    /// Whether audio requests can be served (a synthesizer is configured).
    pub fn audio_enabled(&self) -> bool {
        self.speech.is_some()
    }

    /// Whether image requests can be served (a search backend is configured).
    pub fn images_enabled(&self) -> bool {
        self.images.is_some()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Return the audio file for `text`, synthesizing it on a miss.
    ///
    /// Failures are counted and logged, never returned.
    pub fn get_or_create_audio(&mut self, text: &str) -> Option<PathBuf> {
        let Some(name) = audio_file_name(text) else {
            self.stats.audio_errors += 1;
            tracing::warn!("audio requested for empty text");
            return None;
        };
        let path = self.audio_dir.join(name);
        if is_cached(&path) {
            self.stats.audio_reused += 1;
            tracing::debug!(path = %path.display(), "audio cache hit");
            return Some(path);
        }

        match self.generate_audio(text.trim(), &path) {
            Ok(()) => {
                self.stats.audio_generated += 1;
                tracing::debug!(path = %path.display(), "audio generated");
                Some(path)
            }
            Err(err) => {
                self.stats.audio_errors += 1;
                tracing::warn!(text = text.trim(), error = %format!("{err:#}"), "audio generation failed");
                None
            }
        }
    }

    /// Return the image for `word`, searching `primary_query` then
    /// `backup_query` on a miss.
    ///
    /// The cache key is the normalized word, not the queries, so a later
    /// request with a different query still reuses the stored image.
    pub fn get_or_create_image(
        &mut self,
        word: &str,
        primary_query: &str,
        backup_query: &str,
    ) -> Option<PathBuf> {
        let Some(name) = image_file_name(word) else {
            self.stats.image_errors += 1;
            tracing::warn!("image requested for empty word");
            return None;
        };
        let path = self.images_dir.join(name);
        if is_cached(&path) {
            self.stats.images_reused += 1;
            tracing::debug!(path = %path.display(), "image cache hit");
            return Some(path);
        }

        match self.download_image(primary_query, backup_query, &path) {
            Ok(()) => {
                self.stats.images_downloaded += 1;
                tracing::debug!(path = %path.display(), "image downloaded");
                Some(path)
            }
            Err(err) => {
                self.stats.image_errors += 1;
                tracing::warn!(word = word.trim(), error = %format!("{err:#}"), "image download failed");
                None
            }
        }
    }

    fn generate_audio(&self, text: &str, path: &Path) -> Result<()> {
        let speech = self
            .speech
            .as_ref()
            .ok_or_else(|| anyhow!("no speech synthesizer configured"))?;
        publish_generated(path, |tmp| speech.synthesize(text, tmp))
    }

    fn download_image(&self, primary_query: &str, backup_query: &str, path: &Path) -> Result<()> {
        let images = self
            .images
            .as_ref()
            .ok_or_else(|| anyhow!("no image search configured"))?;
        let mut queries = vec![primary_query.trim()];
        let backup_query = backup_query.trim();
        if backup_query != primary_query.trim() {
            queries.push(backup_query);
        }

        let mut last_error = None;
        for query in queries.into_iter().filter(|query| !query.is_empty()) {
            let attempt = publish_generated(path, |tmp| {
                if images.download(query, tmp)? {
                    Ok(())
                } else {
                    Err(anyhow!("no image found for {query:?}"))
                }
            });
            match attempt {
                Ok(()) => return Ok(()),
                Err(err) => {
                    tracing::debug!(query, error = %format!("{err:#}"), "image query failed");
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| anyhow!("no image queries to try")))
    }
}

fn is_cached(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

/// Let `generate` write into a temp file beside `path`, then rename it into
/// place when it produced a non-empty file.
fn publish_generated(path: &Path, generate: impl FnOnce(&Path) -> Result<()>) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| anyhow!("media path has no parent: {}", path.display()))?;
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    // Keep the extension so format-sniffing tools write the right encoding.
    let suffix = path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    let tmp = tempfile::Builder::new()
        .prefix(".pending-")
        .suffix(&suffix)
        .tempfile_in(dir)
        .with_context(|| format!("create temp file in {}", dir.display()))?;

    generate(tmp.path())?;

    let written = fs::metadata(tmp.path()).map(|meta| meta.len()).unwrap_or(0);
    if written == 0 {
        return Err(anyhow!("service produced an empty file"));
    }
    tmp.persist(path)
        .with_context(|| format!("publish {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
