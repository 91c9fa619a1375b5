//! Batched media enrichment for the items of one type tag.
use crate::handlers::ItemHandler;
use crate::media::MediaGenerationCache;
use crate::model::{EnrichmentError, EnrichmentResult, LoadedItem, MediaKind, MediaRefs, TypeTag};
use crate::services::QueryGenerator;
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::path::Path;

/// Progress after one batch. `processed` never exceeds `total`.
///
/// `media_created` counts files generated by this run; cache hits are
/// attached to items but not counted.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub type_tag: TypeTag,
    pub processed: usize,
    pub total: usize,
    pub media_created: usize,
}

/// Borrowed collaborators used while enriching one batch.
pub struct EnrichContext<'a> {
    pub handler: &'a dyn ItemHandler,
    pub cache: &'a mut MediaGenerationCache,
    pub generator: Option<&'a dyn QueryGenerator>,
}

/// Resumable position in one tag's enrichment run.
///
/// Holds only owned state so a caller can keep it across snapshots while
/// re-borrowing the items and collaborators for each step.
#[derive(Debug)]
pub struct BatchCursor {
    batch_size: usize,
    position: usize,
    total: usize,
    media_created: usize,
    finished: bool,
    result: EnrichmentResult,
}

impl BatchCursor {
    pub fn new(type_tag: TypeTag, total: usize, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(anyhow!("batch size must be at least 1"));
        }
        Ok(Self {
            batch_size,
            position: 0,
            total,
            media_created: 0,
            finished: false,
            result: EnrichmentResult::new(type_tag),
        })
    }

    pub fn type_tag(&self) -> TypeTag {
        self.result.type_tag
    }

    /// Enrich the next batch of `items` and report cumulative progress.
    ///
    /// Returns `None` once every item was processed, and keeps returning
    /// `None` afterwards.
    pub fn advance(
        &mut self,
        items: &[LoadedItem],
        ctx: &mut EnrichContext<'_>,
    ) -> Option<ProgressSnapshot> {
        if self.finished {
            return None;
        }
        let total = self.total.min(items.len());
        if self.position >= total {
            self.finished = true;
            return None;
        }

        let end = (self.position + self.batch_size).min(total);
        for item in &items[self.position..end] {
            self.enrich_item(item, ctx);
        }
        self.position = end;

        let snapshot = ProgressSnapshot {
            type_tag: self.result.type_tag,
            processed: self.position.min(self.total),
            total: self.total,
            media_created: self.media_created,
        };
        tracing::debug!(
            tag = %snapshot.type_tag,
            processed = snapshot.processed,
            total = snapshot.total,
            media_created = snapshot.media_created,
            "batch enriched"
        );
        Some(snapshot)
    }

    pub fn into_result(self) -> EnrichmentResult {
        self.result
    }

    fn enrich_item(&mut self, item: &LoadedItem, ctx: &mut EnrichContext<'_>) {
        let generated_before = ctx.cache.stats().generated();
        let mut media = MediaRefs::new();

        if ctx.cache.audio_enabled() {
            for (field, text) in ctx.handler.audio_segments(item) {
                match ctx.cache.get_or_create_audio(&text) {
                    Some(path) => {
                        self.record_file(&path);
                        media.insert(field, path);
                    }
                    None => self.record_error(
                        item,
                        MediaKind::Audio,
                        &field,
                        format!("audio generation failed for {text:?}"),
                    ),
                }
            }
        }

        if ctx.cache.images_enabled() {
            match ctx.handler.image_query(item, ctx.generator) {
                Ok(Some(query)) => {
                    match ctx
                        .cache
                        .get_or_create_image(&query.word, &query.primary, &query.backup)
                    {
                        Some(path) => {
                            self.record_file(&path);
                            media.insert("image".to_string(), path);
                        }
                        None => self.record_error(
                            item,
                            MediaKind::Image,
                            "image",
                            format!("no image for {:?}", query.word),
                        ),
                    }
                }
                Ok(None) => {}
                Err(err) => self.record_error(item, MediaKind::Image, "image", format!("{err:#}")),
            }
        }

        self.media_created += ctx.cache.stats().generated() - generated_before;
        self.result.records.push(item.clone());
        self.result.media_data.push(media);
    }

    fn record_file(&mut self, path: &Path) {
        self.result.media_files.insert(path.to_path_buf());
    }

    fn record_error(&mut self, item: &LoadedItem, kind: MediaKind, field: &str, message: String) {
        tracing::debug!(
            tag = %item.type_tag,
            index = item.index,
            kind = %kind,
            field,
            message = message.as_str(),
            "enrichment error"
        );
        self.result.enrichment_errors.push(EnrichmentError {
            record_index: item.index,
            record_type: item.type_tag,
            media_kind: kind,
            field: field.to_string(),
            message,
        });
    }
}

/// Iterator driving a [`BatchCursor`] over borrowed items and collaborators.
pub struct BatchEnricher<'a> {
    cursor: BatchCursor,
    items: &'a [LoadedItem],
    ctx: EnrichContext<'a>,
}

impl<'a> BatchEnricher<'a> {
    /// Start a run over `items`. Fails when `batch_size` is zero.
    pub fn new(
        type_tag: TypeTag,
        items: &'a [LoadedItem],
        batch_size: usize,
        ctx: EnrichContext<'a>,
    ) -> Result<Self> {
        Ok(Self {
            cursor: BatchCursor::new(type_tag, items.len(), batch_size)?,
            items,
            ctx,
        })
    }

    /// Accumulated result; items not yet reached are absent.
    pub fn into_result(self) -> EnrichmentResult {
        self.cursor.into_result()
    }
}

impl Iterator for BatchEnricher<'_> {
    type Item = ProgressSnapshot;

    fn next(&mut self) -> Option<ProgressSnapshot> {
        self.cursor.advance(self.items, &mut self.ctx)
    }
}

impl std::iter::FusedIterator for BatchEnricher<'_> {}
