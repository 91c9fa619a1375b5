//! Phase-gated orchestration of load, enrichment, card assembly and export.
use super::batch::{BatchCursor, EnrichContext, ProgressSnapshot};
use super::phase::{PhaseViolation, PipelinePhase};
use crate::handlers::HandlerRegistry;
use crate::media::{CacheStats, DetailedMediaStats, MediaFileManager, MediaGenerationCache};
use crate::model::{
    BuildError, EnrichmentResult, ErrorBuckets, LoadedItem, MediaNames, MediaRefs, TypeTag,
};
use crate::package::{
    CardAssembler, NoteRecord, NoteTypeId, PackageSummary, PackageWriter, TemplateCardAssembler,
};
use crate::services::QueryGenerator;
use crate::source::{CsvDirectorySource, ItemSource};
use crate::util::sha256_hex;
use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;

/// One assembled card, ready to be written as a note.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct BuiltCard {
    pub type_tag: TypeTag,
    pub record_index: usize,
    pub note_type: NoteTypeId,
    pub guid: String,
    pub fields: Vec<String>,
    pub tags: Vec<String>,
}

/// Output of a build or preview run.
#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct BuildResult {
    pub cards: Vec<BuiltCard>,
    pub errors: Vec<BuildError>,
}

/// Counts describing the pipeline at its current phase.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PipelineSummary {
    pub phase: PipelinePhase,
    pub items_loaded: usize,
    pub items_by_tag: BTreeMap<String, usize>,
    pub items_enriched: usize,
    pub media_files: usize,
    pub cards_built: usize,
    pub validation_errors: usize,
    pub enrichment_errors: usize,
    pub build_errors: usize,
    pub media: DetailedMediaStats,
    pub package: Option<PackageSummary>,
}

/// Constructor for [`PipelineController`] with injectable collaborators.
pub struct PipelineBuilder {
    cache: MediaGenerationCache,
    writer: Box<dyn PackageWriter>,
    source: Box<dyn ItemSource>,
    handlers: HandlerRegistry,
    assembler: Box<dyn CardAssembler>,
    generator: Option<Box<dyn QueryGenerator>>,
}

impl PipelineBuilder {
    pub fn new(cache: MediaGenerationCache, writer: Box<dyn PackageWriter>) -> Self {
        Self {
            cache,
            writer,
            source: Box::new(CsvDirectorySource),
            handlers: HandlerRegistry::with_builtin(),
            assembler: Box::new(TemplateCardAssembler::new("Vocabulary")),
            generator: None,
        }
    }

    pub fn source(mut self, source: Box<dyn ItemSource>) -> Self {
        self.source = source;
        self
    }

    pub fn handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn assembler(mut self, assembler: Box<dyn CardAssembler>) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn query_generator(mut self, generator: Box<dyn QueryGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn build(self) -> PipelineController {
        PipelineController {
            phase: PipelinePhase::Initialized,
            source: self.source,
            handlers: self.handlers,
            cache: self.cache,
            generator: self.generator,
            assembler: self.assembler,
            media: MediaFileManager::new(self.writer),
            loaded: IndexMap::new(),
            enriched: IndexMap::new(),
            built: Vec::new(),
            errors: ErrorBuckets::default(),
            note_type_ids: HashMap::new(),
            package: None,
        }
    }
}

/// Owns pipeline state and gates every mutation on the current phase.
pub struct PipelineController {
    phase: PipelinePhase,
    source: Box<dyn ItemSource>,
    handlers: HandlerRegistry,
    cache: MediaGenerationCache,
    generator: Option<Box<dyn QueryGenerator>>,
    assembler: Box<dyn CardAssembler>,
    media: MediaFileManager,
    loaded: IndexMap<TypeTag, Vec<LoadedItem>>,
    enriched: IndexMap<TypeTag, EnrichmentResult>,
    built: Vec<BuiltCard>,
    errors: ErrorBuckets,
    note_type_ids: HashMap<TypeTag, NoteTypeId>,
    package: Option<PackageSummary>,
}

impl PipelineController {
    pub fn phase(&self) -> PipelinePhase {
        self.phase
    }

    fn require(&self, required: PipelinePhase) -> Result<()> {
        if self.phase != required {
            return Err(PhaseViolation {
                required,
                actual: self.phase,
            }
            .into());
        }
        Ok(())
    }

    fn advance(&mut self) {
        if let Some(next) = self.phase.next() {
            tracing::info!(from = %self.phase, to = %next, "pipeline phase advanced");
            self.phase = next;
        }
    }

    /// Load items from `input`. Row problems are recorded, not returned.
    pub fn load(&mut self, input: &Path) -> Result<()> {
        self.require(PipelinePhase::Initialized)?;
        let outcome = self
            .source
            .load(input)
            .with_context(|| format!("load items from {}", input.display()))?;
        self.loaded = outcome.items;
        self.errors.validation = outcome.validation_errors;
        self.advance();
        Ok(())
    }

    /// Start enrichment over every loaded tag in load order.
    ///
    /// Results gathered so far are committed, and the phase advances to
    /// [`PipelinePhase::MediaEnriched`], when the returned iterator is
    /// dropped, whether exhausted or not.
    pub fn enrich_with_progress(&mut self, batch_size: usize) -> Result<EnrichmentProgress<'_>> {
        self.require(PipelinePhase::DataLoaded)?;
        let mut pending = VecDeque::new();
        for (tag, items) in &self.loaded {
            if self.handlers.get(*tag).is_none() {
                return Err(anyhow!("no handler registered for type tag {tag}"));
            }
            pending.push_back(BatchCursor::new(*tag, items.len(), batch_size)?);
        }
        tracing::info!(
            tags = pending.len(),
            batch_size,
            audio = self.cache.audio_enabled(),
            images = self.cache.images_enabled(),
            "media enrichment started"
        );
        Ok(EnrichmentProgress {
            controller: self,
            pending,
            current: None,
            started: Vec::new(),
        })
    }

    /// Run enrichment to completion, logging each snapshot.
    pub fn enrich(&mut self, batch_size: usize) -> Result<()> {
        for snapshot in self.enrich_with_progress(batch_size)? {
            tracing::info!(
                tag = %snapshot.type_tag,
                processed = snapshot.processed,
                total = snapshot.total,
                media_created = snapshot.media_created,
                "enrichment progress"
            );
        }
        Ok(())
    }

    fn commit_enrichment(&mut self, results: Vec<EnrichmentResult>) {
        for result in results {
            self.errors
                .enrichment
                .extend(result.enrichment_errors.iter().cloned());
            self.enriched.insert(result.type_tag, result);
        }
        let stats = self.cache.stats();
        tracing::info!(
            tags = self.enriched.len(),
            errors = self.errors.enrichment.len(),
            audio_generated = stats.audio_generated,
            audio_reused = stats.audio_reused,
            images_downloaded = stats.images_downloaded,
            images_reused = stats.images_reused,
            "media enrichment committed"
        );
        self.advance();
    }

    /// Assemble cards from the enriched items.
    ///
    /// Media is embedded through the registry and cards reference the names
    /// the package assigns. A media file that cannot be embedded leaves its
    /// field blank and is recorded as a build error; the card is still built.
    ///
    /// With `preview_only` the same names are resolved without embedding,
    /// and the result is returned without storing cards, recording errors or
    /// advancing the phase.
    pub fn build(&mut self, preview_only: bool) -> Result<BuildResult> {
        self.require(PipelinePhase::MediaEnriched)?;
        let mut result = BuildResult::default();
        let mut pending = HashMap::new();
        let tags: Vec<TypeTag> = self.enriched.keys().copied().collect();

        for tag in tags {
            let note_type = self.note_type_id(tag);
            let Some(enriched) = self.enriched.get(&tag) else {
                continue;
            };
            let note_type = match note_type {
                Ok(id) => id,
                Err(err) => {
                    tracing::warn!(tag = %tag, error = %format!("{err:#}"), "note type unavailable");
                    result
                        .errors
                        .extend(enriched.records.iter().map(|record| BuildError {
                            record_index: record.index,
                            record_type: tag,
                            message: format!("{err:#}"),
                        }));
                    continue;
                }
            };

            for (record, media) in enriched.records.iter().zip(&enriched.media_data) {
                let (names, media_failures) = if preview_only {
                    attach_media(media, |path| self.media.resolve_name(path, &mut pending))
                } else {
                    attach_media(media, |path| {
                        self.media.register(path).map(|reference| reference.name)
                    })
                };
                for message in media_failures {
                    tracing::warn!(
                        tag = %tag,
                        index = record.index,
                        message = message.as_str(),
                        "media left out of card"
                    );
                    result.errors.push(BuildError {
                        record_index: record.index,
                        record_type: tag,
                        message,
                    });
                }

                match self.assembler.fields(record, &names) {
                    Ok(fields) => result.cards.push(BuiltCard {
                        type_tag: tag,
                        record_index: record.index,
                        note_type,
                        guid: card_guid(record),
                        fields,
                        tags: vec![tag.as_str().to_string()],
                    }),
                    Err(err) => {
                        tracing::debug!(
                            tag = %tag,
                            index = record.index,
                            error = %format!("{err:#}"),
                            "card skipped"
                        );
                        result.errors.push(BuildError {
                            record_index: record.index,
                            record_type: tag,
                            message: format!("{err:#}"),
                        });
                    }
                }
            }
        }

        if preview_only {
            tracing::info!(
                cards = result.cards.len(),
                errors = result.errors.len(),
                "preview build complete"
            );
            return Ok(result);
        }

        self.built = result.cards.clone();
        self.errors.build = result.errors.clone();
        tracing::info!(
            cards = self.built.len(),
            errors = self.errors.build.len(),
            "cards built"
        );
        self.advance();
        Ok(result)
    }

    fn note_type_id(&mut self, tag: TypeTag) -> Result<NoteTypeId> {
        if let Some(id) = self.note_type_ids.get(&tag) {
            return Ok(*id);
        }
        let spec = self.assembler.note_type(tag);
        let id = self
            .media
            .writer_mut()
            .ensure_note_type(&spec)
            .with_context(|| format!("create note type {:?}", spec.name))?;
        tracing::debug!(tag = %tag, id, name = spec.name.as_str(), "note type ready");
        self.note_type_ids.insert(tag, id);
        Ok(id)
    }

    /// Write every built card to the package at `destination`.
    pub fn export(&mut self, destination: &Path) -> Result<PackageSummary> {
        self.require(PipelinePhase::CardsBuilt)?;
        let writer = self.media.writer_mut();
        for card in &self.built {
            writer
                .add_note(NoteRecord {
                    note_type: card.note_type,
                    guid: card.guid.clone(),
                    fields: card.fields.clone(),
                    tags: card.tags.clone(),
                })
                .with_context(|| format!("add note {}", card.guid))?;
        }
        let summary = writer
            .write_package(destination)
            .with_context(|| format!("write package {}", destination.display()))?;
        if !self.errors.is_empty() {
            tracing::warn!(
                errors = self.errors.total(),
                "deck exported with recorded errors"
            );
        }
        self.package = Some(summary.clone());
        self.advance();
        Ok(summary)
    }

    /// Loaded items by tag; empty before [`load`](Self::load).
    pub fn get_loaded_data(&self) -> &IndexMap<TypeTag, Vec<LoadedItem>> {
        &self.loaded
    }

    /// Enrichment results by tag; empty until enrichment is committed.
    pub fn get_enriched_data(&self) -> &IndexMap<TypeTag, EnrichmentResult> {
        &self.enriched
    }

    /// Cards from the last non-preview build.
    pub fn get_built_cards(&self) -> &[BuiltCard] {
        &self.built
    }

    pub fn get_errors(&self) -> &ErrorBuckets {
        &self.errors
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn media_stats(&self) -> DetailedMediaStats {
        self.media.get_detailed_stats(&self.cache.stats())
    }

    pub fn package(&self) -> Option<&PackageSummary> {
        self.package.as_ref()
    }

    pub fn summary(&self) -> PipelineSummary {
        PipelineSummary {
            phase: self.phase,
            items_loaded: self.loaded.values().map(Vec::len).sum(),
            items_by_tag: self
                .loaded
                .iter()
                .map(|(tag, items)| (tag.as_str().to_string(), items.len()))
                .collect(),
            items_enriched: self.enriched.values().map(|result| result.records.len()).sum(),
            media_files: self
                .enriched
                .values()
                .map(|result| result.media_files.len())
                .sum(),
            cards_built: self.built.len(),
            validation_errors: self.errors.validation.len(),
            enrichment_errors: self.errors.enrichment.len(),
            build_errors: self.errors.build.len(),
            media: self.media_stats(),
            package: self.package.clone(),
        }
    }
}

/// Map each media field to its package name; fields whose file cannot be
/// resolved are left out and reported.
fn attach_media(
    refs: &MediaRefs,
    mut resolve: impl FnMut(&Path) -> Result<String>,
) -> (MediaNames, Vec<String>) {
    let mut names = MediaNames::new();
    let mut failures = Vec::new();
    for (field, path) in refs {
        match resolve(path) {
            Ok(name) => {
                names.insert(field.clone(), name);
            }
            Err(err) => failures.push(format!("{field} media left blank: {err:#}")),
        }
    }
    (names, failures)
}

fn card_guid(record: &LoadedItem) -> String {
    let key = format!(
        "{}:{}:{}",
        record.type_tag,
        record.index,
        record.word().unwrap_or_default()
    );
    sha256_hex(key.as_bytes())[..16].to_string()
}

/// Enrichment progress over all loaded tags.
///
/// Dropping it commits what was processed and moves the pipeline to
/// [`PipelinePhase::MediaEnriched`]; tags never reached get no entry.
pub struct EnrichmentProgress<'a> {
    controller: &'a mut PipelineController,
    pending: VecDeque<BatchCursor>,
    current: Option<BatchCursor>,
    started: Vec<BatchCursor>,
}

impl Iterator for EnrichmentProgress<'_> {
    type Item = ProgressSnapshot;

    fn next(&mut self) -> Option<ProgressSnapshot> {
        loop {
            if self.current.is_none() {
                self.current = Some(self.pending.pop_front()?);
            }
            let cursor = self.current.as_mut()?;
            let tag = cursor.type_tag();
            let controller = &mut *self.controller;
            let handler = controller.handlers.get(tag)?;
            let items = controller
                .loaded
                .get(&tag)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let mut ctx = EnrichContext {
                handler,
                cache: &mut controller.cache,
                generator: controller.generator.as_deref(),
            };
            if let Some(snapshot) = cursor.advance(items, &mut ctx) {
                return Some(snapshot);
            }
            if let Some(done) = self.current.take() {
                self.started.push(done);
            }
        }
    }
}

impl std::iter::FusedIterator for EnrichmentProgress<'_> {}

impl Drop for EnrichmentProgress<'_> {
    fn drop(&mut self) {
        let mut cursors = std::mem::take(&mut self.started);
        cursors.extend(self.current.take());
        let results = cursors.into_iter().map(BatchCursor::into_result).collect();
        self.controller.commit_enrichment(results);
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
