use crate::config::{self, DeckConfig};
use crate::media::MediaGenerationCache;
use crate::package::{SqlitePackageWriter, TemplateCardAssembler};
use crate::paths::{ensure_project_root, ProjectPaths};
use crate::pipeline::{PipelineBuilder, PipelineController};
use crate::services::{CommandQueryGenerator, CommandSynthesizer, HttpImageSearch};
use anyhow::{Context, Result};
use std::path::Path;

/// Validated project state shared by the pipeline commands.
pub(crate) struct ProjectContext {
    pub(crate) paths: ProjectPaths,
    pub(crate) config: DeckConfig,
}

impl ProjectContext {
    pub(crate) fn load(project: &Path) -> Result<Self> {
        let root = ensure_project_root(project, false)?;
        let paths = ProjectPaths::new(root);
        let config = config::load_config_or_default(paths.root())?;
        config::validate_config(&config)
            .with_context(|| format!("validate {}", paths.config_path().display()))?;
        Ok(Self { paths, config })
    }

    pub(crate) fn batch_size(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.config.batch_size)
    }

    /// Wire a controller from the config; unset services stay disabled.
    pub(crate) fn controller(&self) -> Result<PipelineController> {
        let config = &self.config;
        let mut cache =
            MediaGenerationCache::new(self.paths.audio_dir(), self.paths.images_dir());
        if let Some(command) = config::resolve_tts_command(config) {
            cache = cache.with_speech(Box::new(CommandSynthesizer::from_config(
                &command,
                config.tts.as_ref(),
                &config.language,
            )));
        }
        if let Some(images) = &config.images {
            cache = cache.with_images(Box::new(HttpImageSearch::from_config(images)?));
        }

        let mut builder = PipelineBuilder::new(
            cache,
            Box::new(SqlitePackageWriter::new(config.deck_name.as_str())),
        )
        .assembler(Box::new(TemplateCardAssembler::new(config.deck_name.as_str())));
        if let Some(command) = config::resolve_query_command(config) {
            builder = builder.query_generator(Box::new(CommandQueryGenerator::new(command)));
        }
        tracing::debug!(
            project = %self.paths.root().display(),
            deck = config.deck_name.as_str(),
            "pipeline wired"
        );
        Ok(builder.build())
    }
}
