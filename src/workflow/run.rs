//! Preview and build steps.
use super::context::ProjectContext;
use crate::cli::{BuildArgs, PreviewArgs};
use crate::model::ErrorBuckets;
use crate::pipeline::{BuildResult, PipelineController, PipelineSummary};
use crate::report::{self, BuildReport, HistoryEntry, HISTORY_SCHEMA_VERSION, REPORT_SCHEMA_VERSION};
use crate::util::{display_path, now_epoch_ms};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct PreviewOutput<'a> {
    summary: &'a PipelineSummary,
    preview: &'a BuildResult,
    errors: &'a ErrorBuckets,
}

#[derive(Serialize)]
struct BuildOutput<'a> {
    package: String,
    summary: &'a PipelineSummary,
    errors: &'a ErrorBuckets,
}

/// Load, enrich and assemble cards without advancing past enrichment.
pub fn run_preview(args: &PreviewArgs) -> Result<()> {
    let ctx = ProjectContext::load(&args.project)?;
    let mut controller = ctx.controller()?;
    controller.load(&args.input)?;
    controller.enrich(ctx.batch_size(args.batch_size))?;
    let preview = controller.build(true)?;
    let summary = controller.summary();

    if args.json {
        let output = PreviewOutput {
            summary: &summary,
            preview: &preview,
            errors: controller.get_errors(),
        };
        let text = serde_json::to_string_pretty(&output).context("serialize preview")?;
        println!("{text}");
    } else {
        print_summary(ctx.paths.root(), &summary);
        println!(
            "preview: {} card(s), {} card error(s)",
            preview.cards.len(),
            preview.errors.len()
        );
        print_errors(controller.get_errors());
        for error in &preview.errors {
            println!(
                "  build: {} #{}: {}",
                error.record_type, error.record_index, error.message
            );
        }
    }
    Ok(())
}

/// Run the full pipeline, write the package, report and history entry.
pub fn run_build(args: &BuildArgs) -> Result<()> {
    let ctx = ProjectContext::load(&args.project)?;
    let started = now_epoch_ms();
    let destination = args
        .output
        .clone()
        .unwrap_or_else(|| ctx.paths.default_package_path(&ctx.config.deck_name));

    let controller = match build_pipeline(&ctx, args, &destination) {
        Ok(controller) => controller,
        Err(err) => {
            let entry = HistoryEntry {
                schema_version: HISTORY_SCHEMA_VERSION,
                started_at_epoch_ms: started,
                finished_at_epoch_ms: now_epoch_ms(),
                step: "build".to_string(),
                success: false,
                cards: 0,
                errors: 0,
                package: None,
                message: Some(format!("{err:#}")),
            };
            report::append_history(ctx.paths.root(), &entry)?;
            return Err(err);
        }
    };

    let summary = controller.summary();
    let errors = controller.get_errors();
    let finished = now_epoch_ms();
    report::write_report(
        ctx.paths.root(),
        &BuildReport {
            schema_version: REPORT_SCHEMA_VERSION,
            generated_at_epoch_ms: finished,
            deck_name: ctx.config.deck_name.clone(),
            input: args.input.display().to_string(),
            summary: summary.clone(),
            errors: errors.clone(),
        },
    )?;
    report::append_history(
        ctx.paths.root(),
        &HistoryEntry {
            schema_version: HISTORY_SCHEMA_VERSION,
            started_at_epoch_ms: started,
            finished_at_epoch_ms: finished,
            step: "build".to_string(),
            success: true,
            cards: summary.cards_built,
            errors: errors.total(),
            package: Some(display_path(&destination, Some(ctx.paths.root()))),
            message: None,
        },
    )?;

    if args.json {
        let output = BuildOutput {
            package: destination.display().to_string(),
            summary: &summary,
            errors,
        };
        let text = serde_json::to_string_pretty(&output).context("serialize build summary")?;
        println!("{text}");
    } else {
        print_summary(ctx.paths.root(), &summary);
        print_errors(errors);
        println!("wrote {}", destination.display());
        println!("report: {}", ctx.paths.report_path().display());
    }
    Ok(())
}

fn build_pipeline(
    ctx: &ProjectContext,
    args: &BuildArgs,
    destination: &Path,
) -> Result<PipelineController> {
    let mut controller = ctx.controller()?;
    controller.load(&args.input)?;
    controller.enrich(ctx.batch_size(args.batch_size))?;
    controller.build(false)?;
    controller.export(destination)?;
    Ok(controller)
}

fn print_summary(root: &Path, summary: &PipelineSummary) {
    println!("project: {}", root.display());
    println!("phase: {}", summary.phase);
    let by_tag: Vec<String> = summary
        .items_by_tag
        .iter()
        .map(|(tag, count)| format!("{tag}={count}"))
        .collect();
    println!(
        "items: {} loaded ({}), {} enriched",
        summary.items_loaded,
        by_tag.join(", "),
        summary.items_enriched
    );
    let media = &summary.media;
    println!(
        "media: {} generated, {} reused, {} failed; {} file(s) embedded, {} duplicate(s) skipped",
        media.total_media_generated,
        media.total_media_reused,
        media.audio_errors + media.image_errors,
        media.files_added,
        media.duplicates_skipped
    );
    println!("cards: {}", summary.cards_built);
    if let Some(package) = &summary.package {
        println!(
            "package: {} ({} notes, {} media)",
            display_path(&package.path, Some(root)),
            package.notes,
            package.media_files
        );
    }
}

fn print_errors(errors: &ErrorBuckets) {
    if errors.is_empty() {
        return;
    }
    println!(
        "errors: {} validation, {} enrichment, {} build",
        errors.validation.len(),
        errors.enrichment.len(),
        errors.build.len()
    );
    for error in &errors.validation {
        println!("  validation: {}:{}: {}", error.file, error.line, error.message);
    }
    for error in &errors.enrichment {
        println!(
            "  enrichment: {} #{} {}: {}",
            error.record_type, error.record_index, error.field, error.message
        );
    }
    for error in &errors.build {
        println!(
            "  build: {} #{}: {}",
            error.record_type, error.record_index, error.message
        );
    }
}

