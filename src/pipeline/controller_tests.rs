use super::*;
use crate::handlers::NounHandler;
use crate::model::MediaKind;
use crate::package::{NoteRecord, NoteTypeSpec};
use crate::testing::{MemoryPackageState, MemoryPackageWriter, StubImages, StubSpeech};
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    input: PathBuf,
    state: Rc<RefCell<MemoryPackageState>>,
    controller: PipelineController,
}

fn fixture(files: &[(&str, &str)], speech: StubSpeech) -> Fixture {
    fixture_with(files, speech, |builder| builder)
}

fn fixture_with(
    files: &[(&str, &str)],
    speech: StubSpeech,
    configure: impl FnOnce(PipelineBuilder) -> PipelineBuilder,
) -> Fixture {
    let (writer, state) = MemoryPackageWriter::create();
    fixture_writing(files, speech, Box::new(writer), state, configure)
}

fn fixture_writing(
    files: &[(&str, &str)],
    speech: StubSpeech,
    writer: Box<dyn PackageWriter>,
    state: Rc<RefCell<MemoryPackageState>>,
    configure: impl FnOnce(PipelineBuilder) -> PipelineBuilder,
) -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("input");
    fs::create_dir_all(&input).expect("create input");
    for (name, text) in files {
        fs::write(input.join(name), text).expect("write csv");
    }
    let cache = MediaGenerationCache::new(dir.path().join("audio"), dir.path().join("images"))
        .with_speech(Box::new(speech))
        .with_images(Box::new(StubImages::default()));
    let controller = configure(
        PipelineBuilder::new(cache, writer)
            .assembler(Box::new(TemplateCardAssembler::new("German"))),
    )
    .build();
    Fixture {
        dir,
        input,
        state,
        controller,
    }
}

const THREE_NOUNS: (&str, &str) = (
    "nouns.csv",
    "word,article,english\nHund,der,dog\nKatze,die,cat\nMaus,die,mouse\n",
);

const TWO_VERBS: (&str, &str) = ("verbs.csv", "word,english\nlaufen,to run\ngehen,to go\n");

fn field<'a>(card: &'a BuiltCard, spec: &NoteTypeSpec, label: &str) -> &'a str {
    let pos = spec
        .fields
        .iter()
        .position(|name| name == label)
        .expect("field exists");
    &card.fields[pos]
}

fn violation(err: &anyhow::Error) -> PhaseViolation {
    *err.downcast_ref::<PhaseViolation>()
        .expect("phase violation")
}

#[test]
fn phases_advance_one_step_at_a_time() {
    let mut fx = fixture(&[THREE_NOUNS], StubSpeech::default());
    let c = &mut fx.controller;
    assert_eq!(c.phase(), PipelinePhase::Initialized);

    let err = c.enrich(5).expect_err("enrich before load");
    assert_eq!(
        violation(&err),
        PhaseViolation {
            required: PipelinePhase::DataLoaded,
            actual: PipelinePhase::Initialized,
        }
    );
    assert!(c.build(true).is_err());
    assert!(c.export(&fx.dir.path().join("deck.deck")).is_err());
    assert_eq!(c.phase(), PipelinePhase::Initialized);

    c.load(&fx.input).expect("load");
    assert_eq!(c.phase(), PipelinePhase::DataLoaded);
    let err = c.load(&fx.input).expect_err("second load");
    assert_eq!(violation(&err).actual, PipelinePhase::DataLoaded);

    c.enrich(2).expect("enrich");
    assert_eq!(c.phase(), PipelinePhase::MediaEnriched);
    assert!(c.enrich(2).is_err());

    c.build(false).expect("build");
    assert_eq!(c.phase(), PipelinePhase::CardsBuilt);
    assert!(c.build(false).is_err());

    let out = fx.dir.path().join("deck.deck");
    let summary = c.export(&out).expect("export");
    assert_eq!(c.phase(), PipelinePhase::DeckExported);
    assert_eq!(summary.notes, 3);
    assert!(out.is_file());
    assert!(c.export(&out).is_err());

    assert_eq!(c.get_loaded_data()[&TypeTag::Noun].len(), 3);
    assert_eq!(c.get_enriched_data()[&TypeTag::Noun].records.len(), 3);
    assert_eq!(c.get_built_cards().len(), 3);
    assert_eq!(c.package().map(|package| package.notes), Some(3));
}

#[test]
fn accessors_are_empty_before_their_phase() {
    let mut fx = fixture(&[THREE_NOUNS], StubSpeech::default());
    let c = &mut fx.controller;
    assert!(c.get_loaded_data().is_empty());
    assert!(c.get_enriched_data().is_empty());
    assert!(c.get_built_cards().is_empty());
    assert!(c.get_errors().is_empty());

    c.load(&fx.input).expect("load");
    assert!(c.get_enriched_data().is_empty());
    assert!(c.get_built_cards().is_empty());
    assert_eq!(c.summary().items_loaded, 3);
}

#[test]
fn three_noun_scenario_records_one_error_and_builds_every_card() {
    let mut fx = fixture(&[THREE_NOUNS], StubSpeech::failing_on(&["die Katze"]));
    let c = &mut fx.controller;
    c.load(&fx.input).expect("load");
    c.enrich(10).expect("enrich");

    let errors = c.get_errors();
    assert_eq!(errors.enrichment.len(), 1);
    assert_eq!(errors.enrichment[0].record_index, 1);
    assert_eq!(errors.enrichment[0].media_kind, MediaKind::Audio);
    assert_eq!(c.cache_stats().audio_errors, 1);
    assert_eq!(c.cache_stats().audio_generated, 2);
    assert_eq!(c.cache_stats().images_downloaded, 3);

    let result = c.build(false).expect("build");
    assert_eq!(result.cards.len(), 3);
    assert!(result.errors.is_empty());

    let spec = TemplateCardAssembler::new("German").note_type(TypeTag::Noun);
    let cards = c.get_built_cards();
    assert!(field(&cards[0], &spec, "WordAudio").starts_with("[sound:audio_"));
    assert_eq!(field(&cards[1], &spec, "WordAudio"), "");
    assert_eq!(field(&cards[1], &spec, "Image"), "<img src=\"katze.jpg\">");
    assert_eq!(field(&cards[1], &spec, "Word"), "Katze");

    assert_eq!(fx.state.borrow().media.len(), 5);
    assert_eq!(c.media_stats().files_added, 5);
    assert_eq!(c.summary().enrichment_errors, 1);
}

#[test]
fn preview_returns_cards_without_side_effects() {
    let mut fx = fixture(&[THREE_NOUNS], StubSpeech::default());
    let c = &mut fx.controller;
    c.load(&fx.input).expect("load");
    c.enrich(10).expect("enrich");

    let preview = c.build(true).expect("preview");
    assert_eq!(preview.cards.len(), 3);
    assert_eq!(c.phase(), PipelinePhase::MediaEnriched);
    assert!(c.get_built_cards().is_empty());
    assert!(fx.state.borrow().media.is_empty());
    assert_eq!(c.media_stats().files_added, 0);

    let again = c.build(true).expect("second preview");
    assert_eq!(again, preview);

    let built = c.build(false).expect("build");
    assert_eq!(built.cards, preview.cards);
    assert_eq!(c.phase(), PipelinePhase::CardsBuilt);
}

#[test]
fn abandoned_progress_commits_only_started_tags() {
    let mut fx = fixture(&[THREE_NOUNS, TWO_VERBS], StubSpeech::default());
    let c = &mut fx.controller;
    c.load(&fx.input).expect("load");

    {
        let mut progress = c.enrich_with_progress(2).expect("progress");
        let first = progress.next().expect("first batch");
        assert_eq!(first.type_tag, TypeTag::Noun);
        assert_eq!((first.processed, first.total), (2, 3));
    }

    assert_eq!(c.phase(), PipelinePhase::MediaEnriched);
    let enriched = c.get_enriched_data();
    assert_eq!(enriched[&TypeTag::Noun].records.len(), 2);
    assert!(!enriched.contains_key(&TypeTag::Verb));

    let result = c.build(false).expect("build");
    assert_eq!(result.cards.len(), 2);
}

#[test]
fn progress_covers_tags_in_load_order_and_saturates() {
    let mut fx = fixture(&[THREE_NOUNS, TWO_VERBS], StubSpeech::default());
    let c = &mut fx.controller;
    c.load(&fx.input).expect("load");

    let snapshots: Vec<ProgressSnapshot> = c.enrich_with_progress(2).expect("progress").collect();
    let seen: Vec<(TypeTag, usize, usize)> = snapshots
        .iter()
        .map(|snapshot| (snapshot.type_tag, snapshot.processed, snapshot.total))
        .collect();
    assert_eq!(
        seen,
        vec![
            (TypeTag::Noun, 2, 3),
            (TypeTag::Noun, 3, 3),
            (TypeTag::Verb, 2, 2),
        ]
    );
    let tags: Vec<TypeTag> = c.get_enriched_data().keys().copied().collect();
    assert_eq!(tags, vec![TypeTag::Noun, TypeTag::Verb]);
}

#[test]
fn zero_batch_size_is_rejected_without_leaving_data_loaded() {
    let mut fx = fixture(&[THREE_NOUNS], StubSpeech::default());
    let c = &mut fx.controller;
    c.load(&fx.input).expect("load");
    assert!(c.enrich(0).is_err());
    assert_eq!(c.phase(), PipelinePhase::DataLoaded);
    c.enrich(1).expect("enrich");
}

#[test]
fn missing_handler_is_fatal() {
    let mut fx = fixture_with(&[THREE_NOUNS, TWO_VERBS], StubSpeech::default(), |builder| {
        let mut handlers = HandlerRegistry::empty();
        handlers.register(Box::new(NounHandler));
        builder.handlers(handlers)
    });
    let c = &mut fx.controller;
    c.load(&fx.input).expect("load");
    let err = c.enrich(5).expect_err("verb handler missing");
    assert!(err.to_string().contains("verb"));
    assert_eq!(c.phase(), PipelinePhase::DataLoaded);
}

struct RejectingAssembler {
    inner: TemplateCardAssembler,
    reject: &'static str,
}

impl CardAssembler for RejectingAssembler {
    fn note_type(&self, tag: TypeTag) -> NoteTypeSpec {
        self.inner.note_type(tag)
    }

    fn fields(&self, item: &LoadedItem, media: &MediaNames) -> Result<Vec<String>> {
        if item.word() == Some(self.reject) {
            return Err(anyhow!("template rejected {}", self.reject));
        }
        self.inner.fields(item, media)
    }
}

#[test]
fn build_errors_skip_the_card_and_continue() {
    let mut fx = fixture_with(&[THREE_NOUNS, TWO_VERBS], StubSpeech::default(), |builder| {
        builder.assembler(Box::new(RejectingAssembler {
            inner: TemplateCardAssembler::new("German"),
            reject: "Katze",
        }))
    });
    let c = &mut fx.controller;
    c.load(&fx.input).expect("load");
    c.enrich(10).expect("enrich");

    let preview = c.build(true).expect("preview");
    assert_eq!(preview.errors.len(), 1);
    assert!(c.get_errors().build.is_empty());

    let result = c.build(false).expect("build");
    assert_eq!(result.cards.len(), 4);
    let errors = &c.get_errors().build;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].record_index, 1);
    assert_eq!(errors[0].record_type, TypeTag::Noun);
    assert!(errors[0].message.contains("Katze"));

    let out = fx.dir.path().join("deck.deck");
    c.export(&out).expect("export with errors");
    let state = fx.state.borrow();
    assert_eq!(state.notes.len(), 4);
    assert_eq!(state.written.as_deref(), Some(out.as_path()));
}

#[test]
fn note_types_are_requested_once_per_tag() {
    let mut fx = fixture(&[THREE_NOUNS, TWO_VERBS], StubSpeech::default());
    let c = &mut fx.controller;
    c.load(&fx.input).expect("load");
    c.enrich(10).expect("enrich");
    c.build(true).expect("preview");
    c.build(false).expect("build");

    let state = fx.state.borrow();
    assert_eq!(state.note_type_requests, 2);
    assert_eq!(state.note_types.len(), 2);
    let noun_type = c
        .get_built_cards()
        .iter()
        .find(|card| card.type_tag == TypeTag::Noun)
        .map(|card| card.note_type);
    let verb_type = c
        .get_built_cards()
        .iter()
        .find(|card| card.type_tag == TypeTag::Verb)
        .map(|card| card.note_type);
    assert_ne!(noun_type, verb_type);
}

#[test]
fn validation_errors_are_kept_beside_loaded_items() {
    let mut fx = fixture(
        &[("nouns.csv", "word,english\nHund,dog\n,missing\n")],
        StubSpeech::default(),
    );
    let c = &mut fx.controller;
    c.load(&fx.input).expect("load");
    assert_eq!(c.get_loaded_data()[&TypeTag::Noun].len(), 1);
    assert_eq!(c.get_errors().validation.len(), 1);
    assert_eq!(c.get_errors().validation[0].line, 3);
}

/// Writer that renames embedded media and can refuse one note type.
struct RenamingWriter {
    inner: MemoryPackageWriter,
    state: Rc<RefCell<MemoryPackageState>>,
    refuse_note_type: Option<&'static str>,
}

impl RenamingWriter {
    fn create(refuse_note_type: Option<&'static str>) -> (Self, Rc<RefCell<MemoryPackageState>>) {
        let (inner, state) = MemoryPackageWriter::create();
        let writer = Self {
            inner,
            state: Rc::clone(&state),
            refuse_note_type,
        };
        (writer, state)
    }
}

impl PackageWriter for RenamingWriter {
    fn ensure_note_type(&mut self, spec: &NoteTypeSpec) -> Result<NoteTypeId> {
        if self.refuse_note_type == Some(spec.name.as_str()) {
            return Err(anyhow!("note type {} rejected by backend", spec.name));
        }
        self.inner.ensure_note_type(spec)
    }

    fn add_media(&mut self, path: &Path) -> Result<String> {
        let name = self.inner.add_media(path)?;
        Ok(format!("m{}_{name}", self.state.borrow().media.len()))
    }

    fn add_note(&mut self, note: NoteRecord) -> Result<()> {
        self.inner.add_note(note)
    }

    fn write_package(&mut self, destination: &Path) -> Result<PackageSummary> {
        self.inner.write_package(destination)
    }
}

#[test]
fn cards_reference_the_names_the_package_assigns() {
    let (writer, state) = RenamingWriter::create(None);
    let mut fx = fixture_writing(
        &[THREE_NOUNS],
        StubSpeech::default(),
        Box::new(writer),
        state,
        |builder| builder,
    );
    let c = &mut fx.controller;
    c.load(&fx.input).expect("load");
    c.enrich(10).expect("enrich");
    c.build(false).expect("build");

    let spec = TemplateCardAssembler::new("German").note_type(TypeTag::Noun);
    let card = &c.get_built_cards()[0];
    assert_eq!(field(card, &spec, "Image"), "<img src=\"m1_hund.jpg\">");
    assert!(field(card, &spec, "WordAudio").starts_with("[sound:m2_audio_"));
    assert_eq!(fx.state.borrow().media.len(), 6);
}

#[test]
fn unreadable_media_blanks_the_field_and_keeps_the_card() {
    let mut fx = fixture(&[THREE_NOUNS], StubSpeech::default());
    let c = &mut fx.controller;
    c.load(&fx.input).expect("load");
    c.enrich(10).expect("enrich");
    let audio = c.get_enriched_data()[&TypeTag::Noun].media_data[1]["word_audio"].clone();
    fs::remove_file(&audio).expect("remove cached audio");

    let preview = c.build(true).expect("preview");
    assert_eq!(preview.cards.len(), 3);
    assert_eq!(preview.errors.len(), 1);

    let result = c.build(false).expect("build");
    assert_eq!(result.cards, preview.cards);
    let errors = &c.get_errors().build;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].record_index, 1);
    assert!(errors[0].message.contains("word_audio"));

    let spec = TemplateCardAssembler::new("German").note_type(TypeTag::Noun);
    let cards = c.get_built_cards();
    assert_eq!(cards.len(), 3);
    assert_eq!(field(&cards[1], &spec, "WordAudio"), "");
    assert_eq!(field(&cards[1], &spec, "Image"), "<img src=\"katze.jpg\">");
    assert_eq!(fx.state.borrow().media.len(), 5);
}

#[test]
fn preview_resolves_repeated_content_like_the_build() {
    let mut fx = fixture(
        &[("nouns.csv", "word,article,english\nHund,der,dog\nKöter,der,dog\n")],
        StubSpeech::default(),
    );
    let c = &mut fx.controller;
    c.load(&fx.input).expect("load");
    c.enrich(10).expect("enrich");

    let preview = c.build(true).expect("preview");
    let built = c.build(false).expect("build");
    assert_eq!(built.cards, preview.cards);

    let spec = TemplateCardAssembler::new("German").note_type(TypeTag::Noun);
    assert_eq!(field(&built.cards[1], &spec, "Image"), "<img src=\"hund.jpg\">");
    assert_eq!(c.media_stats().duplicates_skipped, 1);
    assert_eq!(fx.state.borrow().media.len(), 3);
}

#[test]
fn note_type_failure_skips_only_that_tag() {
    let (writer, state) = RenamingWriter::create(Some("German Verb"));
    let mut fx = fixture_writing(
        &[THREE_NOUNS, TWO_VERBS],
        StubSpeech::default(),
        Box::new(writer),
        state,
        |builder| builder,
    );
    let c = &mut fx.controller;
    c.load(&fx.input).expect("load");
    c.enrich(10).expect("enrich");

    let result = c.build(false).expect("build");
    assert_eq!(result.cards.len(), 3);
    assert!(result.cards.iter().all(|card| card.type_tag == TypeTag::Noun));
    let errors = &c.get_errors().build;
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|error| error.record_type == TypeTag::Verb));
    assert!(errors[0].message.contains("German Verb"));
    assert_eq!(c.phase(), PipelinePhase::CardsBuilt);
}
