//! In-memory collaborators shared by unit tests.
use crate::package::{NoteRecord, NoteTypeId, NoteTypeSpec, PackageSummary, PackageWriter};
use crate::services::{ImageSearch, QueryGenerator, SpeechSynthesizer};
use anyhow::{anyhow, Result};
use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(Debug, Default)]
pub struct MemoryPackageState {
    pub note_types: Vec<(NoteTypeId, NoteTypeSpec)>,
    pub note_type_requests: usize,
    pub notes: Vec<NoteRecord>,
    pub media: Vec<PathBuf>,
    pub written: Option<PathBuf>,
}

/// Package writer that records calls instead of serializing anything real.
pub struct MemoryPackageWriter {
    state: Rc<RefCell<MemoryPackageState>>,
}

impl MemoryPackageWriter {
    pub fn create() -> (Self, Rc<RefCell<MemoryPackageState>>) {
        let state = Rc::new(RefCell::new(MemoryPackageState::default()));
        (
            Self {
                state: Rc::clone(&state),
            },
            state,
        )
    }
}

impl PackageWriter for MemoryPackageWriter {
    fn ensure_note_type(&mut self, spec: &NoteTypeSpec) -> Result<NoteTypeId> {
        let mut state = self.state.borrow_mut();
        state.note_type_requests += 1;
        if let Some((id, _)) = state.note_types.iter().find(|(_, s)| s.name == spec.name) {
            return Ok(*id);
        }
        let id = state.note_types.len() as NoteTypeId + 1;
        state.note_types.push((id, spec.clone()));
        Ok(id)
    }

    fn add_media(&mut self, path: &Path) -> Result<String> {
        self.state.borrow_mut().media.push(path.to_path_buf());
        Ok(path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default())
    }

    fn add_note(&mut self, note: NoteRecord) -> Result<()> {
        self.state.borrow_mut().notes.push(note);
        Ok(())
    }

    fn write_package(&mut self, destination: &Path) -> Result<PackageSummary> {
        let mut state = self.state.borrow_mut();
        fs::write(destination, format!("notes={}\n", state.notes.len()))?;
        state.written = Some(destination.to_path_buf());
        Ok(PackageSummary {
            path: destination.to_path_buf(),
            note_types: state.note_types.len(),
            notes: state.notes.len(),
            media_files: state.media.len(),
        })
    }
}

/// Speech stub writing `audio:<text>`; texts in `fail_on` error out and
/// texts in `silent_on` produce an empty file.
#[derive(Default)]
pub struct StubSpeech {
    pub calls: Rc<RefCell<Vec<String>>>,
    pub fail_on: HashSet<String>,
    pub silent_on: HashSet<String>,
}

impl StubSpeech {
    pub fn failing_on(texts: &[&str]) -> Self {
        Self {
            fail_on: texts.iter().map(|text| text.to_string()).collect(),
            ..Self::default()
        }
    }
}

impl SpeechSynthesizer for StubSpeech {
    fn synthesize(&self, text: &str, destination: &Path) -> Result<()> {
        self.calls.borrow_mut().push(text.to_string());
        if self.fail_on.contains(text) {
            return Err(anyhow!("stub synthesis failure for {text}"));
        }
        if self.silent_on.contains(text) {
            return Ok(());
        }
        fs::write(destination, format!("audio:{text}"))?;
        Ok(())
    }
}

/// Image stub writing `image:<query>`; queries in `missing` find nothing and
/// queries in `fail_on` error out.
#[derive(Default)]
pub struct StubImages {
    pub calls: Rc<RefCell<Vec<String>>>,
    pub missing: HashSet<String>,
    pub fail_on: HashSet<String>,
}

impl ImageSearch for StubImages {
    fn download(&self, query: &str, destination: &Path) -> Result<bool> {
        self.calls.borrow_mut().push(query.to_string());
        if self.fail_on.contains(query) {
            return Err(anyhow!("stub search failure for {query}"));
        }
        if self.missing.contains(query) {
            return Ok(false);
        }
        fs::write(destination, format!("image:{query}"))?;
        Ok(true)
    }
}

/// Query generator stub returning a fixed answer or failing.
pub struct StubQueryGenerator {
    pub answer: Option<String>,
    pub prompts: Rc<RefCell<Vec<String>>>,
}

impl StubQueryGenerator {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: Some(answer.to_string()),
            prompts: Rc::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            answer: None,
            prompts: Rc::default(),
        }
    }
}

impl QueryGenerator for StubQueryGenerator {
    fn generate_query(&self, context: &str) -> Result<String> {
        self.prompts.borrow_mut().push(context.to_string());
        self.answer
            .clone()
            .ok_or_else(|| anyhow!("stub query generator offline"))
    }
}
