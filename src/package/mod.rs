//! Destination deck package: note types, notes, and embedded media.
//!
//! The pipeline talks to the package through [`PackageWriter`]; the bundled
//! implementation stores everything in a single SQLite file.
mod assembler;
mod sqlite;

pub use assembler::{CardAssembler, TemplateCardAssembler};
pub use sqlite::SqlitePackageWriter;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Identifier assigned to a note type by the package backend.
pub type NoteTypeId = i64;

/// Field layout and templates for one note type.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct NoteTypeSpec {
    pub name: String,
    pub fields: Vec<String>,
    pub front_template: String,
    pub back_template: String,
    pub css: String,
}

/// One note ready to be stored in the package.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct NoteRecord {
    pub note_type: NoteTypeId,
    /// Stable identity so re-exports update rather than duplicate notes.
    pub guid: String,
    pub fields: Vec<String>,
    pub tags: Vec<String>,
}

/// Counts reported after the package is written.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PackageSummary {
    pub path: PathBuf,
    pub note_types: usize,
    pub notes: usize,
    pub media_files: usize,
}

/// Backend that accumulates deck content and serializes it once.
pub trait PackageWriter {
    /// Register a note type, returning the existing id when the name is known.
    fn ensure_note_type(&mut self, spec: &NoteTypeSpec) -> Result<NoteTypeId>;

    /// Embed a media file, returning the name cards use to reference it.
    fn add_media(&mut self, path: &Path) -> Result<String>;

    fn add_note(&mut self, note: NoteRecord) -> Result<()>;

    /// Serialize the whole deck to `destination`.
    fn write_package(&mut self, destination: &Path) -> Result<PackageSummary>;
}
