//! Vocabulary records and the per-phase error records attached to them.
//!
//! Type tags form a closed set resolved once at load time; everything after
//! loading dispatches on the enum rather than on label strings.
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Vocabulary category selecting enrichment and card assembly behavior.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum TypeTag {
    Noun,
    Verb,
    Adjective,
    Phrase,
}

impl TypeTag {
    pub const ALL: [TypeTag; 4] = [
        TypeTag::Noun,
        TypeTag::Verb,
        TypeTag::Adjective,
        TypeTag::Phrase,
    ];

    /// Return the stable string identifier used in JSON artifacts.
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Noun => "noun",
            TypeTag::Verb => "verb",
            TypeTag::Adjective => "adjective",
            TypeTag::Phrase => "phrase",
        }
    }

    /// Resolve a label from a `type` column or file stem (`nouns`, `Verb`).
    pub fn from_label(label: &str) -> Option<TypeTag> {
        let label = label.trim().to_ascii_lowercase();
        let singular = label.strip_suffix('s').unwrap_or(&label);
        TypeTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == label || tag.as_str() == singular)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of generated media attached to a record.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Audio,
    Image,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MediaKind::Audio => "audio",
            MediaKind::Image => "image",
        })
    }
}

/// One vocabulary row as loaded from the item source.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoadedItem {
    /// Position within the record's type tag, in load order.
    pub index: usize,
    pub type_tag: TypeTag,
    pub source_file: String,
    pub source_line: usize,
    pub fields: BTreeMap<String, String>,
}

impl LoadedItem {
    /// Return a trimmed, non-empty field value.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    pub fn word(&self) -> Option<&str> {
        self.field("word")
    }

    /// English gloss, falling back to the word itself.
    pub fn gloss(&self) -> Option<&str> {
        self.field("english").or_else(|| self.word())
    }
}

/// Media field name (e.g. `word_audio`) → cached file backing it.
pub type MediaRefs = BTreeMap<String, PathBuf>;

/// Media field name → name the package stores the file under.
pub type MediaNames = BTreeMap<String, String>;

/// Row-level problem found while loading.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ValidationError {
    pub file: String,
    pub line: usize,
    pub message: String,
}

/// Media generation failure for one record and one media field.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EnrichmentError {
    pub record_index: usize,
    pub record_type: TypeTag,
    pub media_kind: MediaKind,
    pub field: String,
    pub message: String,
}

/// Card assembly failure for one record.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BuildError {
    pub record_index: usize,
    pub record_type: TypeTag,
    pub message: String,
}

/// Enriched records for one type tag.
///
/// `records`, `media_data` are parallel: `media_data[i]` belongs to
/// `records[i]`. A record whose media failed still appears with an empty or
/// partial reference map. `media_files` lists each file once, in first-use
/// order.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EnrichmentResult {
    pub type_tag: TypeTag,
    pub records: Vec<LoadedItem>,
    pub media_data: Vec<MediaRefs>,
    pub media_files: IndexSet<PathBuf>,
    pub enrichment_errors: Vec<EnrichmentError>,
}

impl EnrichmentResult {
    pub fn new(type_tag: TypeTag) -> Self {
        Self {
            type_tag,
            records: Vec::new(),
            media_data: Vec::new(),
            media_files: IndexSet::new(),
            enrichment_errors: Vec::new(),
        }
    }
}

/// Errors from every phase, kept in separate buckets.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct ErrorBuckets {
    pub validation: Vec<ValidationError>,
    pub enrichment: Vec<EnrichmentError>,
    pub build: Vec<BuildError>,
}

impl ErrorBuckets {
    pub fn total(&self) -> usize {
        self.validation.len() + self.enrichment.len() + self.build.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}
