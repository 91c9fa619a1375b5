use super::NoteTypeSpec;
use crate::model::{LoadedItem, MediaKind, MediaNames, TypeTag};
use anyhow::{anyhow, Result};

/// Converts enriched records into note field values.
pub trait CardAssembler {
    /// Note type used for every record of `tag`.
    fn note_type(&self, tag: TypeTag) -> NoteTypeSpec;

    /// Field values for one record, in the order of `note_type(tag).fields`.
    ///
    /// `media` maps media fields to the names the package stores them under;
    /// a field absent from it renders blank.
    fn fields(&self, item: &LoadedItem, media: &MediaNames) -> Result<Vec<String>>;
}

#[derive(Debug, Clone, Copy)]
enum FieldSource {
    Column(&'static str),
    Media(&'static str, MediaKind),
}

struct FieldDef {
    label: &'static str,
    source: FieldSource,
}

const fn column(label: &'static str, name: &'static str) -> FieldDef {
    FieldDef {
        label,
        source: FieldSource::Column(name),
    }
}

const fn media(label: &'static str, name: &'static str, kind: MediaKind) -> FieldDef {
    FieldDef {
        label,
        source: FieldSource::Media(name, kind),
    }
}

const NOUN_FIELDS: &[FieldDef] = &[
    column("Word", "word"),
    column("Article", "article"),
    column("Plural", "plural"),
    column("English", "english"),
    column("Example", "example"),
    media("Image", "image", MediaKind::Image),
    media("WordAudio", "word_audio", MediaKind::Audio),
    media("ExampleAudio", "example_audio", MediaKind::Audio),
];

const VERB_FIELDS: &[FieldDef] = &[
    column("Word", "word"),
    column("English", "english"),
    column("Present", "present"),
    column("Past", "past"),
    column("Perfect", "perfect"),
    column("Example", "example"),
    media("Image", "image", MediaKind::Image),
    media("WordAudio", "word_audio", MediaKind::Audio),
    media("ExampleAudio", "example_audio", MediaKind::Audio),
];

const ADJECTIVE_FIELDS: &[FieldDef] = &[
    column("Word", "word"),
    column("English", "english"),
    column("Comparative", "comparative"),
    column("Superlative", "superlative"),
    column("Example", "example"),
    media("Image", "image", MediaKind::Image),
    media("WordAudio", "word_audio", MediaKind::Audio),
    media("ExampleAudio", "example_audio", MediaKind::Audio),
];

const PHRASE_FIELDS: &[FieldDef] = &[
    column("Phrase", "word"),
    column("English", "english"),
    column("Notes", "notes"),
    media("WordAudio", "word_audio", MediaKind::Audio),
];

const CARD_CSS: &str = ".card { font-family: sans-serif; font-size: 22px; text-align: center; }\n\
.english { color: #555; }\n\
img { max-width: 320px; }\n";

fn field_defs(tag: TypeTag) -> &'static [FieldDef] {
    match tag {
        TypeTag::Noun => NOUN_FIELDS,
        TypeTag::Verb => VERB_FIELDS,
        TypeTag::Adjective => ADJECTIVE_FIELDS,
        TypeTag::Phrase => PHRASE_FIELDS,
    }
}

/// Built-in per-tag note types with fixed field layouts.
#[derive(Debug, Clone)]
pub struct TemplateCardAssembler {
    deck_name: String,
}

impl TemplateCardAssembler {
    pub fn new(deck_name: impl Into<String>) -> Self {
        Self {
            deck_name: deck_name.into(),
        }
    }
}

impl CardAssembler for TemplateCardAssembler {
    fn note_type(&self, tag: TypeTag) -> NoteTypeSpec {
        let defs = field_defs(tag);
        let fields = defs.iter().map(|def| def.label.to_string()).collect();
        let first = defs[0].label;
        let has_image = defs
            .iter()
            .any(|def| matches!(def.source, FieldSource::Media(_, MediaKind::Image)));
        let mut back =
            String::from("{{FrontSide}}<hr id=answer>\n<div class=english>{{English}}</div>\n");
        for def in defs.iter().skip(1) {
            if def.label == "English" {
                continue;
            }
            back.push_str(&format!("{{{{{}}}}}\n", def.label));
        }
        NoteTypeSpec {
            name: format!("{} {}", self.deck_name, capitalize(tag.as_str())),
            fields,
            front_template: if has_image {
                format!("{{{{{first}}}}}\n{{{{Image}}}}")
            } else {
                format!("{{{{{first}}}}}")
            },
            back_template: back,
            css: CARD_CSS.to_string(),
        }
    }

    fn fields(&self, item: &LoadedItem, media: &MediaNames) -> Result<Vec<String>> {
        if item.word().is_none() {
            return Err(anyhow!("missing required field 'word'"));
        }
        Ok(field_defs(item.type_tag)
            .iter()
            .map(|def| match def.source {
                FieldSource::Column(name) => escape_html(item.field(name).unwrap_or_default()),
                FieldSource::Media(name, kind) => match (media.get(name), kind) {
                    (Some(file), MediaKind::Audio) => format!("[sound:{file}]"),
                    (Some(file), MediaKind::Image) => format!("<img src=\"{}\">", escape_html(file)),
                    (None, _) => String::new(),
                },
            })
            .collect())
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
