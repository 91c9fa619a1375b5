//! Per-tag enrichment behavior: which texts get audio and how images are searched.
use crate::model::{LoadedItem, TypeTag};
use crate::services::QueryGenerator;
use anyhow::{anyhow, Result};
use std::collections::{BTreeMap, HashMap};

/// Image request for one item: cache key word plus search queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageQuery {
    pub word: String,
    pub primary: String,
    pub backup: String,
}

/// Enrichment strategy for one type tag.
pub trait ItemHandler {
    fn type_tag(&self) -> TypeTag;

    /// Media field name → text to synthesize. Blank texts are omitted.
    fn audio_segments(&self, item: &LoadedItem) -> BTreeMap<String, String>;

    /// Image request for `item`, or `None` when this tag carries no image.
    ///
    /// A failing or empty generator answer falls back to a query built from
    /// the item itself.
    fn image_query(
        &self,
        item: &LoadedItem,
        generator: Option<&dyn QueryGenerator>,
    ) -> Result<Option<ImageQuery>>;
}

pub struct NounHandler;
pub struct VerbHandler;
pub struct AdjectiveHandler;
pub struct PhraseHandler;

impl ItemHandler for NounHandler {
    fn type_tag(&self) -> TypeTag {
        TypeTag::Noun
    }

    fn audio_segments(&self, item: &LoadedItem) -> BTreeMap<String, String> {
        let spoken = match (item.field("article"), item.word()) {
            (Some(article), Some(word)) => Some(format!("{article} {word}")),
            (None, Some(word)) => Some(word.to_string()),
            _ => None,
        };
        segments(spoken, item.field("example"))
    }

    fn image_query(
        &self,
        item: &LoadedItem,
        generator: Option<&dyn QueryGenerator>,
    ) -> Result<Option<ImageQuery>> {
        image_query_with_hint(item, generator, "photo").map(Some)
    }
}

impl ItemHandler for VerbHandler {
    fn type_tag(&self) -> TypeTag {
        TypeTag::Verb
    }

    fn audio_segments(&self, item: &LoadedItem) -> BTreeMap<String, String> {
        segments(item.word().map(str::to_string), item.field("example"))
    }

    fn image_query(
        &self,
        item: &LoadedItem,
        generator: Option<&dyn QueryGenerator>,
    ) -> Result<Option<ImageQuery>> {
        image_query_with_hint(item, generator, "action").map(Some)
    }
}

impl ItemHandler for AdjectiveHandler {
    fn type_tag(&self) -> TypeTag {
        TypeTag::Adjective
    }

    fn audio_segments(&self, item: &LoadedItem) -> BTreeMap<String, String> {
        segments(item.word().map(str::to_string), item.field("example"))
    }

    fn image_query(
        &self,
        item: &LoadedItem,
        generator: Option<&dyn QueryGenerator>,
    ) -> Result<Option<ImageQuery>> {
        image_query_with_hint(item, generator, "illustration").map(Some)
    }
}

impl ItemHandler for PhraseHandler {
    fn type_tag(&self) -> TypeTag {
        TypeTag::Phrase
    }

    fn audio_segments(&self, item: &LoadedItem) -> BTreeMap<String, String> {
        segments(item.word().map(str::to_string), None)
    }

    fn image_query(
        &self,
        _item: &LoadedItem,
        _generator: Option<&dyn QueryGenerator>,
    ) -> Result<Option<ImageQuery>> {
        Ok(None)
    }
}

fn segments(word: Option<String>, example: Option<&str>) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    if let Some(word) = word {
        out.insert("word_audio".to_string(), word);
    }
    if let Some(example) = example {
        out.insert("example_audio".to_string(), example.to_string());
    }
    out
}

fn image_query_with_hint(
    item: &LoadedItem,
    generator: Option<&dyn QueryGenerator>,
    hint: &str,
) -> Result<ImageQuery> {
    let word = item
        .word()
        .ok_or_else(|| anyhow!("missing required field 'word'"))?;
    let backup = item.gloss().unwrap_or(word).to_string();
    let fallback = format!("{backup} {hint}");

    let primary = match generator {
        Some(generator) => match generator.generate_query(&query_context(item)) {
            Ok(query) if !query.trim().is_empty() => query.trim().to_string(),
            Ok(_) => {
                tracing::debug!(word, "query generator returned nothing; using fallback");
                fallback
            }
            Err(err) => {
                tracing::debug!(word, error = %format!("{err:#}"), "query generator failed; using fallback");
                fallback
            }
        },
        None => fallback,
    };

    Ok(ImageQuery {
        word: word.to_string(),
        primary,
        backup,
    })
}

fn query_context(item: &LoadedItem) -> String {
    let mut context = format!("type: {}\n", item.type_tag);
    for (name, value) in &item.fields {
        let value = value.trim();
        if name != "type" && !value.is_empty() {
            context.push_str(&format!("{name}: {value}\n"));
        }
    }
    context
}

/// Handlers keyed by type tag.
pub struct HandlerRegistry {
    handlers: HashMap<TypeTag, Box<dyn ItemHandler>>,
}

impl HandlerRegistry {
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registry with a handler for every built-in tag.
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(NounHandler));
        registry.register(Box::new(VerbHandler));
        registry.register(Box::new(AdjectiveHandler));
        registry.register(Box::new(PhraseHandler));
        registry
    }

    /// Register `handler` for its tag, replacing any earlier one.
    pub fn register(&mut self, handler: Box<dyn ItemHandler>) {
        self.handlers.insert(handler.type_tag(), handler);
    }

    pub fn get(&self, tag: TypeTag) -> Option<&dyn ItemHandler> {
        self.handlers.get(&tag).map(|handler| handler.as_ref())
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
