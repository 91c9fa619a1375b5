//! Loading vocabulary rows from an input directory.
use crate::model::{LoadedItem, TypeTag, ValidationError};
use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Items grouped by type tag in first-seen order, plus row-level problems.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub items: IndexMap<TypeTag, Vec<LoadedItem>>,
    pub validation_errors: Vec<ValidationError>,
}

impl LoadOutcome {
    pub fn item_count(&self) -> usize {
        self.items.values().map(Vec::len).sum()
    }

    fn push(&mut self, tag: TypeTag, source_file: &str, source_line: usize, fields: BTreeMap<String, String>) {
        let bucket = self.items.entry(tag).or_default();
        bucket.push(LoadedItem {
            index: bucket.len(),
            type_tag: tag,
            source_file: source_file.to_string(),
            source_line,
            fields,
        });
    }
}

/// Source of vocabulary rows.
pub trait ItemSource {
    /// Load every item under `input`. Unreadable input is an error; bad rows
    /// are reported in [`LoadOutcome::validation_errors`].
    fn load(&self, input: &Path) -> Result<LoadOutcome>;
}

/// Reads every `*.csv` file in a directory, in file-name order.
///
/// The first row is the header. A `type` column selects the tag per row;
/// otherwise the file stem does (`nouns.csv`).
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvDirectorySource;

impl ItemSource for CsvDirectorySource {
    fn load(&self, input: &Path) -> Result<LoadOutcome> {
        if !input.is_dir() {
            return Err(anyhow!("input directory not found: {}", input.display()));
        }
        let mut files: Vec<PathBuf> = fs::read_dir(input)
            .with_context(|| format!("read input dir {}", input.display()))?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
            })
            .collect();
        files.sort();

        let mut outcome = LoadOutcome::default();
        for path in files {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("read {}", path.display()))?;
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default();
            let stem_tag = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(TypeTag::from_label);
            load_csv_text(&text, &file_name, stem_tag, &mut outcome);
        }
        tracing::info!(
            input = %input.display(),
            items = outcome.item_count(),
            tags = outcome.items.len(),
            validation_errors = outcome.validation_errors.len(),
            "items loaded"
        );
        Ok(outcome)
    }
}

fn load_csv_text(text: &str, file: &str, stem_tag: Option<TypeTag>, outcome: &mut LoadOutcome) {
    let mut rows = parse_csv(text).into_iter();
    let Some((header_line, header)) = rows.next() else {
        outcome.validation_errors.push(ValidationError {
            file: file.to_string(),
            line: 1,
            message: "missing header row".to_string(),
        });
        return;
    };
    let header: Vec<String> = header
        .iter()
        .map(|name| name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase())
        .collect();
    if !header.iter().any(|name| name == "word") {
        outcome.validation_errors.push(ValidationError {
            file: file.to_string(),
            line: header_line,
            message: "header has no 'word' column".to_string(),
        });
        return;
    }

    for (line, values) in rows {
        if values.iter().all(|value| value.trim().is_empty()) {
            continue;
        }
        let mut error = |message: String| {
            outcome.validation_errors.push(ValidationError {
                file: file.to_string(),
                line,
                message,
            });
        };
        if values.len() > header.len() {
            error(format!(
                "row has {} values but header has {} columns",
                values.len(),
                header.len()
            ));
            continue;
        }
        let fields: BTreeMap<String, String> = header
            .iter()
            .cloned()
            .zip(values.into_iter().chain(std::iter::repeat(String::new())))
            .collect();

        let tag = match fields.get("type").map(|label| label.trim()) {
            Some(label) if !label.is_empty() => TypeTag::from_label(label)
                .ok_or_else(|| format!("unknown type tag {label:?}")),
            _ => stem_tag.ok_or_else(|| {
                "no 'type' value and the file name does not name a type tag".to_string()
            }),
        };
        let tag = match tag {
            Ok(tag) => tag,
            Err(message) => {
                error(message);
                continue;
            }
        };
        if fields.get("word").is_none_or(|word| word.trim().is_empty()) {
            error("missing required field 'word'".to_string());
            continue;
        }
        outcome.push(tag, file, line, fields);
    }
}

/// Split CSV text into records tagged with their starting line number.
///
/// Quoted fields may contain commas, newlines and `""` escapes.
fn parse_csv(text: &str) -> Vec<(usize, Vec<String>)> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut record_line = 1;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(ch);
                }
                _ => field.push(ch),
            }
            continue;
        }
        match ch {
            '"' if field.is_empty() => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push((record_line, std::mem::take(&mut record)));
                line += 1;
                record_line = line;
            }
            _ => field.push(ch),
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push((record_line, record));
    }
    records
}
