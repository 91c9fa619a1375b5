use super::{NoteRecord, NoteTypeId, NoteTypeSpec, PackageSummary, PackageWriter};
use crate::util::{now_epoch_ms, sha256_hex};
use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Package writer producing one SQLite file per deck.
///
/// Content is held in memory until [`PackageWriter::write_package`], which
/// writes a temp file next to the destination and renames it into place.
pub struct SqlitePackageWriter {
    deck_name: String,
    note_types: Vec<(NoteTypeId, NoteTypeSpec)>,
    notes: Vec<NoteRecord>,
    media: BTreeMap<String, PathBuf>,
}

impl SqlitePackageWriter {
    pub fn new(deck_name: impl Into<String>) -> Self {
        Self {
            deck_name: deck_name.into(),
            note_types: Vec::new(),
            notes: Vec::new(),
            media: BTreeMap::new(),
        }
    }

    fn initialize_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
        conn.execute_batch(
            "CREATE TABLE deck (
                name TEXT NOT NULL,
                created_at_epoch_ms INTEGER NOT NULL
            );
            CREATE TABLE note_types (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                fields TEXT NOT NULL,
                front_template TEXT NOT NULL,
                back_template TEXT NOT NULL,
                css TEXT NOT NULL
            );
            CREATE TABLE notes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                guid TEXT NOT NULL UNIQUE,
                note_type_id INTEGER NOT NULL,
                fields TEXT NOT NULL,
                tags TEXT NOT NULL,
                FOREIGN KEY(note_type_id) REFERENCES note_types(id)
            );
            CREATE TABLE media (
                name TEXT PRIMARY KEY,
                sha256 TEXT NOT NULL,
                data BLOB NOT NULL
            );",
        )
    }

    fn write_contents(&self, conn: &mut Connection) -> Result<()> {
        Self::initialize_schema(conn).context("create package schema")?;
        let tx = conn.transaction().context("begin package transaction")?;
        tx.execute(
            "INSERT INTO deck (name, created_at_epoch_ms) VALUES (?1, ?2)",
            params![self.deck_name, now_epoch_ms() as i64],
        )?;
        for (id, spec) in &self.note_types {
            tx.execute(
                "INSERT INTO note_types (id, name, fields, front_template, back_template, css)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id,
                    spec.name,
                    serde_json::to_string(&spec.fields)?,
                    spec.front_template,
                    spec.back_template,
                    spec.css
                ],
            )?;
        }
        for note in &self.notes {
            tx.execute(
                "INSERT OR REPLACE INTO notes (guid, note_type_id, fields, tags)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    note.guid,
                    note.note_type,
                    serde_json::to_string(&note.fields)?,
                    note.tags.join(" ")
                ],
            )?;
        }
        for (name, path) in &self.media {
            let bytes = fs::read(path).with_context(|| format!("read media {}", path.display()))?;
            tx.execute(
                "INSERT INTO media (name, sha256, data) VALUES (?1, ?2, ?3)",
                params![name, sha256_hex(&bytes), bytes],
            )?;
        }
        tx.commit().context("commit package transaction")?;
        Ok(())
    }
}

impl PackageWriter for SqlitePackageWriter {
    fn ensure_note_type(&mut self, spec: &NoteTypeSpec) -> Result<NoteTypeId> {
        if let Some((id, _)) = self
            .note_types
            .iter()
            .find(|(_, existing)| existing.name == spec.name)
        {
            return Ok(*id);
        }
        let id = note_type_id(&spec.name);
        if self.note_types.iter().any(|(existing, _)| *existing == id) {
            return Err(anyhow!("note type id collision for {:?}", spec.name));
        }
        self.note_types.push((id, spec.clone()));
        Ok(id)
    }

    fn add_media(&mut self, path: &Path) -> Result<String> {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow!("media path has no UTF-8 file name: {}", path.display()))?
            .to_string();
        if !path.is_file() {
            return Err(anyhow!("media file not found: {}", path.display()));
        }
        self.media.insert(name.clone(), path.to_path_buf());
        Ok(name)
    }

    fn add_note(&mut self, note: NoteRecord) -> Result<()> {
        if !self
            .note_types
            .iter()
            .any(|(id, _)| *id == note.note_type)
        {
            return Err(anyhow!("unknown note type id {}", note.note_type));
        }
        self.notes.push(note);
        Ok(())
    }

    fn write_package(&mut self, destination: &Path) -> Result<PackageSummary> {
        let dir = destination
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        let tmp = tempfile::Builder::new()
            .prefix(".package-")
            .tempfile_in(dir)
            .with_context(|| format!("create temp package in {}", dir.display()))?;

        let mut conn = Connection::open(tmp.path())
            .with_context(|| format!("open {}", tmp.path().display()))?;
        self.write_contents(&mut conn)?;
        conn.close()
            .map_err(|(_, err)| err)
            .context("close package database")?;

        tmp.persist(destination)
            .with_context(|| format!("publish {}", destination.display()))?;
        tracing::info!(
            path = %destination.display(),
            notes = self.notes.len(),
            media = self.media.len(),
            "package written"
        );
        Ok(PackageSummary {
            path: destination.to_path_buf(),
            note_types: self.note_types.len(),
            notes: self.notes.len(),
            media_files: self.media.len(),
        })
    }
}

/// Deterministic positive id derived from the note type name.
fn note_type_id(name: &str) -> NoteTypeId {
    let hash = sha256_hex(name.as_bytes());
    // 13 hex chars stay well inside i64.
    i64::from_str_radix(&hash[..13], 16).unwrap_or(1) + 1
}
