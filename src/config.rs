//! Deck configuration helpers.
//!
//! This module loads, validates, and normalizes the project-owned config so
//! the pipeline can be wired from one JSON file plus a few env overrides.
use crate::paths::ProjectPaths;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Current schema version for `deck/config.json`.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

const DEFAULT_BATCH_SIZE: usize = 10;
const DEFAULT_RESULT_POINTER: &str = "/photos/0/src/medium";
const DEFAULT_API_KEY_HEADER: &str = "Authorization";
const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Env var consulted when the config has no TTS command.
pub const TTS_COMMAND_ENV: &str = "VDECK_TTS_COMMAND";
/// Env var consulted when the config has no query generator command.
pub const QUERY_COMMAND_ENV: &str = "VDECK_QUERY_COMMAND";

/// Project-owned pipeline configuration stored in `deck/config.json`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DeckConfig {
    pub schema_version: u32,
    pub deck_name: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tts: Option<TtsConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<ImageSearchConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_generator: Option<QueryGeneratorConfig>,
}

/// Text-to-speech command settings.
///
/// The command is split with shell-words and may reference `{text}`,
/// `{output}` and `{voice}` placeholders.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TtsConfig {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
}

/// HTTP image search settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ImageSearchConfig {
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,
    /// JSON pointer to the first image URL in the search response.
    #[serde(default = "default_result_pointer")]
    pub result_pointer: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Optional search-query generator command (prompt on stdin, query on stdout).
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct QueryGeneratorConfig {
    pub command: String,
}

fn default_language() -> String {
    "de".to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_api_key_header() -> String {
    DEFAULT_API_KEY_HEADER.to_string()
}

fn default_result_pointer() -> String {
    DEFAULT_RESULT_POINTER.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Build the default config used when a project is first initialized.
///
/// Defaults leave every external service unset so a fresh project never
/// reaches the network until the user opts in.
pub fn default_config() -> DeckConfig {
    DeckConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        deck_name: "Vocabulary".to_string(),
        language: default_language(),
        batch_size: DEFAULT_BATCH_SIZE,
        tts: None,
        images: None,
        query_generator: None,
    }
}

/// Load the project config from `deck/config.json`.
pub fn load_config(project_root: &Path) -> Result<DeckConfig> {
    let paths = ProjectPaths::new(project_root.to_path_buf());
    let path = paths.config_path();
    let bytes = fs::read(&path).with_context(|| format!("read config {}", path.display()))?;
    let config: DeckConfig = serde_json::from_slice(&bytes).context("parse deck config JSON")?;
    Ok(config)
}

/// Load the config when present, otherwise fall back to defaults.
pub fn load_config_or_default(project_root: &Path) -> Result<DeckConfig> {
    let paths = ProjectPaths::new(project_root.to_path_buf());
    if paths.config_path().is_file() {
        load_config(project_root)
    } else {
        Ok(default_config())
    }
}

/// Persist a config to disk in a stable JSON format.
pub fn write_config(project_root: &Path, config: &DeckConfig) -> Result<()> {
    let paths = ProjectPaths::new(project_root.to_path_buf());
    let path = paths.config_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("create deck dir")?;
    }
    let text = serde_json::to_string_pretty(config).context("serialize deck config")?;
    fs::write(&path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Validate config schema and user-provided settings.
pub fn validate_config(config: &DeckConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported deck config schema_version {}",
            config.schema_version
        ));
    }
    if config.deck_name.trim().is_empty() {
        return Err(anyhow!("deck_name must be non-empty"));
    }
    if config.batch_size == 0 {
        return Err(anyhow!("batch_size must be at least 1"));
    }
    if let Some(tts) = &config.tts {
        if tts.command.trim().is_empty() {
            return Err(anyhow!("tts.command must be non-empty"));
        }
    }
    if let Some(images) = &config.images {
        if !images.endpoint.starts_with("http://") && !images.endpoint.starts_with("https://") {
            return Err(anyhow!(
                "images.endpoint must be an http(s) URL (got {:?})",
                images.endpoint
            ));
        }
        if !images.result_pointer.starts_with('/') {
            return Err(anyhow!(
                "images.result_pointer must be a JSON pointer starting with '/' (got {:?})",
                images.result_pointer
            ));
        }
    }
    if let Some(generator) = &config.query_generator {
        if generator.command.trim().is_empty() {
            return Err(anyhow!("query_generator.command must be non-empty"));
        }
    }
    Ok(())
}

/// Resolve the TTS command: config first, then `VDECK_TTS_COMMAND`.
pub fn resolve_tts_command(config: &DeckConfig) -> Option<String> {
    resolve_command(
        config.tts.as_ref().map(|tts| tts.command.as_str()),
        std::env::var(TTS_COMMAND_ENV).ok(),
    )
}

/// Resolve the query generator command: config first, then `VDECK_QUERY_COMMAND`.
pub fn resolve_query_command(config: &DeckConfig) -> Option<String> {
    resolve_command(
        config
            .query_generator
            .as_ref()
            .map(|generator| generator.command.as_str()),
        std::env::var(QUERY_COMMAND_ENV).ok(),
    )
}

fn resolve_command(configured: Option<&str>, from_env: Option<String>) -> Option<String> {
    configured
        .map(|s| s.to_string())
        .or(from_env)
        .filter(|command| !command.trim().is_empty())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
