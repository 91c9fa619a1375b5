use super::command::{expand_command, run_command};
use super::SpeechSynthesizer;
use crate::config::TtsConfig;
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::Path;

/// Speech synthesis through a user-configured command.
///
/// When the command has no `{output}` placeholder its stdout is taken as the
/// audio bytes.
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    command: String,
    voice: String,
}

impl CommandSynthesizer {
    pub fn new(command: impl Into<String>, voice: Option<&str>) -> Self {
        Self {
            command: command.into(),
            voice: voice.unwrap_or_default().to_string(),
        }
    }

    pub fn from_config(command: &str, config: Option<&TtsConfig>, language: &str) -> Self {
        let voice = config
            .and_then(|tts| tts.voice.as_deref())
            .unwrap_or(language);
        Self::new(command, Some(voice))
    }
}

impl SpeechSynthesizer for CommandSynthesizer {
    fn synthesize(&self, text: &str, destination: &Path) -> Result<()> {
        let output = destination
            .to_str()
            .ok_or_else(|| anyhow!("audio path is not valid UTF-8"))?;
        let args = expand_command(
            &self.command,
            &[("{text}", text), ("{output}", output), ("{voice}", &self.voice)],
        )?;
        let stdout = run_command(&args, None)?;
        if !self.command.contains("{output}") {
            fs::write(destination, &stdout)
                .with_context(|| format!("write {}", destination.display()))?;
        }
        let written = fs::metadata(destination)
            .map(|meta| meta.len())
            .unwrap_or(0);
        if written == 0 {
            return Err(anyhow!("speech command produced no audio for {text:?}"));
        }
        Ok(())
    }
}
