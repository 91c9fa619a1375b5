use super::command::{expand_command, run_command};
use super::QueryGenerator;
use crate::util::truncate_string;
use anyhow::{anyhow, Context, Result};

const MAX_QUERY_BYTES: usize = 120;

const PROMPT_HEADER: &str = "Write one short English image search query (2-5 words) that \
would find a clear, literal photo illustrating this vocabulary item. Reply with the query \
only, no quotes or explanation.\n\n";

/// Image query generation through a local LM-style command.
///
/// The prompt goes to stdin; the first non-empty stdout line is the query.
#[derive(Debug, Clone)]
pub struct CommandQueryGenerator {
    command: String,
}

impl CommandQueryGenerator {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl QueryGenerator for CommandQueryGenerator {
    fn generate_query(&self, context: &str) -> Result<String> {
        let args = expand_command(&self.command, &[])?;
        let prompt = format!("{PROMPT_HEADER}{context}\n");
        let stdout = run_command(&args, Some(&prompt))?;
        let text = String::from_utf8(stdout).context("decode query generator stdout as UTF-8")?;
        parse_query(&text)
    }
}

fn parse_query(text: &str) -> Result<String> {
    let line = text
        .lines()
        .map(|line| line.trim().trim_matches(|ch| ch == '"' || ch == '\'' || ch == '`'))
        .find(|line| !line.is_empty())
        .ok_or_else(|| anyhow!("query generator returned no text"))?;
    Ok(truncate_string(line.trim(), MAX_QUERY_BYTES))
}
