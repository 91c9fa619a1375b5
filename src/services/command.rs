//! Shared subprocess plumbing for command-backed services.
use anyhow::{anyhow, Context, Result};
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Instant;

/// Split a configured command and substitute `{name}` placeholders per argument.
///
/// Substitution happens after splitting so values containing spaces or quotes
/// stay a single argument.
pub(super) fn expand_command(command: &str, values: &[(&str, &str)]) -> Result<Vec<String>> {
    let args =
        shell_words::split(command).with_context(|| format!("parse service command: {command}"))?;
    if args.is_empty() {
        return Err(anyhow!("service command is empty"));
    }
    Ok(args
        .into_iter()
        .map(|arg| {
            values
                .iter()
                .fold(arg, |arg, (placeholder, value)| arg.replace(placeholder, value))
        })
        .collect())
}

/// Run a command, optionally piping `stdin`, and return its stdout bytes.
pub(super) fn run_command(args: &[String], stdin: Option<&str>) -> Result<Vec<u8>> {
    let (program, rest) = args
        .split_first()
        .ok_or_else(|| anyhow!("service command is empty"))?;

    let start = Instant::now();
    let mut child = Command::new(program)
        .args(rest)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("spawn service command: {program}"))?;

    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        pipe.write_all(input.as_bytes())
            .context("write service command stdin")?;
    }

    let output = child
        .wait_with_output()
        .context("wait for service command")?;
    let elapsed_ms = start.elapsed().as_millis();

    tracing::debug!(
        program = program.as_str(),
        elapsed_ms,
        stdout_bytes = output.stdout.len(),
        "service command complete"
    );

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!(
            "{program} failed with status {}: {}",
            output.status,
            stderr.trim()
        ));
    }
    Ok(output.stdout)
}
