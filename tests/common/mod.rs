//! Shared test infrastructure for integration tests.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Speech command writing the spoken text as the "audio" bytes and failing
/// for any text containing `Katze`.
pub const FAKE_TTS_COMMAND: &str = r#"sh -c 'case "$1" in *Katze*) echo "no voice" >&2; exit 3;; esac; printf "%s" "$1" > "$2"' vdeck-tts {text} {output}"#;

pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Run the `vdeck` binary with `args`, without inheriting service env vars.
pub fn vdeck(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_vdeck"))
        .args(args)
        .env_remove("VDECK_TTS_COMMAND")
        .env_remove("VDECK_QUERY_COMMAND")
        .env("RUST_LOG", "warn")
        .output()
        .expect("spawn vdeck")
}

pub fn stdout_json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "vdeck failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

/// Initialize a project and optionally enable the fake speech command.
pub fn init_project(project: &Path, with_tts: bool) {
    let project_arg = project.to_str().expect("utf-8 path");
    let output = vdeck(&["init", "--project", project_arg, "--deck-name", "German"]);
    assert!(
        output.status.success(),
        "init failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    if with_tts {
        let config_path = project.join("deck").join("config.json");
        let text = fs::read_to_string(&config_path).expect("read config");
        let mut config: serde_json::Value = serde_json::from_str(&text).expect("parse config");
        config["tts"] = serde_json::json!({ "command": FAKE_TTS_COMMAND });
        fs::write(
            &config_path,
            serde_json::to_string_pretty(&config).expect("serialize config"),
        )
        .expect("write config");
    }
}

pub fn write_input(dir: &Path, files: &[(&str, &str)]) {
    fs::create_dir_all(dir).expect("create input dir");
    for (name, text) in files {
        fs::write(dir.join(name), text).expect("write input csv");
    }
}

pub const THREE_NOUNS: (&str, &str) = (
    "nouns.csv",
    "word,article,english,example\nHund,der,dog,\nKatze,die,cat,\nMaus,die,mouse,\n",
);
