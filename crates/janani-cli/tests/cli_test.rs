//! Integration tests for the `janani` binary.
//!
//! Each test runs the built binary with its config directory pointed at a
//! scratch dir and no API key, so nothing touches the network or the real
//! user config.

use std::path::Path;
use std::process::{Command, Output};

fn janani(config_home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_janani"))
        .args(args)
        .env("XDG_CONFIG_HOME", config_home)
        .env("RUST_LOG", "error")
        .env_remove("ANTHROPIC_API_KEY")
        .env_remove("JANANI_PORT")
        .env_remove("JANANI_BIND")
        .env_remove("JANANI_LLM_MODEL")
        .env_remove("JANANI_LLM_BASE_URL")
        .env_remove("JANANI_LLM_TIMEOUT_SECS")
        .env_remove("JANANI_CONTEXT_TTL_SECS")
        .output()
        .expect("failed to run janani binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn schedule_for_week_prints_trimester_and_due_tests() {
    let tmp = tempfile::TempDir::new().unwrap();
    let output = janani(tmp.path(), &["schedule", "--week", "20"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let text = stdout(&output);
    assert!(text.contains("Week 20: second trimester"));
    assert!(text.contains("Ultrasound (Anomaly Scan)"));
}

#[test]
fn schedule_json_is_the_whole_table() {
    let tmp = tempfile::TempDir::new().unwrap();
    let output = janani(tmp.path(), &["schedule", "--json"]);
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let trimesters = json.as_array().unwrap();
    assert_eq!(trimesters.len(), 3);
    assert_eq!(trimesters[0]["trimester"], "first_trimester");
    assert_eq!(trimesters[2]["weeks"]["open_ended"], true);
}

#[test]
fn ask_without_api_key_gives_offline_answer() {
    let tmp = tempfile::TempDir::new().unwrap();
    let output = janani(tmp.path(), &["ask", "What tests do I need?", "--week", "10"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let text = stdout(&output);
    assert!(text.starts_with("Here are the important tests for you:"));
    assert!(text.contains("1. Blood Pressure"));
}

#[test]
fn ask_without_week_asks_for_it() {
    let tmp = tempfile::TempDir::new().unwrap();
    let output = janani(tmp.path(), &["ask", "कौन से टेस्ट?", "--language", "hindi"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("आप गर्भावस्था के कितने सप्ताह में हैं?"));
}

#[test]
fn init_writes_config_once() {
    let tmp = tempfile::TempDir::new().unwrap();

    let first = janani(tmp.path(), &["init", "--api-key", "sk-test"]);
    assert!(first.status.success(), "stderr: {}", String::from_utf8_lossy(&first.stderr));
    let written = std::fs::read_to_string(tmp.path().join("janani/config.toml")).unwrap();
    assert!(written.contains("api_key = \"sk-test\""));
    assert!(written.contains("port = 5000"));

    let second = janani(tmp.path(), &["init"]);
    assert!(!second.status.success());
    assert!(String::from_utf8_lossy(&second.stderr).contains("--force"));

    let forced = janani(tmp.path(), &["init", "--force"]);
    assert!(forced.status.success());
    let rewritten = std::fs::read_to_string(tmp.path().join("janani/config.toml")).unwrap();
    assert!(!rewritten.contains("api_key"));
}
