// aimdg-cli/tests/config_command.rs
// ============================================================================
// Test: `config` Subcommand
// Description: End-to-end checks of `aimdg config` against the built binary.
// Purpose: Confirm schema/example/docs generation and settings validation
//          behave as documented, without needing a running gateway.
// ============================================================================

use std::process::Command;

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_aimdg")
}

#[test]
fn config_example_settings_prints_an_annotated_toml_document() {
    let output = Command::new(bin()).args(["config", "example", "settings"]).output().expect("command should run");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("tau_high"));
}

#[test]
fn config_example_policy_prints_example_policies() {
    let output = Command::new(bin()).args(["config", "example", "policy"]).output().expect("command should run");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("[[policy]]"));
}

#[test]
fn config_schema_settings_prints_valid_json() {
    let output = Command::new(bin()).args(["config", "schema", "settings"]).output().expect("command should run");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let value: serde_json::Value =
        serde_json::from_str(&String::from_utf8_lossy(&output.stdout)).expect("schema should be valid json");
    assert!(value["properties"]["tau_high"].is_object());
}

#[test]
fn config_validate_accepts_an_empty_file() {
    let dir = tempfile::tempdir().expect("tempdir should be creatable");
    let path = dir.path().join("aimdg.toml");
    std::fs::write(&path, "").expect("config file should be writable");

    let output = Command::new(bin())
        .args(["config", "validate", path.to_str().expect("temp path should be utf8")])
        .output()
        .expect("command should run");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("is valid"));
}

#[test]
fn config_validate_rejects_an_unknown_key() {
    let dir = tempfile::tempdir().expect("tempdir should be creatable");
    let path = dir.path().join("aimdg.toml");
    std::fs::write(&path, "not_a_real_setting = 1\n").expect("config file should be writable");

    let output = Command::new(bin())
        .args(["config", "validate", path.to_str().expect("temp path should be utf8")])
        .output()
        .expect("command should run");
    assert!(!output.status.success());
}

#[test]
fn config_validate_rejects_inverted_confidence_band() {
    let dir = tempfile::tempdir().expect("tempdir should be creatable");
    let path = dir.path().join("aimdg.toml");
    std::fs::write(&path, "tau_low = 0.99\ntau_high = 0.5\n").expect("config file should be writable");

    let output = Command::new(bin())
        .args(["config", "validate", path.to_str().expect("temp path should be utf8")])
        .output()
        .expect("command should run");
    assert!(!output.status.success());
}

#[test]
fn config_docs_prints_markdown_mentioning_settings_fields() {
    let output = Command::new(bin()).args(["config", "docs"]).output().expect("command should run");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("tau_high"));
}

#[test]
fn config_docs_writes_to_the_given_path() {
    let dir = tempfile::tempdir().expect("tempdir should be creatable");
    let path = dir.path().join("aimdg.toml.md");

    let output = Command::new(bin())
        .args(["config", "docs", path.to_str().expect("temp path should be utf8")])
        .output()
        .expect("command should run");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let written = std::fs::read_to_string(&path).expect("docs file should have been written");
    assert!(written.contains("tau_high"));
}
