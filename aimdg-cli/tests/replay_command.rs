// aimdg-cli/tests/replay_command.rs
// ============================================================================
// Test: `replay` Subcommand
// Description: End-to-end checks of `aimdg replay` against the built binary,
//              chained off `aimdg admit --format hex` output.
// Purpose: Confirm proof-token verification reports success against the
//          signing key a decision was produced with, and failure against
//          any other key.
// ============================================================================

use std::io::Write as _;
use std::process::Command;
use std::process::Stdio;

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_aimdg")
}

const SIGNING_KEY_HEX: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcd";
const OTHER_KEY_HEX: &str = "abcdefabcdefabcdefabcdefabcdefabcdefabcdefabcdefabcdefabcdefabc";

fn sample_request() -> &'static str {
    r#"{
        "id": 7,
        "received_at": 0,
        "caller": {"id": "user-456", "tags": []},
        "action": {"kind": "generate", "resource": "chat", "method": "complete", "payload_digest": null},
        "prompt": "Summarize the quarterly report.",
        "context_docs": [],
        "sla_ms": null,
        "cost_ceiling": null
    }"#
}

fn admit_hex(signing_key_hex: &str, key_id: &str) -> String {
    let mut child = Command::new(bin())
        .args([
            "admit",
            "--request",
            "-",
            "--format",
            "hex",
            "--signing-key-hex",
            signing_key_hex,
            "--signing-key-id",
            key_id,
        ])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("aimdg binary should spawn");
    child
        .stdin
        .take()
        .expect("stdin should be piped")
        .write_all(sample_request().as_bytes())
        .expect("writing to stdin should succeed");
    let output = child.wait_with_output().expect("admit should exit");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn replay(hex_line: &str, extra_args: &[&str]) -> std::process::Output {
    let mut child = Command::new(bin())
        .args(["replay", "--input", "-"])
        .args(extra_args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("aimdg binary should spawn");
    child
        .stdin
        .take()
        .expect("stdin should be piped")
        .write_all(hex_line.as_bytes())
        .expect("writing to stdin should succeed");
    child.wait_with_output().expect("replay should exit")
}

#[test]
fn replay_verifies_proof_token_with_matching_signing_key() {
    let hex = admit_hex(SIGNING_KEY_HEX, "9");
    let output = replay(&hex, &["--verify-key-hex", SIGNING_KEY_HEX, "--verify-key-id", "9"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("verifies against the supplied signing key"));
}

#[test]
fn replay_reports_failed_verification_with_the_wrong_secret() {
    let hex = admit_hex(SIGNING_KEY_HEX, "9");
    let output = replay(&hex, &["--verify-key-hex", OTHER_KEY_HEX, "--verify-key-id", "9"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("does NOT verify"));
}

#[test]
fn replay_without_verify_flag_just_renders_the_decision() {
    let hex = admit_hex(SIGNING_KEY_HEX, "9");
    let output = replay(&hex, &["--format", "json"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let value: serde_json::Value =
        serde_json::from_str(&String::from_utf8_lossy(&output.stdout)).expect("stdout should be valid json");
    assert!(value.get("verdict").is_some());
}

#[test]
fn replay_rejects_malformed_hex_input() {
    let output = replay("not hex at all!!", &[]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to decode canonical decision record"));
}
