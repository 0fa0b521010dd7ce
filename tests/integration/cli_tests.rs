//! Integration tests for the CLI binary.
//!
//! Drives the `rkh` binary against a throwaway store directory.
//!
//! This test is registered as a [[test]] in the rdp-known-hosts-cli crate
//! so that CARGO_BIN_EXE_rkh is available.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../tests/fixtures")
        .join(name)
}

/// Get a Command pointing to the `rkh` binary.
fn rkh_binary() -> Command {
    Command::new(env!("CARGO_BIN_EXE_rkh"))
}

fn rkh(store: &Path, args: &[&str]) -> Output {
    rkh_binary()
        .arg("--store")
        .arg(store)
        .args(args)
        .output()
        .expect("failed to execute rkh")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn cli_responds_to_help() {
    let output = rkh_binary()
        .arg("--help")
        .output()
        .expect("failed to execute rkh --help");

    assert!(
        output.status.success(),
        "rkh --help should exit with success, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let out = stdout(&output);
    assert!(out.contains("Usage"), "expected usage text, got: {out}");
    assert!(out.contains("check"));
}

#[test]
fn cli_responds_to_version() {
    let output = rkh_binary()
        .arg("--version")
        .output()
        .expect("failed to execute rkh --version");

    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("0.1"), "expected version info, got: {out}");
}

#[test]
fn cli_exits_with_error_on_unknown_flag() {
    let output = rkh_binary()
        .arg("--nonexistent-flag")
        .output()
        .expect("failed to execute rkh");

    assert!(!output.status.success());
}

#[test]
fn cli_list_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    let output = rkh(dir.path(), &["list"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("No trusted endpoints"));
    // Reading never creates the table.
    assert!(!dir.path().join("known_hosts2").exists());
}

#[test]
fn cli_add_then_check_trusted() {
    let dir = tempfile::tempdir().unwrap();
    let cert = fixture("gts-root-r1.pem");
    let cert = cert.to_str().unwrap();

    let added = rkh(
        dir.path(),
        &["add", "--host", "rdp.example.com", "--port", "3389", "--cert", cert],
    );
    assert!(added.status.success(), "{}", String::from_utf8_lossy(&added.stderr));
    assert!(stdout(&added).contains("Trusted certificate for rdp.example.com:3389"));

    let checked = rkh(
        dir.path(),
        &["check", "--host", "rdp.example.com", "--port", "3389", "--cert", cert],
    );
    assert_eq!(checked.status.code(), Some(0));
    assert!(stdout(&checked).starts_with("trusted"));
}

#[test]
fn cli_check_unknown_and_mismatch_exit_codes() {
    let dir = tempfile::tempdir().unwrap();
    let r1 = fixture("gts-root-r1.pem");
    let r2 = fixture("gts-root-r2.pem");

    let unknown = rkh(
        dir.path(),
        &["check", "--host", "h", "--port", "1", "--cert", r1.to_str().unwrap()],
    );
    assert_eq!(unknown.status.code(), Some(2));
    assert!(stdout(&unknown).starts_with("unknown"));

    rkh(
        dir.path(),
        &["add", "--host", "h", "--port", "1", "--cert", r1.to_str().unwrap()],
    );
    let mismatch = rkh(
        dir.path(),
        &["check", "--host", "h", "--port", "1", "--cert", r2.to_str().unwrap()],
    );
    assert_eq!(mismatch.status.code(), Some(3));
    assert!(stdout(&mismatch).contains("Stored fingerprint"));
}

#[test]
fn cli_check_json_output() {
    let dir = tempfile::tempdir().unwrap();
    let r1 = fixture("gts-root-r1.pem");
    let r1 = r1.to_str().unwrap();

    rkh(dir.path(), &["add", "--host", "h", "--port", "7", "--cert", r1]);
    let output = rkh(
        dir.path(),
        &["--json", "check", "--host", "h", "--port", "7", "--cert", r1],
    );
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["status"], "trusted");
    assert_eq!(value["port"], 7);
    assert!(value["stored_fingerprint"].is_null());
}

#[test]
fn cli_list_and_show() {
    let dir = tempfile::tempdir().unwrap();
    let r3 = fixture("gts-root-r3.pem");

    rkh(
        dir.path(),
        &["add", "--host", "a.example", "--port", "3389", "--cert", r3.to_str().unwrap()],
    );

    let listed = rkh(dir.path(), &["list"]);
    assert!(listed.status.success());
    let out = stdout(&listed);
    assert!(out.contains("a.example:3389"));
    assert!(out.contains("GTS Root R3"));

    let shown = rkh(
        dir.path(),
        &["show", "--host", "a.example", "--port", "3389", "--pem"],
    );
    assert!(shown.status.success());
    assert!(stdout(&shown).contains("-----BEGIN CERTIFICATE-----"));

    let json = rkh(dir.path(), &["--json", "list"]);
    let value: serde_json::Value = serde_json::from_slice(&json.stdout).unwrap();
    assert_eq!(value.as_array().unwrap().len(), 1);
    assert_eq!(value[0]["host"], "a.example");
    assert!(value[0].get("pem").is_none());
}

#[test]
fn cli_show_unknown_endpoint_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = rkh(dir.path(), &["show", "--host", "nowhere", "--port", "1"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("nowhere:1"));
}

#[test]
fn cli_remove_forgets_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let r4 = fixture("gts-root-r4.pem");

    rkh(
        dir.path(),
        &["add", "--host", "h", "--port", "5", "--cert", r4.to_str().unwrap()],
    );
    let removed = rkh(dir.path(), &["remove", "--host", "h", "--port", "5"]);
    assert!(removed.status.success());
    assert!(stdout(&removed).contains("Removed h:5"));

    let check = rkh(
        dir.path(),
        &["check", "--host", "h", "--port", "5", "--cert", r4.to_str().unwrap()],
    );
    assert_eq!(check.status.code(), Some(2));

    // Removing again is not an error.
    let again = rkh(dir.path(), &["remove", "--host", "h", "--port", "5"]);
    assert!(again.status.success());
}

#[test]
fn cli_fingerprint_prints_identity() {
    let dir = tempfile::tempdir().unwrap();
    let r2 = fixture("gts-root-r2.pem");
    let output = rkh(dir.path(), &["fingerprint", "--cert", r2.to_str().unwrap()]);

    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("GTS Root R2"));
    let line = out
        .lines()
        .find(|l| l.starts_with("Fingerprint:"))
        .unwrap();
    let fingerprint = line.trim_start_matches("Fingerprint:").trim();
    assert_eq!(fingerprint.len(), 95);
}

#[test]
fn cli_rejects_invalid_certificate() {
    let dir = tempfile::tempdir().unwrap();
    let bogus = dir.path().join("bogus.pem");
    std::fs::write(&bogus, "not a certificate\n").unwrap();

    let output = rkh(
        dir.path(),
        &["add", "--host", "h", "--port", "1", "--cert", bogus.to_str().unwrap()],
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(!dir.path().join("known_hosts2").exists());
}
