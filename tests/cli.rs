use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

fn cli_command(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("edca").expect("cli bin");
    cmd.current_dir(dir.path()).env_remove("RUST_LOG");
    cmd
}

#[test]
fn init_authority_uses_defaults() {
    let dir = TempDir::new().expect("temp dir");

    cli_command(&dir)
        .arg("init-authority")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created Root CA certificate: ca.crt"))
        .stdout(predicate::str::contains("Subject: Root CA"))
        .stdout(predicate::str::contains("Signature algorithm: ED25519"));

    assert!(dir.path().join("ca.crt").exists());
    assert!(dir.path().join("ca.key").exists());
}

#[test]
fn end_to_end_server_issuance() {
    let dir = TempDir::new().expect("temp dir");

    cli_command(&dir)
        .args(["init-authority", "--subject", "Example CA", "--cert", "ca.crt", "--key", "ca.key"])
        .assert()
        .success();

    cli_command(&dir)
        .args([
            "issue-server-cert",
            "--authority-cert",
            "ca.crt",
            "--authority-key",
            "ca.key",
            "--subject",
            "example.com",
            "--cert",
            "server.crt",
            "--key",
            "server.key",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created server certificate: server.crt"))
        .stdout(predicate::str::contains("Signed by: Example CA (ca.crt)"))
        .stdout(predicate::str::contains("Valid for: 365 days"))
        .stdout(predicate::str::contains("Digest: sha256"));

    assert!(dir.path().join("server.crt").exists());
    assert!(dir.path().join("server.key").exists());
    assert!(!dir.path().join("server.csr").exists());
}

#[test]
fn client_issuance_defaults_and_json() {
    let dir = TempDir::new().expect("temp dir");

    cli_command(&dir).arg("init-authority").assert().success();

    let output = cli_command(&dir)
        .args([
            "--json",
            "issue-client-cert",
            "--authority-cert",
            "ca.crt",
            "--authority-key",
            "ca.key",
            "--subject",
            "client-1",
        ])
        .output()
        .expect("run cli");
    assert!(output.status.success());

    let report: Value = serde_json::from_slice(&output.stdout).expect("json report");
    assert_eq!(report["role"], "client");
    assert_eq!(report["subject"], "client-1");
    assert_eq!(report["certificate"], "client.crt");
    assert_eq!(report["private_key"], "client.key");
    assert_eq!(report["issuer"], "Root CA");
    assert_eq!(report["validity_days"], 365);
    assert_eq!(report["algorithm"], "ED25519");
    assert_eq!(report["digest"], "sha256");

    assert!(dir.path().join("client.crt").exists());
}

#[test]
fn refuses_to_overwrite_existing_authority() {
    let dir = TempDir::new().expect("temp dir");

    cli_command(&dir).arg("init-authority").assert().success();
    let original = fs::read(dir.path().join("ca.crt")).expect("read ca.crt");

    cli_command(&dir)
        .arg("init-authority")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error: Already exists"));

    assert_eq!(fs::read(dir.path().join("ca.crt")).expect("read ca.crt"), original);
}

#[test]
fn missing_authority_is_reported() {
    let dir = TempDir::new().expect("temp dir");

    cli_command(&dir)
        .args([
            "issue-server-cert",
            "--authority-cert",
            "ca.crt",
            "--authority-key",
            "ca.key",
            "--subject",
            "example.com",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error: Not found: authority certificate"));

    assert!(!dir.path().join("server.key").exists());
}

#[test]
fn missing_destination_directory_is_reported() {
    let dir = TempDir::new().expect("temp dir");

    cli_command(&dir)
        .args(["init-authority", "--cert", "nowhere/ca.crt"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error: Path error"));

    assert!(!dir.path().join("ca.key").exists());
}

#[test]
fn missing_required_flag_is_a_usage_error() {
    let dir = TempDir::new().expect("temp dir");

    cli_command(&dir)
        .args(["issue-server-cert", "--authority-cert", "ca.crt", "--authority-key", "ca.key"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--subject"));
}

#[test]
fn unknown_flag_is_a_usage_error() {
    let dir = TempDir::new().expect("temp dir");

    cli_command(&dir)
        .args(["init-authority", "--validity-days", "30"])
        .assert()
        .code(2);

    assert!(!dir.path().join("ca.crt").exists());
}
