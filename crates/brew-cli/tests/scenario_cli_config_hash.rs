use std::io::Write;
use std::path::PathBuf;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("..").join("..")
}

fn stdout_of(args: &[&str]) -> String {
    let out = Command::cargo_bin("brew")
        .unwrap()
        .args(args)
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    String::from_utf8(out.stdout).unwrap()
}

#[test]
fn config_hash_is_stable_and_layer_sensitive() {
    let base = repo_root().join("config/defaults/base.yaml");
    let local = repo_root().join("config/local-memory.yaml");
    let base_s = base.to_string_lossy().to_string();
    let local_s = local.to_string_lossy().to_string();

    let a = stdout_of(&["config-hash", &base_s]);
    let b = stdout_of(&["config-hash", &base_s]);
    assert_eq!(a, b);
    assert!(a.starts_with("config_hash="));
    assert!(a.contains("\"espresso\":\"3.00\""));

    let layered = stdout_of(&["config-hash", &base_s, &local_s]);
    assert_ne!(a.lines().next(), layered.lines().next());
    assert!(layered.contains("\"backend\":\"memory\""));
}

#[test]
fn config_hash_refuses_secret_literals() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, "db:\n  url_env: \"postgres://user:pw@localhost/brew\"").unwrap();

    Command::cargo_bin("brew")
        .unwrap()
        .args(["config-hash", f.path().to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_SECRET_DETECTED"));
}

#[test]
fn config_hash_requires_a_path() {
    Command::cargo_bin("brew")
        .unwrap()
        .arg("config-hash")
        .assert()
        .failure();
}
