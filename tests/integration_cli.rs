//! Builder CLI smoke tests.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn publishes_a_single_binary() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("myapp");
    fs::write(&src, b"binary payload").unwrap();
    let out = tmp.path().join("public");

    let mut cmd = Command::cargo_bin("selfup").unwrap();
    cmd.arg("-o")
        .arg(&out)
        .arg("-p")
        .arg("linux-amd64")
        .arg(&src)
        .arg("1.2");

    cmd.assert().success();
    assert!(out.join("linux-amd64.json").exists());
    assert!(out.join("1.2/linux-amd64.gz").exists());
}

#[test]
fn publishes_every_file_of_a_directory_as_its_own_platform() {
    let tmp = TempDir::new().unwrap();
    let build = tmp.path().join("build");
    fs::create_dir_all(&build).unwrap();
    fs::write(build.join("linux-amd64"), b"linux bits").unwrap();
    fs::write(build.join("windows-amd64"), b"windows bits").unwrap();
    let out = tmp.path().join("public");

    let mut cmd = Command::cargo_bin("selfup").unwrap();
    cmd.arg("-o").arg(&out).arg(&build).arg("1.0");

    cmd.assert().success();
    assert!(out.join("linux-amd64.json").exists());
    assert!(out.join("windows-amd64.json").exists());
    assert!(out.join("1.0/linux-amd64.gz").exists());
    assert!(out.join("1.0/windows-amd64.gz").exists());
}

#[test]
fn missing_source_exits_nonzero_with_a_diagnostic() {
    let tmp = TempDir::new().unwrap();

    let mut cmd = Command::cargo_bin("selfup").unwrap();
    cmd.current_dir(tmp.path()).arg("./does-not-exist").arg("1.2");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("does-not-exist"));
}

#[test]
fn missing_version_argument_shows_usage() {
    let mut cmd = Command::cargo_bin("selfup").unwrap();
    cmd.arg("./myapp");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn unparseable_key_file_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("myapp");
    fs::write(&src, b"binary payload").unwrap();
    let key = tmp.path().join("bad.pem");
    fs::write(&key, "not a pem").unwrap();

    let mut cmd = Command::cargo_bin("selfup").unwrap();
    cmd.arg("-k").arg(&key).arg(&src).arg("1.2");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("private key"));
}
