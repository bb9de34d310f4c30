// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Integration tests for the `spool` binary.

use std::fs;
use std::process::{Command, Output};

use tempfile::TempDir;

fn spool(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_spool"))
        .args(args)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run spool")
}

#[test]
fn echo_demo_round_trips() {
    let out = spool(&["echo"]);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(
        out.status.success(),
        "stdout: {}\nstderr: {}",
        stdout,
        String::from_utf8_lossy(&out.stderr)
    );
    assert!(stdout.contains("echo OK"), "{}", stdout);
}

#[test]
fn request_against_closed_port_reports_each_failure() {
    let port = {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap().port()
    };
    let addr = format!("127.0.0.1:{}", port);

    let out = spool(&["request", &addr, "2"]);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(!out.status.success());
    assert!(stdout.contains("request FAILED: 2 tasks"), "{}", stdout);
    assert!(stdout.contains("0 ok, 2 failed"), "{}", stdout);
}

#[test]
fn bad_config_file_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("spool.json");
    fs::write(&path, "{ not json").unwrap();

    let out = spool(&["--config", path.to_str().unwrap(), "echo"]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("failed to parse"), "{}", stderr);
}

#[test]
fn unknown_command_exits_nonzero() {
    let out = spool(&["frobnicate"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("unknown command"));
}

#[test]
fn version_prints_the_package_version() {
    let out = spool(&["version"]);
    assert!(out.status.success());
    assert_eq!(
        String::from_utf8_lossy(&out.stdout).trim(),
        format!("spool {}", env!("CARGO_PKG_VERSION"))
    );
}
