//! CLI-surface coverage for both binaries, run as real subprocesses via
//! `CARGO_BIN_EXE_...`, mirroring the teacher's `tests/tls_tests.rs` style.

use std::io::Write;

fn agent_binary() -> std::path::PathBuf {
    std::path::PathBuf::from(env!("CARGO_BIN_EXE_nrpe-ng"))
}

fn probe_binary() -> std::path::PathBuf {
    std::path::PathBuf::from(env!("CARGO_BIN_EXE_check_nrpe_ng"))
}

fn write_server_config(dir: &std::path::Path, contents: &str) -> std::path::PathBuf {
    let path = dir.join("nrpe-ng.cfg");
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    path
}

#[test]
fn agent_check_config_accepts_a_valid_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_server_config(&dir, "server_port = 12345\ncommand[ok] = /bin/true\n");

    let output = std::process::Command::new(agent_binary())
        .args(["--config", path.to_str().unwrap(), "--check-config"])
        .output()
        .expect("failed to execute nrpe-ng");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("valid"));
}

#[test]
fn agent_check_config_rejects_bad_port() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_server_config(&dir, "server_port = 70000\n");

    let output = std::process::Command::new(agent_binary())
        .args(["--config", path.to_str().unwrap(), "--check-config"])
        .output()
        .expect("failed to execute nrpe-ng");

    assert!(!output.status.success());
}

#[test]
fn agent_show_config_renders_yaml_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_server_config(&dir, "server_port = 12345\n");

    let output = std::process::Command::new(agent_binary())
        .args(["--config", path.to_str().unwrap(), "--show-config"])
        .output()
        .expect("failed to execute nrpe-ng");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("server_port: 12345"));
}

#[test]
fn agent_show_config_renders_json_when_requested() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_server_config(&dir, "server_port = 12345\n");

    let output = std::process::Command::new(agent_binary())
        .args([
            "--config",
            path.to_str().unwrap(),
            "--show-config",
            "--config-format",
            "json",
        ])
        .output()
        .expect("failed to execute nrpe-ng");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"server_port\": 12345"));
}

#[test]
fn probe_check_config_requires_host() {
    let output = std::process::Command::new(probe_binary())
        .args(["--check-config"])
        .output()
        .expect("failed to execute check_nrpe_ng");

    // clap enforces -H as required, so this should fail before reaching
    // our own config validation.
    assert!(!output.status.success());
}

#[test]
fn probe_check_config_accepts_host_only() {
    let output = std::process::Command::new(probe_binary())
        .args(["-H", "127.0.0.1", "--check-config"])
        .output()
        .expect("failed to execute check_nrpe_ng");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("valid"));
}
