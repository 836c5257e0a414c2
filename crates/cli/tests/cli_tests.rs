//! End-to-end tests driving the `cli` binary over stdin.
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use tempfile::tempdir;

/// Runs the shell against `dir` with `commands` on stdin and returns stdout.
fn run_cli(dir: &Path, capacity: &str, commands: &str) -> String {
    let mut child = Command::new(env!("CARGO_BIN_EXE_cli"))
        .env("DRIFT_DIR", dir)
        .env("DRIFT_MEMTABLE_CAPACITY", capacity)
        .env("DRIFT_WAL_SYNC", "false")
        .env("RUST_LOG", "warn")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn cli");

    {
        let stdin = child.stdin.as_mut().expect("failed to open stdin");
        stdin.write_all(commands.as_bytes()).expect("write commands");
        stdin.write_all(b"EXIT\n").expect("write EXIT");
    }

    let output = child.wait_with_output().expect("failed to read output");
    assert!(output.status.success(), "cli exited with {}", output.status);
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Result lines with the prompt stripped.
fn results(output: &str) -> Vec<String> {
    output
        .lines()
        .skip(1)
        .map(|l| l.trim_start_matches("> ").to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

#[test]
fn set_get_del_round_trip() {
    let dir = tempdir().unwrap();
    let out = run_cli(dir.path(), "100", "SET k hello world\nGET k\nDEL k\nGET k\nDEL k\n");

    assert_eq!(
        results(&out),
        ["OK", "hello world", "hello world", "(nil)", "(nil)", "bye"]
    );
}

#[test]
fn invalid_input_reports_errors() {
    let dir = tempdir().unwrap();
    let out = run_cli(dir.path(), "100", "SET a=b v\nSET k\nBOGUS\nGET missing\n");
    let lines = results(&out);

    assert!(lines[0].starts_with("ERR set failed"));
    assert_eq!(lines[1], "ERR usage: SET key value");
    assert_eq!(lines[2], "ERR unknown command: BOGUS");
    assert_eq!(lines[3], "(nil)");
}

#[test]
fn data_survives_restart() {
    let dir = tempdir().unwrap();
    run_cli(dir.path(), "100", "SET a 1\nSET b 2\nDEL a\n");

    let out = run_cli(dir.path(), "100", "GET a\nGET b\n");
    assert_eq!(results(&out), ["(nil)", "2", "bye"]);
}

#[test]
fn flush_and_compact_commands() {
    let dir = tempdir().unwrap();
    let out = run_cli(
        dir.path(),
        "100",
        "SET a 1\nFLUSH\nSET b 2\nFLUSH\nDEL a\nFLUSH\nCOMPACT\nGET a\nGET b\n",
    );
    let lines = results(&out);

    assert_eq!(lines[1], "OK (sealed 1, total 1)");
    assert_eq!(lines[3], "OK (sealed 1, total 2)");
    assert_eq!(lines[5], "OK (sealed 1, total 3)");
    assert_eq!(lines[6], "OK (merged 3, live 1, dropped 1)");
    assert_eq!(lines[7], "(nil)");
    assert_eq!(lines[8], "2");
}

#[test]
fn creates_missing_data_directory() {
    let dir = tempdir().unwrap();
    let nested = dir.path().join("nested").join("data");
    let out = run_cli(&nested, "100", "SET k v\nGET k\n");

    assert_eq!(results(&out), ["OK", "v", "bye"]);
    assert!(nested.join("log").exists());
}

#[test]
fn invalid_configuration_fails_startup() {
    let dir = tempdir().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_cli"))
        .env("DRIFT_DIR", dir.path())
        .env("DRIFT_MEMTABLE_CAPACITY", "lots")
        .stdin(Stdio::null())
        .output()
        .expect("failed to run cli");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid configuration"));
}
