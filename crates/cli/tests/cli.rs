//! Smoke tests driving the `strata` binary end to end rather than the library.

use assert_cmd::Command;
use std::fs;

fn strata() -> Command {
    Command::cargo_bin("strata").unwrap()
}

#[test]
fn index_reports_file_and_chunk_counts() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), "hello world\n").unwrap();
    fs::write(dir.path().join("b.txt"), "second file\n").unwrap();

    let output = strata().args(["index", dir.path().to_str().unwrap()]).assert().success().get_output().stdout.clone();
    let stdout = String::from_utf8(output).unwrap();
    assert!(stdout.contains("Files:    2"), "stdout was:\n{stdout}");
}

#[test]
fn index_json_output_is_valid_json() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), "hello world\n").unwrap();

    let output = strata().args(["--json", "index", dir.path().to_str().unwrap()]).assert().success().get_output().stdout.clone();

    let parsed: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(parsed["files"].as_array().unwrap().len(), 1);
}

#[test]
fn search_against_a_never_indexed_path_fails_with_index_missing() {
    // Each invocation of the binary is its own process with a fresh, empty
    // in-memory store, so `search` without a prior `index` in the same
    // process always reports a missing index rather than "no matches".
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), "hello world\n").unwrap();

    let output = strata().args(["search", dir.path().to_str().unwrap(), "hello"]).assert().failure().get_output().stderr.clone();
    let stderr = String::from_utf8(output).unwrap();
    assert!(stderr.contains("no index found"), "stderr was:\n{stderr}");
}

#[test]
fn index_on_a_missing_path_fails_with_an_error_message() {
    let output = strata().args(["index", "/does/not/exist/anywhere"]).assert().failure().get_output().stderr.clone();
    let stderr = String::from_utf8(output).unwrap();
    assert!(stderr.starts_with("error:"), "stderr was:\n{stderr}");
}
