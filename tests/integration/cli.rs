//! Integration tests for the `memsim` binary and script runner

use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

use memsim::memory::{MemoryError, MemoryManager};
use memsim::{run, run_file};

/// Helper function to create a test file
fn create_test_file(
    dir: &TempDir,
    name: &str,
    content: &str,
) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn memsim() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_memsim"));
    cmd.env_remove("MEMSIM_SIZE").env_remove("MEMSIM_LOG");
    cmd
}

const SCENARIO: &str = "\
# fragmentation scenario
alloc a 4
alloc b 3
free a
defrag
alloc c 5
write b 1 xy
read b 1 2
show
";

#[test]
fn test_run_file() {
    let dir = TempDir::new().unwrap();
    let file = create_test_file(&dir, "scenario.mem", SCENARIO);

    let memory = MemoryManager::new(10).unwrap();
    let out = run_file(&memory, &file).unwrap();
    assert_eq!(out.len(), 8);
    assert_eq!(out[4], "allocated c at 3 (size 5)");
    assert_eq!(out[6], "\"xy\"");
    assert_eq!(out[7], "XxyXXXXX--");
}

#[test]
fn test_run_missing_file() {
    let memory = MemoryManager::new(10).unwrap();
    let err = run_file(&memory, &PathBuf::from("/nonexistent/script.mem")).unwrap_err();
    assert!(err.to_string().contains("Failed to read file"));
}

#[test]
fn test_run_parse_error_runs_nothing() {
    let memory = MemoryManager::new(10).unwrap();
    let err = run(&memory, "alloc a 2\nalloc b two\n").unwrap_err();
    assert!(err.to_string().contains("line 2"));
    assert!(!memory.contains("a"));
}

#[test]
fn test_cli_run() {
    let dir = TempDir::new().unwrap();
    let file = create_test_file(&dir, "scenario.mem", SCENARIO);

    let output = memsim()
        .args(["--size", "10", "run"])
        .arg(&file)
        .current_dir(dir.path())
        .output()
        .expect("Failed to execute memsim");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("allocated c at 3 (size 5)"));
    assert!(stdout.lines().any(|line| line == "XxyXXXXX--"));
}

#[test]
fn test_cli_eval_reports_failure() {
    let dir = TempDir::new().unwrap();
    let output = memsim()
        .args(["eval", "alloc a 2; free b"])
        .current_dir(dir.path())
        .output()
        .expect("Failed to execute memsim");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Block not found: b"));
}

#[test]
fn test_cli_uses_project_config() {
    let dir = TempDir::new().unwrap();
    create_test_file(&dir, "memsim.toml", "[memory]\nsize = 6\n");

    let output = memsim()
        .args(["eval", "alloc a 2; show"])
        .current_dir(dir.path())
        .output()
        .expect("Failed to execute memsim");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.lines().any(|line| line == "XX----"));
}

#[test]
fn test_cli_demo() {
    let dir = TempDir::new().unwrap();
    let output = memsim()
        .args(["demo", "--json"])
        .current_dir(dir.path())
        .output()
        .expect("Failed to execute memsim");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Freed blocks 2 and 4: X-X-X"));
    assert!(stdout.contains("\"map\": \"AXXXX\""));
}

#[test]
fn test_cli_size_flag_overrides_env_and_project_config() {
    let dir = TempDir::new().unwrap();
    let output = memsim()
        .env("MEMSIM_SIZE", "0")
        .args(["--size", "10", "eval", "show"])
        .current_dir(dir.path())
        .output()
        .expect("Failed to execute memsim");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.lines().any(|line| line == "----------"));

    create_test_file(&dir, "memsim.toml", "[memory]\nsize = 0\n");
    let output = memsim()
        .args(["--size", "4", "eval", "show"])
        .current_dir(dir.path())
        .output()
        .expect("Failed to execute memsim");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.lines().any(|line| line == "----"));
}

#[test]
fn test_cli_zero_size_without_override_fails() {
    let dir = TempDir::new().unwrap();
    let output = memsim()
        .env("MEMSIM_SIZE", "0")
        .args(["eval", "show"])
        .current_dir(dir.path())
        .output()
        .expect("Failed to execute memsim");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("memory.size must be positive"));
}

#[test]
fn test_cli_eval_keeps_semicolon_in_payload() {
    let dir = TempDir::new().unwrap();
    let output = memsim()
        .args(["--size", "5", "eval", "alloc a 3; write a 0 x;y; read a 0 3"])
        .current_dir(dir.path())
        .output()
        .expect("Failed to execute memsim");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.lines().any(|line| line == "\"x;y\""));
}

#[test]
fn test_run_error_keeps_memory_error() {
    let memory = MemoryManager::new(4).unwrap();
    let err = run(&memory, "alloc a 2\nfree b\n").unwrap_err();
    assert_eq!(
        err.downcast_ref::<MemoryError>(),
        Some(&MemoryError::NotFound { id: "b".into() })
    );
    assert_eq!(format!("{:#}", err), "line 2: Block not found: b");
}
