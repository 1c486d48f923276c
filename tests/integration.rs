//! End-to-end tests driving the `locallm` binary.
//!
//! Only model-independent commands are exercised here: list, search, and
//! knowledge-map handling with a pre-seeded map file. Anything needing a
//! live Ollama backend stays out of CI.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn locallm_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("locallm");
    path
}

fn setup_docs() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();

    fs::write(
        root.join("alpha.md"),
        "# Alpha Document\n\nThis is the alpha document about Rust programming.\n\nIt contains information about cargo and crates.",
    )
    .unwrap();
    fs::write(
        root.join("beta.md"),
        "# Beta Document\n\nThis document discusses Python and machine learning.\n\nDeep learning frameworks like PyTorch are covered.",
    )
    .unwrap();
    fs::create_dir(root.join("notes")).unwrap();
    fs::write(
        root.join("notes/gamma.txt"),
        "Gamma plain text file.\n\nContains notes about deployment and infrastructure.\n\nKubernetes and Docker are mentioned here.",
    )
    .unwrap();
    fs::write(root.join("ignored.bin"), b"\x00\x01binary").unwrap();

    tmp
}

fn run_locallm(dir: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = locallm_binary();
    let output = Command::new(&binary)
        .arg("--dir")
        .arg(dir.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run locallm binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn list_shows_supported_documents_only() {
    let tmp = setup_docs();

    let (stdout, stderr, success) = run_locallm(tmp.path(), &["list"]);
    assert!(success, "list failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Found 3 document(s)"));
    assert!(stdout.contains("alpha.md"));
    assert!(stdout.contains("notes/gamma.txt"));
    assert!(!stdout.contains("ignored.bin"));
}

#[test]
fn list_empty_directory() {
    let tmp = TempDir::new().unwrap();

    let (stdout, _, success) = run_locallm(tmp.path(), &["list"]);
    assert!(success);
    assert!(stdout.contains("No documents found"));
}

#[test]
fn list_missing_directory_fails_generically() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope");

    let binary = locallm_binary();
    let output = Command::new(&binary)
        .arg("--dir")
        .arg(missing.to_str().unwrap())
        .arg("list")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn search_finds_matches_across_documents() {
    let tmp = setup_docs();

    let (stdout, stderr, success) = run_locallm(tmp.path(), &["search", "kubernetes"]);
    assert!(success, "search failed: stderr={}", stderr);
    assert!(stdout.contains("notes/gamma.txt"));
    assert!(stdout.contains(">>> Line"));
    assert!(stdout.contains("Kubernetes and Docker"));
}

#[test]
fn search_restricted_to_one_file() {
    let tmp = setup_docs();

    let (stdout, _, success) =
        run_locallm(tmp.path(), &["search", "document", "--file", "beta.md"]);
    assert!(success);
    assert!(stdout.contains("beta.md"));
    assert!(!stdout.contains("alpha.md"));
}

#[test]
fn search_without_matches_reports_cleanly() {
    let tmp = setup_docs();

    let (stdout, _, success) = run_locallm(tmp.path(), &["search", "zebra_quantum"]);
    assert!(success);
    assert!(stdout.contains("No matches found"));
}

#[test]
fn search_missing_file_exits_with_not_found_code() {
    let tmp = setup_docs();

    let binary = locallm_binary();
    let output = Command::new(&binary)
        .arg("--dir")
        .arg(tmp.path().to_str().unwrap())
        .args(["search", "anything", "--file", "ghost.md"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn map_file_is_never_listed_as_a_document() {
    let tmp = setup_docs();
    fs::write(
        tmp.path().join("knowledge_map.yaml"),
        "version: '1'\nroot: x\ngenerated_at: 2026-01-01T00:00:00Z\ndocuments: []\n",
    )
    .unwrap();

    let (stdout, _, success) = run_locallm(tmp.path(), &["list"]);
    assert!(success);
    assert!(stdout.contains("Found 3 document(s)"));
    assert!(!stdout.contains("knowledge_map.yaml"));
}

#[test]
fn config_file_excludes_apply() {
    let tmp = setup_docs();
    let config = tmp.path().join("locallm.toml");
    fs::write(&config, "[documents]\nexclude_globs = [\"notes/**\"]\n").unwrap();

    let binary = locallm_binary();
    let output = Command::new(&binary)
        .arg("--dir")
        .arg(tmp.path().to_str().unwrap())
        .arg("--config")
        .arg(config.to_str().unwrap())
        .arg("list")
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("Found 2 document(s)"));
    assert!(!stdout.contains("gamma.txt"));
}

#[test]
fn invalid_config_is_rejected() {
    let tmp = setup_docs();
    let config = tmp.path().join("locallm.toml");
    fs::write(&config, "[agent]\nmax_iterations = 0\n").unwrap();

    let binary = locallm_binary();
    let output = Command::new(&binary)
        .arg("--dir")
        .arg(tmp.path().to_str().unwrap())
        .arg("--config")
        .arg(config.to_str().unwrap())
        .arg("list")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("max_iterations"));
}

#[test]
fn models_without_backend_exits_unreachable() {
    let tmp = setup_docs();
    let config = tmp.path().join("locallm.toml");
    // A port nothing listens on.
    fs::write(
        &config,
        "[model]\nbase_url = \"http://127.0.0.1:59999\"\n",
    )
    .unwrap();

    let binary = locallm_binary();
    let output = Command::new(&binary)
        .arg("--dir")
        .arg(tmp.path().to_str().unwrap())
        .arg("--config")
        .arg(config.to_str().unwrap())
        .arg("models")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unreachable"));
}
