//! Integration tests for the `glosa` binary.
//!
//! Every command runs inside a temp directory with HOME pointed at it and no
//! API key, so nothing here reaches the network.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn glosa(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("glosa").unwrap();
    cmd.current_dir(temp_dir.path())
        .env("HOME", temp_dir.path())
        .env("NO_COLOR", "1")
        .env_remove("GEMINI_API_KEY")
        .env_remove("GEMINI_BASE_URL")
        .env_remove("GLOSA_MODEL")
        .env_remove("GLOSA_CACHE_NAME")
        .env_remove("GLOSA_DATA_DIR")
        .env_remove("GLOSA_ADDRESS");
    cmd
}

const RECORD: &str = r#"[{"cacheName":"cachedContents/abc123","model":"models/gemini-2.5-flash","createdAt":"2025-01-01T00:00:00Z","ttlSeconds":3600}]"#;

#[test]
fn test_help_lists_commands() {
    let temp_dir = TempDir::new().unwrap();
    glosa(&temp_dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("setup-cache"))
        .stdout(predicate::str::contains("setup-rules"))
        .stdout(predicate::str::contains("ask"))
        .stdout(predicate::str::contains("serve"));
}

#[test]
fn test_cache_list_empty() {
    let temp_dir = TempDir::new().unwrap();
    glosa(&temp_dir)
        .args(["cache", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No caches configured"));
}

#[test]
fn test_cache_list_json_reads_registry() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("store");
    std::fs::create_dir_all(&data_dir).unwrap();
    std::fs::write(data_dir.join("cache.json"), RECORD).unwrap();

    let output = glosa(&temp_dir)
        .env("GLOSA_DATA_DIR", &data_dir)
        .args(["cache", "list", "--json"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let records: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(records[0]["cacheName"], "cachedContents/abc123");
    assert_eq!(records[0]["ttlSeconds"], 3600);
}

#[test]
fn test_cache_list_reads_legacy_single_record() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("data");
    std::fs::create_dir_all(&data_dir).unwrap();
    std::fs::write(
        data_dir.join("cache.json"),
        r#"{"cacheName":"cachedContents/legacy","model":"gemini-1.5-flash-001","createdAt":"2024-06-01T12:00:00Z","ttlSeconds":600}"#,
    )
    .unwrap();

    glosa(&temp_dir)
        .args(["cache", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cachedContents/legacy"))
        .stdout(predicate::str::contains("600s"));
}

#[test]
fn test_cache_clear_empties_registry() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("data");
    std::fs::create_dir_all(&data_dir).unwrap();
    std::fs::write(data_dir.join("cache.json"), RECORD).unwrap();

    glosa(&temp_dir)
        .args(["cache", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cache info cleared"));

    let content = std::fs::read_to_string(data_dir.join("cache.json")).unwrap();
    let records: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(records, serde_json::json!([]));
}

#[test]
fn test_data_dir_flag_overrides_default() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("elsewhere");
    std::fs::create_dir_all(&data_dir).unwrap();
    std::fs::write(data_dir.join("cache.json"), RECORD).unwrap();

    glosa(&temp_dir)
        .arg("--data-dir")
        .arg(&data_dir)
        .args(["cache", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cachedContents/abc123"));
}

#[test]
fn test_setup_cache_missing_directory_fails() {
    let temp_dir = TempDir::new().unwrap();
    glosa(&temp_dir)
        .args(["setup-cache", "does-not-exist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Directory not found"));
}

#[test]
fn test_setup_cache_empty_directory_fails() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::create_dir_all(temp_dir.path().join("sources")).unwrap();

    glosa(&temp_dir)
        .args(["setup-cache", "sources"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No files found"));
}

#[test]
fn test_setup_cache_without_api_key_fails_and_records_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let sources = temp_dir.path().join("sources");
    std::fs::create_dir_all(&sources).unwrap();
    std::fs::write(sources.join("rules.pdf"), b"%PDF-1.4").unwrap();

    glosa(&temp_dir)
        .args(["setup-cache", "sources"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("GEMINI_API_KEY"));

    assert!(!temp_dir.path().join("data/cache.json").exists());
}

#[test]
fn test_setup_rules_missing_manifest_fails() {
    let temp_dir = TempDir::new().unwrap();
    glosa(&temp_dir)
        .args(["setup-rules", "--manifest", "missing.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing.json"));
}

#[test]
fn test_setup_rules_invalid_manifest_fails() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("rules.json"), "{ not json").unwrap();

    glosa(&temp_dir)
        .args(["setup-rules", "--manifest", "rules.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid rules manifest"));
}

#[test]
fn test_ask_missing_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    glosa(&temp_dir)
        .args(["ask", "What is the total?", "--file", "nope.pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("File not found"));
}

#[test]
fn test_ask_without_api_key_fails() {
    let temp_dir = TempDir::new().unwrap();
    glosa(&temp_dir)
        .args(["ask", "What is the total?"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("GEMINI_API_KEY"));
}
