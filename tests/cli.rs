use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn repolens_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_repolens"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/repolens.sqlite"

[chunking]
chunk_size = 512
overlap_ratio = 0.25

[retrieval]
top_k = 3
"#,
        root.display()
    );

    let config_path = config_dir.join("repolens.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_repolens(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = repolens_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run repolens binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_repolens(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/repolens.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, first) = run_repolens(&config_path, &["init"]);
    assert!(first, "First init failed");
    let (_, _, second) = run_repolens(&config_path, &["init"]);
    assert!(second, "Second init failed (not idempotent)");
}

#[test]
fn test_status_of_unknown_repository_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_repolens(&config_path, &["init"]);

    let (_, stderr, success) = run_repolens(&config_path, &["status", "no-such-id"]);
    assert!(!success);
    assert!(stderr.contains("not found"), "stderr={}", stderr);
}

#[test]
fn test_analyze_rejects_invalid_url() {
    let (_tmp, config_path) = setup_test_env();
    run_repolens(&config_path, &["init"]);

    let (_, stderr, success) = run_repolens(
        &config_path,
        &["analyze", "https://gitlab.com/a/b", "--owner", "u1"],
    );
    assert!(!success);
    assert!(stderr.contains("Invalid GitHub repository URL"), "stderr={}", stderr);
}

#[test]
fn test_history_of_unknown_repository_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_repolens(&config_path, &["init"]);

    let (_, _, success) = run_repolens(&config_path, &["history", "missing"]);
    assert!(!success);
}

#[test]
fn test_invalid_config_is_rejected() {
    let (_tmp, config_path) = setup_test_env();
    fs::write(
        &config_path,
        "[db]\npath = \"./x.sqlite\"\n\n[chunking]\noverlap_ratio = 1.5\n",
    )
    .unwrap();

    let (_, stderr, success) = run_repolens(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("overlap_ratio"), "stderr={}", stderr);
}
