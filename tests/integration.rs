use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn docsync_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("docsync");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let docs_dir = root.join("repo/docs");
    fs::create_dir_all(docs_dir.join("guides")).unwrap();
    fs::write(
        docs_dir.join("alpha.md"),
        "---\ntitle: Alpha Guide\n---\n# Alpha\n\nThis is the alpha document about Rust programming.\n\nIt covers cargo and crates.",
    )
    .unwrap();
    fs::write(
        docs_dir.join("guides/beta.md"),
        "---\ntitle: Beta\nparent: Guides\n---\nThis document discusses Python and machine learning.",
    )
    .unwrap();
    fs::write(
        docs_dir.join("notes.txt"),
        "Plain text is not indexed by default.",
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/docsync.sqlite"

[server]
bind = "127.0.0.1:7340"

[sites.kb]
root = "docs"
path_prefix = "/kb/"

[sites.kb.local]
path = "{root}/repo"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("docsync.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_docsync(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = docsync_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docsync binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn docs_dir(config_path: &Path) -> PathBuf {
    config_path.parent().unwrap().parent().unwrap().join("repo/docs")
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_docsync(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_docsync(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_docsync(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_init_reset_clears_documents() {
    let (_tmp, config_path) = setup_test_env();

    run_docsync(&config_path, &["init"]);
    run_docsync(&config_path, &["sync", "kb"]);

    let (stdout, _, success) = run_docsync(&config_path, &["init", "--reset"]);
    assert!(success);
    assert!(stdout.contains("reset"));

    let (stdout, _, _) = run_docsync(&config_path, &["search", "*"]);
    assert!(stdout.contains("No results"), "got: {}", stdout);
}

#[test]
fn test_sites_lists_configured_sites() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_docsync(&config_path, &["sites"]);
    assert!(success);
    assert!(stdout.contains("kb"));
    assert!(stdout.contains("local"));
}

#[test]
fn test_sync_uploads_markdown_only() {
    let (_tmp, config_path) = setup_test_env();

    run_docsync(&config_path, &["init"]);
    let (stdout, stderr, success) = run_docsync(&config_path, &["sync", "kb"]);
    assert!(success, "sync failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("source items: 3"), "got: {}", stdout);
    assert!(stdout.contains("skipped: 1"), "got: {}", stdout);
    assert!(stdout.contains("uploads: 2  merges: 0  deletes: 0"), "got: {}", stdout);
    assert!(stdout.contains("applied actions: 2"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_sync_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    run_docsync(&config_path, &["init"]);
    run_docsync(&config_path, &["sync", "kb"]);

    let (stdout, _, success) = run_docsync(&config_path, &["sync", "kb"]);
    assert!(success);
    assert!(stdout.contains("indexed: 2"), "got: {}", stdout);
    assert!(stdout.contains("applied actions: 0"), "got: {}", stdout);
}

#[test]
fn test_sync_rename_edit_and_delete() {
    let (_tmp, config_path) = setup_test_env();
    let docs = docs_dir(&config_path);

    run_docsync(&config_path, &["init"]);
    run_docsync(&config_path, &["sync", "kb"]);

    // Rename: path-only merge.
    fs::rename(docs.join("alpha.md"), docs.join("guides/alpha.md")).unwrap();
    let (stdout, _, success) = run_docsync(&config_path, &["sync", "kb"]);
    assert!(success);
    assert!(stdout.contains("uploads: 0  merges: 1  deletes: 0"), "got: {}", stdout);

    let (stdout, _, _) = run_docsync(&config_path, &["search", "Rust"]);
    assert!(stdout.contains("path: /kb/guides/alpha"), "got: {}", stdout);

    // Edit: stale document replaced.
    fs::write(docs.join("guides/beta.md"), "Rewritten about Haskell.").unwrap();
    let (stdout, _, success) = run_docsync(&config_path, &["sync", "kb"]);
    assert!(success);
    assert!(stdout.contains("uploads: 1  merges: 0  deletes: 1"), "got: {}", stdout);

    let (stdout, _, _) = run_docsync(&config_path, &["search", "Python"]);
    assert!(stdout.contains("No results"), "stale text still indexed: {}", stdout);

    // Removal: orphan deleted.
    fs::remove_file(docs.join("guides/beta.md")).unwrap();
    let (stdout, _, success) = run_docsync(&config_path, &["sync", "kb"]);
    assert!(success);
    assert!(stdout.contains("orphaned: 1"), "got: {}", stdout);
    assert!(stdout.contains("uploads: 0  merges: 0  deletes: 1"), "got: {}", stdout);
}

#[test]
fn test_sync_force_rebuilds() {
    let (_tmp, config_path) = setup_test_env();

    run_docsync(&config_path, &["init"]);
    run_docsync(&config_path, &["sync", "kb"]);

    let (stdout, _, success) = run_docsync(&config_path, &["sync", "kb", "--force"]);
    assert!(success);
    assert!(stdout.contains("force deleted: 2"), "got: {}", stdout);
    assert!(stdout.contains("uploads: 2  merges: 0  deletes: 0"), "got: {}", stdout);
}

#[test]
fn test_sync_dry_run_writes_nothing() {
    let (_tmp, config_path) = setup_test_env();

    run_docsync(&config_path, &["init"]);
    let (stdout, _, success) = run_docsync(&config_path, &["sync", "kb", "--dry-run"]);
    assert!(success);
    assert!(stdout.contains("dry-run"));
    assert!(stdout.contains("planned actions: 2"), "got: {}", stdout);

    let (stdout, _, _) = run_docsync(&config_path, &["search", "*"]);
    assert!(stdout.contains("No results"));
}

#[test]
fn test_sync_all() {
    let (_tmp, config_path) = setup_test_env();

    run_docsync(&config_path, &["init"]);
    let (stdout, _, success) = run_docsync(&config_path, &["sync", "all"]);
    assert!(success);
    assert!(stdout.contains("sync kb"));
}

#[test]
fn test_unknown_site_fails() {
    let (_tmp, config_path) = setup_test_env();

    run_docsync(&config_path, &["init"]);
    let (_, stderr, success) = run_docsync(&config_path, &["sync", "nope"]);
    assert!(!success);
    assert!(stderr.contains("unknown site"), "got: {}", stderr);
}

#[test]
fn test_search_uses_front_matter_titles() {
    let (_tmp, config_path) = setup_test_env();

    run_docsync(&config_path, &["init"]);
    run_docsync(&config_path, &["sync", "kb"]);

    let (stdout, _, success) = run_docsync(&config_path, &["search", "Rust programming"]);
    assert!(success, "search failed");
    assert!(stdout.contains("kb / Alpha Guide"), "got: {}", stdout);
    assert!(stdout.contains("path: /kb/alpha"), "got: {}", stdout);

    let (stdout, _, _) = run_docsync(&config_path, &["search", "machine learning"]);
    assert!(stdout.contains("Guides/Beta"), "got: {}", stdout);
}

#[test]
fn test_search_match_all_ordered_by_title() {
    let (_tmp, config_path) = setup_test_env();

    run_docsync(&config_path, &["init"]);
    run_docsync(&config_path, &["sync", "kb"]);

    let (stdout, _, success) = run_docsync(&config_path, &["search", "*", "--order", "title"]);
    assert!(success);
    let alpha = stdout.find("Alpha Guide").expect("alpha missing");
    let beta = stdout.find("Guides/Beta").expect("beta missing");
    assert!(alpha < beta, "got: {}", stdout);
}

#[test]
fn test_search_deterministic() {
    let (_tmp, config_path) = setup_test_env();

    run_docsync(&config_path, &["init"]);
    run_docsync(&config_path, &["sync", "kb"]);

    let (stdout1, _, _) = run_docsync(&config_path, &["search", "document"]);
    let (stdout2, _, _) = run_docsync(&config_path, &["search", "document"]);
    assert_eq!(stdout1, stdout2, "Search results should be deterministic across runs");
}

#[test]
fn test_search_no_results() {
    let (_tmp, config_path) = setup_test_env();

    run_docsync(&config_path, &["init"]);
    run_docsync(&config_path, &["sync", "kb"]);

    let (stdout, _, success) = run_docsync(&config_path, &["search", "xyznonexistent"]);
    assert!(success);
    assert!(stdout.contains("No results"));
}

#[test]
fn test_search_unknown_site_errors() {
    let (_tmp, config_path) = setup_test_env();

    run_docsync(&config_path, &["init"]);
    let (_, stderr, success) = run_docsync(&config_path, &["search", "rust", "--site", "other"]);
    assert!(!success);
    assert!(stderr.contains("unknown site"), "got: {}", stderr);
}

#[test]
fn test_search_unknown_order_errors() {
    let (_tmp, config_path) = setup_test_env();

    run_docsync(&config_path, &["init"]);
    let (_, stderr, success) = run_docsync(&config_path, &["search", "rust", "--order", "date"]);
    assert!(!success);
    assert!(stderr.contains("unknown order"), "got: {}", stderr);
}
