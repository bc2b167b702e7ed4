use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn umcp_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("umcp");
    path
}

fn write_record(root: &Path, rel: &str, body: &str) {
    let path = root.join("data").join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    write_record(
        &root,
        "servers/official/github.json",
        r#"{
  "id": "github",
  "name": "GitHub",
  "provider": "GitHub",
  "description": "Manage repositories, issues and pull requests",
  "classification": "official",
  "url": "https://www.pulsemcp.com/servers/github",
  "source_url": "https://github.com/github/github-mcp-server",
  "categories": ["api", "git"],
  "quality_score": 92,
  "language": "Go",
  "metadata": {"github_stars": 15000, "complete_enriched_at": "2026-10-01T12:00:00"}
}"#,
    );
    write_record(
        &root,
        "servers/reference/postgres.json",
        r#"{
  "id": "postgres",
  "name": "PostgreSQL",
  "provider": "Anthropic",
  "description": "Read-only database access with schema inspection",
  "classification": "reference",
  "url": "https://www.pulsemcp.com/servers/postgres",
  "categories": ["database"],
  "weekly_metric": {"type": "downloads", "value": "12.1k"}
}"#,
    );
    write_record(
        &root,
        "servers/community/obsidian-notes.json",
        r#"{
  "id": "obsidian-notes",
  "name": "Obsidian Notes",
  "provider": "Jane Doe",
  "description": "Search an Obsidian vault",
  "classification": "community",
  "url": "https://www.pulsemcp.com/servers/obsidian-notes",
  "tags": ["notes"]
}"#,
    );
    write_record(
        &root,
        "clients/claude-desktop.json",
        r#"{"id": "claude-desktop", "name": "Claude Desktop", "description": "Desktop client", "url": "https://www.pulsemcp.com/clients/claude-desktop"}"#,
    );
    write_record(
        &root,
        "use-cases/issue-triage.json",
        r#"{"id": "issue-triage", "title": "Issue triage", "description": "Label incoming issues", "url": "https://www.pulsemcp.com/use-cases/issue-triage"}"#,
    );

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_content = format!(
        r#"[data]
dir = "{root}/data"
index_dir = "{root}/indexes"
checkpoint_dir = "{root}/data/.checkpoints"

[server]
bind = "127.0.0.1:7332"
web_root = "{root}/web"
"#,
        root = root.display()
    );
    let config_path = config_dir.join("umcp.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_umcp(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = umcp_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run umcp binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_validate_clean_data() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_umcp(&config_path, &["validate"]);
    assert!(success, "validate failed: {}", stderr);
    assert!(stdout.contains("Total files: 5"), "stdout: {}", stdout);
    assert!(stdout.contains("invalid: 0"));
}

#[test]
fn test_validate_reports_broken_files() {
    let (tmp, config_path) = setup_test_env();
    write_record(tmp.path(), "servers/community/broken.json", "{ not json");
    write_record(
        tmp.path(),
        "clients/mismatch.json",
        r#"{"id": "other", "name": "Mismatch"}"#,
    );

    let (stdout, stderr, success) = run_umcp(&config_path, &["validate"]);
    assert!(!success, "validate should fail on broken files");
    assert!(stdout.contains("broken.json"));
    assert!(stdout.contains("does not match file name"));
    assert!(stderr.contains("2 file(s) failed validation"), "stderr: {}", stderr);
}

#[test]
fn test_index_writes_files() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_umcp(&config_path, &["index"]);
    assert!(success, "index failed: {}", stderr);
    assert!(stdout.contains("Loaded 3 servers, 1 clients, 1 use cases"));

    let indexes = tmp.path().join("indexes");
    let stats: Value =
        serde_json::from_str(&fs::read_to_string(indexes.join("statistics.json")).unwrap()).unwrap();
    assert_eq!(stats["totals"]["servers"], 3);
    assert_eq!(stats["servers"]["by_classification"]["official"], 1);
    assert!(stats["servers"]["top_providers"].is_object());

    let by_category: Value = serde_json::from_str(
        &fs::read_to_string(indexes.join("servers-by-category.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(by_category["categories"]["git"][0]["id"], "github");
}

#[test]
fn test_search_requires_index() {
    let (_tmp, config_path) = setup_test_env();

    let (_stdout, stderr, success) = run_umcp(&config_path, &["search", "github"]);
    assert!(!success);
    assert!(stderr.contains("umcp index"), "stderr: {}", stderr);
}

#[test]
fn test_search_json_after_index() {
    let (_tmp, config_path) = setup_test_env();
    let (_, stderr, success) = run_umcp(&config_path, &["index"]);
    assert!(success, "index failed: {}", stderr);

    let (stdout, stderr, success) = run_umcp(&config_path, &["search", "anthropic", "--json"]);
    assert!(success, "search failed: {}", stderr);
    let results: Vec<Value> = serde_json::from_str(&stdout).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["id"], "postgres");

    let (stdout, _, success) = run_umcp(
        &config_path,
        &["search", "--classification", "community", "--json"],
    );
    assert!(success);
    let results: Vec<Value> = serde_json::from_str(&stdout).unwrap();
    assert_eq!(results[0]["id"], "obsidian-notes");
}

#[test]
fn test_search_deterministic() {
    let (_tmp, config_path) = setup_test_env();
    run_umcp(&config_path, &["index"]);

    let (first, _, _) = run_umcp(&config_path, &["search", "a", "--limit", "2"]);
    let (second, _, _) = run_umcp(&config_path, &["search", "a", "--limit", "2"]);
    assert_eq!(first, second);
    assert!(first.contains("showing first 2"), "stdout: {}", first);
}

#[test]
fn test_search_empty_query() {
    let (_tmp, config_path) = setup_test_env();
    run_umcp(&config_path, &["index"]);

    let (_stdout, _stderr, success) = run_umcp(&config_path, &["search"]);
    assert!(!success, "search with no keyword or filter should fail");
}

#[test]
fn test_search_no_results() {
    let (_tmp, config_path) = setup_test_env();
    run_umcp(&config_path, &["index"]);

    let (stdout, _, success) = run_umcp(&config_path, &["search", "kubernetes"]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_stats_coverage() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_umcp(&config_path, &["stats"]);
    assert!(success, "stats failed: {}", stderr);
    assert!(stdout.contains("Servers:     3"));
    assert!(stdout.contains("Coverage:"));
    assert!(stdout.contains("Quality scores: avg 92.0, min 92, max 92"));

    let (stdout, _, success) = run_umcp(&config_path, &["stats", "--classification", "reference"]);
    assert!(success);
    assert!(stdout.contains("Servers:     1"));
}

#[test]
fn test_unknown_scrape_kind() {
    let (_tmp, config_path) = setup_test_env();

    let (_stdout, stderr, success) = run_umcp(&config_path, &["scrape", "plugins"]);
    assert!(!success);
    assert!(stderr.contains("unknown record kind"));
}

#[test]
fn test_explicit_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.toml");

    let (_stdout, stderr, success) = run_umcp(&missing, &["index"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}
