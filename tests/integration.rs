use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn ptx_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("ptx");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();

    fs::write(
        files_dir.join("ticket.txt"),
        "Contact me at test@example.com, urgent request!",
    )
    .unwrap();
    fs::write(
        files_dir.join("long.txt"),
        "The server had an issue with the database. We need an immediate fix. \
         Please submit the software logs asap, the network team is not happy.",
    )
    .unwrap();
    fs::write(files_dir.join("blank.txt"), "   \n\t  ").unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/ptx.sqlite"

[chunking]
size = 60

[search]
default_limit = 5

[server]
bind = "127.0.0.1:7341"
"#,
        root.display()
    );

    let config_path = config_dir.join("ptx.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_ptx(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = ptx_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run ptx binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn files(config_path: &Path, name: &str) -> String {
    config_path
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("files")
        .join(name)
        .to_str()
        .unwrap()
        .to_string()
}

fn upload(config_path: &Path, name: &str) -> serde_json::Value {
    let path = files(config_path, name);
    let (stdout, stderr, success) = run_ptx(config_path, &["upload", &path]);
    assert!(success, "upload failed: stdout={}, stderr={}", stdout, stderr);
    serde_json::from_str(&stdout).expect("upload prints JSON")
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_ptx(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_ptx(&config_path, &["init"]);
    assert!(success1, "First init failed");
    let (_, _, success2) = run_ptx(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_upload_chunks_by_configured_size() {
    let (_tmp, config_path) = setup_test_env();
    run_ptx(&config_path, &["init"]);

    let receipt = upload(&config_path, "long.txt");
    let file_id = receipt["file_id"].as_str().unwrap();
    let total = receipt["total_chunks"].as_u64().unwrap();
    assert!(total >= 3, "expected several 60-char chunks, got {}", total);
    assert_eq!(
        receipt["chunk_ids"][0].as_str().unwrap(),
        format!("{}_chunk_1", file_id)
    );
}

#[test]
fn test_blank_upload_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_ptx(&config_path, &["init"]);

    let path = files(&config_path, "blank.txt");
    let (_, stderr, success) = run_ptx(&config_path, &["upload", &path]);
    assert!(!success);
    assert!(stderr.contains("could not extract text"), "stderr={}", stderr);
}

#[test]
fn test_analyze_scores_chunk() {
    let (_tmp, config_path) = setup_test_env();
    run_ptx(&config_path, &["init"]);

    let receipt = upload(&config_path, "ticket.txt");
    let chunk_id = receipt["chunk_ids"][0].as_str().unwrap();

    let (stdout, stderr, success) = run_ptx(&config_path, &["analyze", chunk_id]);
    assert!(success, "analyze failed: {}", stderr);
    let record: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(record["score"], 15);
    assert_eq!(record["matches"]["email"][0], "test@example.com");
    assert_eq!(record["patterns"].as_array().unwrap().len(), 3);

    let (stdout, _, success) = run_ptx(&config_path, &["get", chunk_id]);
    assert!(success);
    assert!(stdout.contains("score:        15"));
}

#[test]
fn test_analyze_unknown_chunk_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_ptx(&config_path, &["init"]);

    let (_, stderr, success) = run_ptx(&config_path, &["analyze", "missing_chunk_1"]);
    assert!(!success);
    assert!(stderr.contains("not found"));
}

#[test]
fn test_get_unanalyzed_chunk() {
    let (_tmp, config_path) = setup_test_env();
    run_ptx(&config_path, &["init"]);

    let receipt = upload(&config_path, "ticket.txt");
    let chunk_id = receipt["chunk_ids"][0].as_str().unwrap();
    let (stdout, _, success) = run_ptx(&config_path, &["get", chunk_id]);
    assert!(success);
    assert!(stdout.contains("urgent request"));
    assert!(stdout.contains("(not analyzed)"));
}

#[test]
fn test_search_finds_phrase() {
    let (_tmp, config_path) = setup_test_env();
    run_ptx(&config_path, &["init"]);

    let receipt = upload(&config_path, "ticket.txt");
    upload(&config_path, "long.txt");
    let chunk_id = receipt["chunk_ids"][0].as_str().unwrap();

    let (stdout, stderr, success) = run_ptx(&config_path, &["search", "URGENT request"]);
    assert!(success, "search failed: {}", stderr);
    assert!(stdout.contains(chunk_id));
    assert!(stdout.contains("[1.00]"));

    let (stdout, _, success) = run_ptx(&config_path, &["search", "kubernetes"]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_search_empty_query_rejected() {
    let (_tmp, config_path) = setup_test_env();
    run_ptx(&config_path, &["init"]);

    let (_, stderr, success) = run_ptx(&config_path, &["search", "   "]);
    assert!(!success);
    assert!(stderr.contains("query must not be empty"));
}

#[test]
fn test_analyze_file_then_export() {
    let (tmp, config_path) = setup_test_env();
    run_ptx(&config_path, &["init"]);

    let receipt = upload(&config_path, "long.txt");
    let file_id = receipt["file_id"].as_str().unwrap();
    let total = receipt["total_chunks"].as_u64().unwrap();

    let (stdout, stderr, success) = run_ptx(&config_path, &["analyze-file", file_id]);
    assert!(success, "analyze-file failed: {}", stderr);
    let summary: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(summary["analyzed"].as_u64().unwrap(), total);

    let out = tmp.path().join("out").join("export.csv");
    let (_, stderr, success) = run_ptx(
        &config_path,
        &["export", file_id, "--output", out.to_str().unwrap()],
    );
    assert!(success, "export failed: {}", stderr);

    let csv = fs::read_to_string(&out).unwrap();
    assert!(csv.starts_with("chunk_id,text,score,matches,patterns\n"));
    let mut reader = csv::Reader::from_reader(csv.as_bytes());
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len() as u64, total);
    assert_eq!(&rows[0][0], format!("{}_chunk_1", file_id).as_str());
    let score_sum: i64 = rows.iter().map(|r| r[2].parse::<i64>().unwrap()).sum();
    assert_eq!(score_sum, summary["total_score"].as_i64().unwrap());
}

#[test]
fn test_export_unknown_file_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_ptx(&config_path, &["init"]);

    let (_, stderr, success) = run_ptx(&config_path, &["export", "no-such-file"]);
    assert!(!success);
    assert!(stderr.contains("no chunks"));
}

#[test]
fn test_rules_lists_builtin_table() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_ptx(&config_path, &["rules"]);
    assert!(success);
    assert!(stdout.starts_with("rule_set_version: "));
    assert_eq!(stdout.lines().count(), 12);
    assert!(stdout.contains("email"));
    assert!(stdout.contains("negative"));
}

#[test]
fn test_email_requires_mail_config() {
    let (_tmp, config_path) = setup_test_env();
    run_ptx(&config_path, &["init"]);

    let receipt = upload(&config_path, "ticket.txt");
    let file_id = receipt["file_id"].as_str().unwrap();
    let (_, stderr, success) = run_ptx(&config_path, &["email", file_id, "ops@example.com"]);
    assert!(!success);
    assert!(stderr.contains("[mail]"));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_ptx(&tmp.path().join("nope.toml"), &["init"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}
