use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn kwic_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("kwic");
    path
}

const EXPORT_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<contexts>
    <item preceding="and he yaf" following="to moyses" location="8r" type="seg_item">the lawe</item>
    <item preceding="yaf the lawe" following="writen in" location="8r" type="seg_item">to moyses</item>
    <item preceding="" following="here bigynneth" location="9v" type="rubric_item">the prologe</item>
</contexts>
"#;

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();

    fs::write(root.join("export.xml"), EXPORT_XML).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/kwic.sqlite"

[review]
stale_after_minutes = 5
"#,
        root.display()
    );

    let config_path = config_dir.join("kwic.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_kwic(config_path: &Path, user: &str, args: &[&str]) -> (String, String, bool) {
    let binary = kwic_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("--user")
        .arg(user)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run kwic binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn import_batch(config_path: &Path, user: &str) -> String {
    let export = config_path
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("export.xml");
    let (stdout, stderr, ok) = run_kwic(config_path, user, &["import", export.to_str().unwrap()]);
    assert!(ok, "import failed: {}", stderr);

    // "Imported batch <id> (...)"
    stdout
        .split_whitespace()
        .nth(2)
        .expect("no batch id in import output")
        .to_string()
}

#[test]
fn init_is_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, ok) = run_kwic(&config_path, "local", &["init"]);
    assert!(ok, "init failed: {}", stderr);
    assert!(stdout.contains("initialized"));

    let (_, stderr, ok) = run_kwic(&config_path, "local", &["init"]);
    assert!(ok, "second init failed: {}", stderr);
}

#[test]
fn import_review_commit_round() {
    let (_tmp, config_path) = setup_test_env();
    run_kwic(&config_path, "local", &["init"]);

    let batch_id = import_batch(&config_path, "alice");

    let (stdout, stderr, ok) = run_kwic(&config_path, "alice", &["batches"]);
    assert!(ok, "batches failed: {}", stderr);
    assert!(stdout.contains(&batch_id));
    assert!(stdout.contains("3 contexts"));
    assert!(stdout.contains("unlocked"));

    // Empty inventory: everything is unmatched.
    let (stdout, stderr, ok) = run_kwic(&config_path, "alice", &["review", &batch_id]);
    assert!(ok, "review failed: {}", stderr);
    assert!(stdout.contains("No pairings proposed."));
    assert!(stdout.contains("Unmatched inbound contexts:"));
    assert!(stdout.contains("the lawe"));

    let (stdout, stderr, ok) = run_kwic(&config_path, "alice", &["commit", &batch_id]);
    assert!(ok, "commit failed: {}", stderr);
    assert!(stdout.contains("0 confirmed, 3 created, 0 discarded"));
    assert!(stdout.contains("Batch fully reviewed and removed."));

    let (stdout, _, ok) = run_kwic(&config_path, "alice", &["batches"]);
    assert!(ok);
    assert!(stdout.contains("No inbound batches."));
}

#[test]
fn reimport_matches_committed_inventory() {
    let (_tmp, config_path) = setup_test_env();
    run_kwic(&config_path, "local", &["init"]);

    // First round promotes everything.
    let first = import_batch(&config_path, "alice");
    run_kwic(&config_path, "alice", &["review", &first]);
    let (_, stderr, ok) = run_kwic(&config_path, "alice", &["commit", &first]);
    assert!(ok, "first commit failed: {}", stderr);

    let (stdout, stderr, ok) = run_kwic(&config_path, "alice", &["get", "the lawe"]);
    assert!(ok, "get failed: {}", stderr);
    assert!(stdout.contains("8r:1"));
    assert!(stdout.contains("1 context(s)."));

    // Second import of the same export aligns exactly.
    let second = import_batch(&config_path, "alice");
    let (stdout, stderr, ok) = run_kwic(&config_path, "alice", &["review", &second]);
    assert!(ok, "second review failed: {}", stderr);
    assert!(stdout.contains("Proposed pairings:"));
    assert!(stdout.contains("(distance 0)"));
    assert!(stdout.contains("All pairings share one distance."));
    assert!(!stdout.contains("Unmatched inbound contexts:"));

    let (stdout, stderr, ok) = run_kwic(&config_path, "alice", &["commit", &second]);
    assert!(ok, "second commit failed: {}", stderr);
    assert!(stdout.contains("3 confirmed, 0 created, 0 discarded"));
}

#[test]
fn group_bundles_committed_citations() {
    let (_tmp, config_path) = setup_test_env();
    run_kwic(&config_path, "local", &["init"]);

    let batch_id = import_batch(&config_path, "alice");
    let (_, stderr, ok) = run_kwic(&config_path, "alice", &["commit", &batch_id]);
    assert!(ok, "commit failed: {}", stderr);

    let (stdout, stderr, ok) = run_kwic(&config_path, "alice", &["group", "8r", "1", "2"]);
    assert!(ok, "group failed: {}", stderr);
    assert!(stdout.contains("Grouped 2 contexts at 8r"), "{}", stdout);
    assert!(stdout.contains("the lawe to moyses"), "{}", stdout);

    // The group is a committed context under its joined keyword.
    let (stdout, stderr, ok) = run_kwic(&config_path, "alice", &["get", "the lawe to moyses"]);
    assert!(ok, "get failed: {}", stderr);
    assert!(stdout.contains("8r:1"));
    assert!(stdout.contains("1 context(s)."));

    // Grouping an unknown citation number fails cleanly.
    let (_, stderr, ok) = run_kwic(&config_path, "alice", &["group", "8r", "9"]);
    assert!(!ok);
    assert!(stderr.contains("no committed context 8r:9"), "{}", stderr);
}

#[test]
fn review_lock_blocks_other_users() {
    let (_tmp, config_path) = setup_test_env();
    run_kwic(&config_path, "local", &["init"]);

    let batch_id = import_batch(&config_path, "alice");

    let (_, stderr, ok) = run_kwic(&config_path, "alice", &["review", &batch_id]);
    assert!(ok, "alice review failed: {}", stderr);

    let (_, stderr, ok) = run_kwic(&config_path, "bob", &["review", &batch_id]);
    assert!(!ok, "bob should not acquire alice's lock");
    assert!(stderr.contains("being reviewed by alice"), "{}", stderr);

    let (stdout, _, ok) = run_kwic(&config_path, "bob", &["batches"]);
    assert!(ok);
    assert!(stdout.contains("locked by alice"));

    let (_, stderr, ok) = run_kwic(&config_path, "alice", &["release", &batch_id]);
    assert!(ok, "release failed: {}", stderr);

    let (_, stderr, ok) = run_kwic(&config_path, "bob", &["review", &batch_id]);
    assert!(ok, "bob review after release failed: {}", stderr);
}

#[test]
fn discard_unmatched_drops_citations() {
    let (_tmp, config_path) = setup_test_env();
    run_kwic(&config_path, "local", &["init"]);

    let batch_id = import_batch(&config_path, "alice");
    let (stdout, stderr, ok) = run_kwic(
        &config_path,
        "alice",
        &["commit", &batch_id, "--discard-unmatched"],
    );
    assert!(ok, "commit failed: {}", stderr);
    assert!(stdout.contains("0 confirmed, 0 created, 3 discarded"));

    // Nothing was promoted, so a re-import still has no counterparts.
    let second = import_batch(&config_path, "alice");
    let (stdout, stderr, ok) = run_kwic(&config_path, "alice", &["review", &second]);
    assert!(ok, "review failed: {}", stderr);
    assert!(stdout.contains("No pairings proposed."));
}

#[test]
fn discard_removes_batch_without_committing() {
    let (_tmp, config_path) = setup_test_env();
    run_kwic(&config_path, "local", &["init"]);

    let batch_id = import_batch(&config_path, "alice");
    let (stdout, stderr, ok) = run_kwic(&config_path, "alice", &["discard", &batch_id]);
    assert!(ok, "discard failed: {}", stderr);
    assert!(stdout.contains("Discarded batch"));

    let (stdout, _, ok) = run_kwic(&config_path, "alice", &["batches"]);
    assert!(ok);
    assert!(stdout.contains("No inbound batches."));
}
