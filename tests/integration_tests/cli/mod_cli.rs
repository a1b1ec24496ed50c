use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

// Isolate the child from any user-level docshell.toml.
fn docshell(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_docshell"))
        .args(args)
        .current_dir(cwd)
        .env("HOME", cwd)
        .env_remove("DOCSHELL_CONFIG")
        .env_remove("DOCSHELL_LOG_DIR")
        .env_remove("DOCSHELL_PAGE_SIZE")
        .output()
        .expect("spawn docshell")
}

#[test]
fn parse_prints_the_descriptor() {
    let dir = tempdir().unwrap();
    let out = docshell(dir.path(), &["--format", "json", "parse", "db.users.find({age: {$gt: 21}}).limit(5)"]);
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["collection"], "users");
    assert_eq!(v["operation"], "find");
    assert_eq!(v["filter"]["age"]["$gt"], 21);
    assert_eq!(v["limit"], 5);
}

#[test]
fn parse_failure_exits_nonzero() {
    let dir = tempdir().unwrap();
    let out = docshell(dir.path(), &["--format", "plain", "parse", "users.find()"]);
    assert!(!out.status.success());
    let text = String::from_utf8_lossy(&out.stdout);
    assert!(text.starts_with("parse error: Query must start with db."), "{text}");
}

#[test]
fn run_against_a_seed_file() {
    let dir = tempdir().unwrap();
    let seed = dir.path().join("people.json");
    let people: Vec<serde_json::Value> =
        (1..=30).map(|i| serde_json::json!({"_id": i, "name": format!("p{i}"), "age": 15 + i})).collect();
    std::fs::write(&seed, serde_json::to_string(&people).unwrap()).unwrap();
    let seed_arg = seed.to_string_lossy().to_string();

    let out = docshell(
        dir.path(),
        &["--format", "plain", "run", "db.people.find({age: {$gt: 21}})", "--seed", &seed_arg, "--page-size", "10"],
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stdout));
    assert_eq!(String::from_utf8_lossy(&out.stdout).lines().count(), 10);

    let out = docshell(
        dir.path(),
        &["--format", "json", "run", "db.people.countDocuments({age: {$gt: 21}})", "--seed", &seed_arg],
    );
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["documents"][0]["count"], 24);
}

#[test]
fn run_with_line_delimited_seed_and_explicit_collection() {
    let dir = tempdir().unwrap();
    let seed = dir.path().join("dump.jsonl");
    std::fs::write(&seed, "{\"sku\": \"a\"}\n{\"sku\": \"b\"}\n").unwrap();
    let out = docshell(
        dir.path(),
        &[
            "--format",
            "plain",
            "run",
            "db.getCollection('items').distinct('sku')",
            "--seed",
            &seed.to_string_lossy(),
            "--collection",
            "items",
        ],
    );
    assert!(out.status.success());
    let text = String::from_utf8_lossy(&out.stdout);
    assert!(text.contains("\"a\"") && text.contains("\"b\""), "{text}");
}

#[test]
fn invalid_page_size_is_reported() {
    let dir = tempdir().unwrap();
    let out = docshell(dir.path(), &["--format", "plain", "run", "db.x.find({})", "--page-size", "7"]);
    assert!(!out.status.success());
}

#[test]
fn config_file_supplies_the_page_size() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("custom.toml");
    std::fs::write(&cfg, "page_size = 25\n").unwrap();
    let seed = dir.path().join("n.json");
    let docs: Vec<serde_json::Value> = (0..40).map(|i| serde_json::json!({"i": i})).collect();
    std::fs::write(&seed, serde_json::to_string(&docs).unwrap()).unwrap();
    let out = docshell(
        dir.path(),
        &["--config", &cfg.to_string_lossy(), "--format", "json", "run", "db.n.find({})", "--seed", &seed.to_string_lossy()],
    );
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["documents"].as_array().unwrap().len(), 25);
    assert_eq!(v["hasMore"], true);
    assert_eq!(v["totalCount"], 40);
}

#[test]
fn missing_explicit_config_exits_with_usage_code() {
    let dir = tempdir().unwrap();
    let out = docshell(dir.path(), &["--config", "nope.toml", "parse", "db.x.find({})"]);
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn run_with_metrics_counts_the_query() {
    let dir = tempdir().unwrap();
    let out = docshell(dir.path(), &["run", "db.x.find({})", "--metrics"]);
    assert!(out.status.success());
    let text = String::from_utf8_lossy(&out.stdout);
    assert!(text.contains("docshell_queries_total 1\n"), "{text}");
    assert!(text.ends_with("# EOF\n"));
    assert!(!docshell(dir.path(), &["metrics"]).status.success());
}

#[test]
fn log_dir_flag_creates_log_files() {
    let dir = tempdir().unwrap();
    let logs = dir.path().join("logs");
    let out = docshell(
        dir.path(),
        &["--log-dir", &logs.to_string_lossy(), "--log-level", "debug", "--format", "plain", "run", "db.x.find({})"],
    );
    assert!(out.status.success());
    assert!(logs.join("app.log").exists());
    assert!(logs.join("metrics.log").exists());
}
