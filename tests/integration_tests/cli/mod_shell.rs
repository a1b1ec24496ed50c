use std::io::Write;
use std::process::{Command, Stdio};

fn shell(script: &str, extra: &[&str]) -> (bool, String) {
    let dir = tempfile::tempdir().unwrap();
    let mut child = Command::new(env!("CARGO_BIN_EXE_docshell"))
        .args(["--format", "plain"])
        .arg("shell")
        .args(extra)
        .current_dir(dir.path())
        .env("HOME", dir.path())
        .env_remove("DOCSHELL_CONFIG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("failed to spawn shell");
    {
        let mut stdin = child.stdin.take().unwrap();
        stdin.write_all(script.as_bytes()).unwrap();
    }
    let out = child.wait_with_output().expect("shell run");
    (out.status.success(), String::from_utf8_lossy(&out.stdout).into_owned())
}

#[test]
fn shell_keeps_state_between_lines() {
    let (ok, text) = shell(
        "db.notes.insertMany([{t: 'a'}, {t: 'b'}])\ndb.notes.countDocuments({})\nexit\ndb.notes.find({})\n",
        &[],
    );
    assert!(ok);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2, "{text}");
    assert!(lines[0].contains("\"insertedCount\":2"));
    assert_eq!(lines[1], "{\"count\":2}");
}

#[test]
fn shell_survives_errors() {
    let (ok, text) = shell("db.x.frobnicate()\ndb.x.insertOne({_id: 1})\ndb.x.insertOne({_id: 1})\nquit\n", &[]);
    assert!(ok);
    let lines: Vec<&str> = text.lines().collect();
    assert!(lines[0].starts_with("parse error:"));
    assert!(lines[2].starts_with("error[DuplicateKey]"));
}

#[test]
fn shell_pages_through_a_seed() {
    let dir = tempfile::tempdir().unwrap();
    let seed = dir.path().join("rows.json");
    let rows: Vec<serde_json::Value> = (0..12).map(|i| serde_json::json!({"_id": i})).collect();
    std::fs::write(&seed, serde_json::to_string(&rows).unwrap()).unwrap();
    let (ok, text) = shell("db.rows.find({})\nit\nit\n", &["--seed", &seed.to_string_lossy(), "--page-size", "10"]);
    assert!(ok);
    assert_eq!(text.lines().count(), 12 + 1, "{text}");
    assert_eq!(text.lines().last(), Some("no cursor"));
}
