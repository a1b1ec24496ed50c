use docshell::{ParsedQuery, parse};
use serde_json::json;

#[test]
fn stats_with_scale() {
    let parsed = parse("db.stats({ scale: 1024 })").unwrap();
    let cmd = parsed.as_command().unwrap();
    assert_eq!(cmd.command, "stats");
    assert_eq!(cmd.args, vec![json!({"scale": 1024})]);
}

#[test]
fn no_argument_commands() {
    for name in ["getCollectionNames", "dropDatabase", "buildInfo", "hostInfo", "version", "getName"] {
        let parsed = parse(&format!("db.{name}()")).unwrap();
        assert!(matches!(&parsed, ParsedQuery::Command(c) if c.command == name && c.args.is_empty()));
    }
}

#[test]
fn argument_coercion_order() {
    let cmd = parse("db.createCollection('events', {capped: true, size: 1e6})").unwrap();
    let cmd = cmd.as_command().unwrap();
    assert_eq!(cmd.args[0], json!("events"));
    assert_eq!(cmd.args[1]["capped"], json!(true));
}

#[test]
fn arity_bounds() {
    assert!(parse("db.createCollection()").unwrap_err().message.contains("requires at least 1 argument"));
    assert!(parse(r#"db.dropCollection("a","b")"#).unwrap_err().message.contains("accepts at most 1 argument"));
}

#[test]
fn positional_kinds_are_checked() {
    let err = parse("db.dropCollection({name: 'x'})").unwrap_err();
    assert_eq!(err.message, "dropCollection argument 1 must be a string");
}

#[test]
fn unknown_command() {
    let err = parse("db.fsyncLock()").unwrap_err();
    assert!(err.message.contains("Unsupported database command"));
    assert!(err.message.contains("runCommand"));
}

#[test]
fn run_command_document() {
    let parsed = parse("db.runCommand({ping: 1})").unwrap();
    assert_eq!(serde_json::to_value(parsed).unwrap(), json!({"command": "runCommand", "args": [{"ping": 1}]}));
}
