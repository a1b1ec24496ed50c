use docshell::parse::{match_bracket, normalize, rewrite_regex_literals, split_top_level_args};
use serde_json::json;

#[test]
fn regex_literal_with_and_without_flags() {
    assert_eq!(normalize("{f: /pat/im}").unwrap(), json!({"f": {"$regex": "pat", "$options": "im"}}));
    let v = normalize("{f: /pat/}").unwrap();
    assert!(v["f"].get("$options").is_none());
}

#[test]
fn regex_inside_string_is_plain() {
    assert_eq!(normalize(r#"{f: "/not-a-regex/"}"#).unwrap(), json!({"f": "/not-a-regex/"}));
    assert_eq!(rewrite_regex_literals("a / b"), "a / b");
}

#[test]
fn regex_in_array_position() {
    assert_eq!(normalize("{tags: {$in: [/^a/, /b$/]}}").unwrap(), json!({"tags": {"$in": [{"$regex": "^a"}, {"$regex": "b$"}]}}));
}

#[test]
fn brackets_skip_quoted_closers() {
    let text = "find({a: ')'}, [1])";
    assert_eq!(match_bracket(text, 4), Some(text.len() - 1));
    assert_eq!(match_bracket("({a: 1}", 0), None);
}

#[test]
fn top_level_split() {
    assert_eq!(split_top_level_args("{a: 1, b: [1, 2]}, 'x,y', 3"), vec!["{a: 1, b: [1, 2]}", "'x,y'", "3"]);
}

#[test]
fn shell_helpers() {
    let v = normalize("{_id: ObjectId('64b7f0c2a1b2c3d4e5f60718'), at: ISODate('2024-01-01T00:00:00Z')}").unwrap();
    assert_eq!(v["_id"], json!({"$oid": "64b7f0c2a1b2c3d4e5f60718"}));
    assert_eq!(v["at"], json!({"$date": "2024-01-01T00:00:00Z"}));
}

#[test]
fn invalid_syntax_keeps_original_text() {
    assert_eq!(normalize("{a: }").unwrap_err().message, "Invalid object syntax: {a: }");
}
