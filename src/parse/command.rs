use crate::errors::ParseError;
use crate::types::{DbCommand, Value};

use super::normalize::normalize;
use super::scanner::{ident_end, is_quoted, match_bracket, skip_ws, split_top_level_args, unquote};
use super::signatures::{command_signature, supported_commands};

const PREFIX_LEN: usize = "db.".len();

/// Parse `db.<command>(…)`. The caller has already checked the `db.` prefix.
pub(super) fn parse_command(query: &str) -> Result<DbCommand, ParseError> {
    let bytes = query.as_bytes();
    let name_end = ident_end(bytes, PREFIX_LEN);
    let name = &query[PREFIX_LEN..name_end];
    let signature = command_signature(name).ok_or_else(|| {
        ParseError::at(
            format!("Unsupported database command: {name}. Supported: {}", supported_commands()),
            PREFIX_LEN,
        )
    })?;
    let open = skip_ws(bytes, name_end);
    let close = match_bracket(query, open).ok_or_else(|| ParseError::at("Unmatched parenthesis", open))?;
    let tail = skip_ws(bytes, close + 1);
    if tail < bytes.len() {
        return Err(ParseError::at(format!("Unexpected text after call: {}", &query[tail..]), tail));
    }
    let args = split_top_level_args(&query[open + 1..close])
        .iter()
        .map(|raw| coerce_arg(raw))
        .collect::<Result<Vec<_>, _>>()?;
    signature.validate(&args)?;
    Ok(DbCommand { command: name.to_string(), args })
}

/// Classify one raw argument: string literal, object/array, number, boolean, null, bare token.
fn coerce_arg(raw: &str) -> Result<Value, ParseError> {
    if is_quoted(raw) {
        return Ok(Value::String(unquote(raw)));
    }
    if raw.starts_with('{') || raw.starts_with('[') {
        return normalize(raw);
    }
    if let Some(n) = parse_number(raw) {
        return Ok(n);
    }
    Ok(match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        other => Value::String(other.to_string()),
    })
}

pub(super) fn parse_number(raw: &str) -> Option<Value> {
    if let Ok(i) = raw.parse::<i64>() {
        return Some(Value::from(i));
    }
    raw.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
}
