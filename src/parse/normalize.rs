//! Relaxed object-literal notation to strict JSON.
//!
//! Regex literals are rewritten first so later passes only ever see their bodies inside
//! JSON strings. The second pass is a single quote-aware scan that quotes bare keys
//! (including `$` operators), turns single-quoted strings into double-quoted ones, drops
//! trailing commas and expands the `ObjectId(…)` / `ISODate(…)` / `new Date(…)` helpers.

use crate::errors::ParseError;
use crate::types::Value;

use super::scanner::{
    ident_end, is_ident_start, is_quoted, json_quote, match_bracket, rewrite_regex_literals,
    skip_ws, string_end, unquote,
};

/// Decode one notation-dialect value.
///
/// # Errors
/// Returns `Invalid object syntax: <text>` when the strict form is not valid JSON.
pub fn normalize(text: &str) -> Result<Value, ParseError> {
    let rewritten = rewrite_regex_literals(text);
    let strict = to_strict_json(&rewritten);
    serde_json::from_str(&strict).map_err(|e| {
        log::debug!("notation decode failed: {e}; strict form: {strict}");
        ParseError::new(format!("Invalid object syntax: {text}"))
    })
}

/// Key quoting, quote conversion, trailing-comma removal and helper expansion.
#[must_use]
pub fn to_strict_json(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len() + 16);
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                let end = string_end(bytes, i);
                out.push_str(&text[i..end]);
                i = end;
            }
            b'\'' => {
                let end = string_end(bytes, i);
                requote_single(&text[i..end], &mut out);
                i = end;
            }
            b',' => {
                let next = skip_ws(bytes, i + 1);
                if !matches!(bytes.get(next), Some(b'}' | b']')) {
                    out.push(',');
                }
                i += 1;
            }
            b if is_ident_start(b) => i = rewrite_ident(text, i, &mut out),
            _ => match text[i..].chars().next() {
                Some(ch) => {
                    out.push(ch);
                    i += ch.len_utf8();
                }
                None => break,
            },
        }
    }
    out
}

fn in_key_position(out: &str) -> bool {
    out.trim_end().ends_with(['{', ','])
}

fn rewrite_ident(text: &str, start: usize, out: &mut String) -> usize {
    let bytes = text.as_bytes();
    let end = ident_end(bytes, start);
    let ident = &text[start..end];
    if bytes.get(skip_ws(bytes, end)) == Some(&b':') && in_key_position(out) {
        out.push('"');
        out.push_str(ident);
        out.push('"');
        return end;
    }
    if let Some(next) = rewrite_helper(text, ident, end, out) {
        return next;
    }
    out.push_str(ident);
    end
}

/// Expand shell helpers into extended-JSON wrappers. Returns the offset after the call.
fn rewrite_helper(text: &str, ident: &str, after_ident: usize, out: &mut String) -> Option<usize> {
    let bytes = text.as_bytes();
    let (helper, name_end) = if ident == "new" {
        let next = skip_ws(bytes, after_ident);
        let end = ident_end(bytes, next);
        (&text[next..end], end)
    } else {
        (ident, after_ident)
    };
    let wrapper = match helper {
        "ObjectId" => "$oid",
        "ISODate" | "Date" => "$date",
        _ => return None,
    };
    let open = skip_ws(bytes, name_end);
    if bytes.get(open) != Some(&b'(') {
        return None;
    }
    let close = match_bracket(text, open)?;
    let arg = text[open + 1..close].trim();
    let value = if arg.is_empty() {
        fresh_helper_value(wrapper)
    } else if is_quoted(arg) {
        json_quote(&unquote(arg))
    } else if arg.parse::<f64>().is_ok_and(f64::is_finite) {
        arg.to_string()
    } else {
        return None;
    };
    out.push_str(&format!("{{\"{wrapper}\": {value}}}"));
    Some(close + 1)
}

fn fresh_helper_value(wrapper: &str) -> String {
    if wrapper == "$oid" {
        json_quote(&bson::oid::ObjectId::new().to_hex())
    } else {
        json_quote(&chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
    }
}

/// Copy a single-quoted literal (quotes included) as a double-quoted one.
fn requote_single(literal: &str, out: &mut String) {
    out.push('"');
    let mut chars = literal[1..].chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('\'') => out.push('\''),
                Some(n) if matches!(n, '"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' | 'u') => {
                    out.push('\\');
                    out.push(n);
                }
                Some(n) => out.push(n),
                None => out.push('\\'),
            },
            '\'' => {
                out.push('"');
                return;
            }
            '"' => out.push_str("\\\""),
            c => out.push(c),
        }
    }
}
