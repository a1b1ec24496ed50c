//! Quote-aware scanning primitives shared by every parser stage.
//!
//! All scans walk the UTF-8 bytes of the input with an explicit index. Every structural
//! character is ASCII, so byte offsets returned here are always valid `str` slice bounds.

/// Flags accepted after a regex literal's closing slash.
const REGEX_FLAGS: &[u8] = b"imsxgu";

#[inline]
const fn is_opener(b: u8) -> bool {
    matches!(b, b'(' | b'[' | b'{')
}

#[inline]
const fn is_closer(b: u8) -> bool {
    matches!(b, b')' | b']' | b'}')
}

#[inline]
pub(crate) const fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$'
}

#[inline]
pub(crate) const fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// Offset just past the identifier that starts at `start` (equal to `start` if none does).
pub(crate) fn ident_end(bytes: &[u8], start: usize) -> usize {
    match bytes.get(start) {
        Some(&b) if is_ident_start(b) => {}
        _ => return start,
    }
    let mut i = start + 1;
    while i < bytes.len() && is_ident_continue(bytes[i]) {
        i += 1;
    }
    i
}

/// First offset at or after `from` that is not ASCII whitespace.
pub(crate) fn skip_ws(bytes: &[u8], from: usize) -> usize {
    let mut i = from;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// Offset just past the string literal opened at `start`, or `bytes.len()` if unterminated.
pub(crate) fn string_end(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Index of the bracket closing the one at `open`, skipping quoted strings.
///
/// Each closer must match the most recent unclosed opener. Returns `None` when `open` does
/// not hold an opening bracket, a closer of the wrong family appears, or the input ends first.
#[must_use]
pub fn match_bracket(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    if !bytes.get(open).is_some_and(|&b| is_opener(b)) {
        return None;
    }
    let mut expected: Vec<u8> = Vec::new();
    let mut i = open;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'"' || b == b'\'' {
            i = string_end(bytes, i);
            continue;
        }
        if let Some(closer) = closer_for(b) {
            expected.push(closer);
        } else if is_closer(b) {
            if expected.pop() != Some(b) {
                return None;
            }
            if expected.is_empty() {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

const fn closer_for(b: u8) -> Option<u8> {
    match b {
        b'(' => Some(b')'),
        b'[' => Some(b']'),
        b'{' => Some(b'}'),
        _ => None,
    }
}

/// Split on commas at nesting depth zero. Parts are trimmed; a whitespace-only trailing
/// remainder is dropped, interior empty parts are kept.
#[must_use]
pub fn split_top_level_args(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0i64;
    let mut start = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'"' || b == b'\'' {
            i = string_end(bytes, i);
            continue;
        }
        if is_opener(b) {
            depth += 1;
        } else if is_closer(b) {
            depth -= 1;
        } else if b == b',' && depth == 0 {
            parts.push(text[start..i].trim().to_string());
            start = i + 1;
        }
        i += 1;
    }
    let tail = text[start.min(text.len())..].trim();
    if !tail.is_empty() {
        parts.push(tail.to_string());
    }
    parts
}

/// A `/pattern/flags` token located in the source text.
struct RegexLiteral<'a> {
    pattern: &'a str,
    flags: &'a str,
    end: usize,
}

impl RegexLiteral<'_> {
    fn to_json(&self) -> String {
        if self.flags.is_empty() {
            format!("{{\"$regex\": {}}}", json_quote(self.pattern))
        } else {
            format!(
                "{{\"$regex\": {}, \"$options\": {}}}",
                json_quote(self.pattern),
                json_quote(self.flags)
            )
        }
    }
}

/// A slash may open a regex only after `:`, `,`, `[` or at the very start.
fn regex_allowed_at(bytes: &[u8], slash: usize) -> bool {
    let mut i = slash;
    while i > 0 {
        i -= 1;
        let b = bytes[i];
        if b.is_ascii_whitespace() {
            continue;
        }
        return matches!(b, b':' | b',' | b'[');
    }
    true
}

fn read_regex_literal(text: &str, slash: usize) -> Option<RegexLiteral<'_>> {
    let bytes = text.as_bytes();
    let mut j = slash + 1;
    loop {
        match bytes.get(j) {
            None | Some(b'\n') => return None,
            Some(b'\\') => j += 2,
            Some(b'/') => break,
            Some(_) => j += 1,
        }
    }
    if j == slash + 1 {
        return None;
    }
    let mut k = j + 1;
    while k < bytes.len() && REGEX_FLAGS.contains(&bytes[k]) {
        k += 1;
    }
    Some(RegexLiteral { pattern: &text[slash + 1..j], flags: &text[j + 1..k], end: k })
}

/// Rewrite `/pattern/flags` literals into `{"$regex": …, "$options": …}` objects.
///
/// Quoted strings pass through untouched, so `"/not-a-regex/"` stays a plain string. Any
/// slash outside the regex context is copied verbatim.
#[must_use]
pub fn rewrite_regex_literals(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len() + 16);
    let mut copied = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => i = string_end(bytes, i),
            b'/' if regex_allowed_at(bytes, i) => {
                if let Some(lit) = read_regex_literal(text, i) {
                    out.push_str(&text[copied..i]);
                    out.push_str(&lit.to_json());
                    i = lit.end;
                    copied = i;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    out.push_str(&text[copied..]);
    out
}

/// Render `s` as a JSON string literal.
pub(crate) fn json_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// True when `s` is exactly one single- or double-quoted literal.
pub(crate) fn is_quoted(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 2
        && (bytes[0] == b'"' || bytes[0] == b'\'')
        && string_end(bytes, 0) == bytes.len()
        && bytes[bytes.len() - 1] == bytes[0]
}

/// Strip the quotes of a string literal and resolve its escapes. Non-literals come back as-is.
pub(crate) fn unquote(s: &str) -> String {
    if !is_quoted(s) {
        return s.to_string();
    }
    let body = &s[1..s.len() - 1];
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
