use bson::Document;
use std::path::Path;

use super::runner::OutputMode;
use crate::errors::ParseError;
use crate::parse::normalize;
use crate::utils::json::to_document;

pub fn parse_output_mode(s: Option<&str>) -> OutputMode {
    match s.map(str::to_ascii_lowercase).as_deref() {
        Some("json") => OutputMode::Json,
        Some("plain") => OutputMode::Plain,
        _ => OutputMode::Human,
    }
}

/// Render `query` with a caret under the error position, followed by the message.
#[must_use]
pub fn render_parse_error(query: &str, err: &ParseError) -> String {
    let query = query.trim();
    match err.position.and_then(|p| query.get(..p)) {
        Some(prefix) => format!("{query}\n{}^\n{}", " ".repeat(prefix.chars().count()), err.message),
        None => err.message.clone(),
    }
}

/// Read seed documents: a JSON array, or one document per line. Both accept the shell
/// notation (`{name: 'a', _id: ObjectId('…')}`).
///
/// # Errors
/// I/O failures and documents that do not normalize into objects.
pub fn load_seed(path: &Path) -> Result<Vec<Document>, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    let values = if text.trim_start().starts_with('[') {
        match normalize(text.trim())? {
            serde_json::Value::Array(items) => items,
            other => vec![other],
        }
    } else {
        text.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(normalize)
            .collect::<Result<Vec<_>, _>>()?
    };
    Ok(values.iter().map(|v| to_document(v, "seed document")).collect::<Result<Vec<_>, _>>()?)
}
