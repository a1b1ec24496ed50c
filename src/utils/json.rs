//! Conversion between decoded notation values and store documents.
//!
//! The extended-JSON wrappers emitted by the normalizer map onto native BSON types:
//! `{"$oid": hex}` is an ObjectId, `{"$date": rfc3339 | millis}` a DateTime, and a
//! `{"$regex": pattern, "$options": flags}` pair with string members a regular expression. The
//! reverse direction renders them the same way so results print back in the shell dialect.

use bson::oid::ObjectId;
use bson::{Bson, Document};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use crate::errors::QueryError;
use crate::types::Value;

/// Convert one decoded value into BSON.
///
/// # Errors
/// Returns a `BAD_VALUE` error for a malformed `$oid`, `$date` or `$regex` wrapper.
pub fn to_bson(value: &Value) -> Result<Bson, QueryError> {
    Ok(match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Number(n) => number_to_bson(n),
        Value::String(s) => Bson::String(s.clone()),
        Value::Array(items) => Bson::Array(items.iter().map(to_bson).collect::<Result<_, _>>()?),
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(hex)) = map.get("$oid") {
                    let oid = ObjectId::parse_str(hex)
                        .map_err(|e| QueryError::bad_value(format!("invalid ObjectId \"{hex}\": {e}")))?;
                    return Ok(Bson::ObjectId(oid));
                }
                if let Some(date) = map.get("$date") {
                    return parse_date(date).map(Bson::DateTime);
                }
            }
            if let Some(Value::String(pattern)) = map.get("$regex") {
                match (map.len(), map.get("$options")) {
                    (1, None) => return regex_value(pattern, ""),
                    (2, Some(Value::String(options))) => return regex_value(pattern, options),
                    _ => {}
                }
            }
            let mut doc = Document::new();
            for (k, v) in map {
                doc.insert(k.clone(), to_bson(v)?);
            }
            Bson::Document(doc)
        }
    })
}

fn regex_value(pattern: &str, options: &str) -> Result<Bson, QueryError> {
    let bad = |e: bson::error::Error| QueryError::bad_value(format!("invalid regex /{pattern}/{options}: {e}"));
    let mut flags: Vec<char> = options.chars().collect();
    flags.sort_unstable();
    Ok(Bson::RegularExpression(bson::Regex {
        pattern: pattern.try_into().map_err(bad)?,
        options: flags.into_iter().collect::<String>().try_into().map_err(bad)?,
    }))
}

fn number_to_bson(n: &serde_json::Number) -> Bson {
    if let Some(i) = n.as_i64() {
        return i32::try_from(i).map_or(Bson::Int64(i), Bson::Int32);
    }
    Bson::Double(n.as_f64().unwrap_or(f64::NAN))
}

fn parse_date(value: &Value) -> Result<bson::DateTime, QueryError> {
    let bad = || QueryError::bad_value(format!("invalid date: {value}"));
    let millis = match value {
        Value::Number(n) => n.as_i64().ok_or_else(bad)?,
        Value::String(s) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                dt.timestamp_millis()
            } else {
                let day = NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| bad())?;
                day.and_hms_opt(0, 0, 0).ok_or_else(bad)?.and_utc().timestamp_millis()
            }
        }
        _ => return Err(bad()),
    };
    Ok(bson::DateTime::from_millis(millis))
}

/// Convert a value that must be an object into a document.
///
/// # Errors
/// Returns `BAD_VALUE` naming `what` when the value is not an object.
pub fn to_document(value: &Value, what: &str) -> Result<Document, QueryError> {
    match to_bson(value)? {
        Bson::Document(d) => Ok(d),
        _ => Err(QueryError::bad_value(format!("{what} must be an object"))),
    }
}

/// Like [`to_document`] but an absent value yields an empty document.
///
/// # Errors
/// Same as [`to_document`].
pub fn to_document_or_empty(value: Option<&Value>, what: &str) -> Result<Document, QueryError> {
    value.map_or_else(|| Ok(Document::new()), |v| to_document(v, what))
}

/// Render a BSON value for output.
#[must_use]
pub fn from_bson(value: &Bson) -> Value {
    match value {
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(b) => Value::Bool(*b),
        Bson::Int32(i) => Value::from(*i),
        Bson::Int64(i) => Value::from(*i),
        Bson::Double(f) => serde_json::Number::from_f64(*f).map_or_else(|| Value::String(f.to_string()), Value::Number),
        Bson::String(s) => Value::String(s.clone()),
        Bson::Array(items) => Value::Array(items.iter().map(from_bson).collect()),
        Bson::Document(d) => from_document(d),
        Bson::ObjectId(oid) => serde_json::json!({"$oid": oid.to_hex()}),
        Bson::DateTime(dt) => {
            let rendered = DateTime::<Utc>::from_timestamp_millis(dt.timestamp_millis())
                .map_or_else(|| dt.timestamp_millis().to_string(), |d| d.to_rfc3339_opts(SecondsFormat::Millis, true));
            serde_json::json!({"$date": rendered})
        }
        Bson::RegularExpression(re) if re.options.as_str().is_empty() => {
            serde_json::json!({"$regex": re.pattern.as_str()})
        }
        Bson::RegularExpression(re) => {
            serde_json::json!({"$regex": re.pattern.as_str(), "$options": re.options.as_str()})
        }
        other => other.clone().into_relaxed_extjson(),
    }
}

#[must_use]
pub fn from_document(doc: &Document) -> Value {
    Value::Object(doc.iter().map(|(k, v)| (k.clone(), from_bson(v))).collect())
}
