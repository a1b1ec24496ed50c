use crate::errors::ParseError;
use crate::types::{CollectionQuery, Operation, OperationKind, Value};

use super::command::parse_number;
use super::normalize::normalize;
use super::scanner::{ident_end, is_quoted, match_bracket, skip_ws, split_top_level_args, unquote};
use super::signatures::{OperationContract, operation_contract, supported_operations};

const PREFIX_LEN: usize = "db.".len();
const GET_COLLECTION: &str = "getCollection";

fn invalid_format() -> ParseError {
    ParseError::new("Invalid query format. Expected db.<collection>.<operation>(...)")
}

/// Parse `db.<collection>.<operation>(…)[.sort(…)][.limit(…)][.skip(…)]`.
pub(super) fn parse_collection_query(query: &str) -> Result<CollectionQuery, ParseError> {
    let bytes = query.as_bytes();
    let (collection, dot) = collection_name(query)?;
    let op_start = dot + 1;
    let op_end = ident_end(bytes, op_start);
    if op_end == op_start {
        return Err(invalid_format());
    }
    let open = skip_ws(bytes, op_end);
    if bytes.get(open) != Some(&b'(') {
        return Err(invalid_format());
    }
    let close = match_bracket(query, open).ok_or_else(|| ParseError::at("Unmatched parenthesis", open))?;
    let name = &query[op_start..op_end];
    let contract = operation_contract(name).ok_or_else(|| {
        ParseError::at(
            format!("Unsupported operation: {name}. Supported: {}", supported_operations()),
            op_start,
        )
    })?;
    let operation = build_operation(contract, query[open + 1..close].trim())?;
    let mut parsed = CollectionQuery::new(collection, operation);
    apply_chain(&mut parsed, &query[close + 1..], close + 1)?;
    Ok(parsed)
}

/// Returns the collection name and the offset of the dot that precedes the operation.
fn collection_name(query: &str) -> Result<(String, usize), ParseError> {
    let bytes = query.as_bytes();
    let rest = &query[PREFIX_LEN..];
    if rest.starts_with(GET_COLLECTION) {
        let open = skip_ws(bytes, PREFIX_LEN + GET_COLLECTION.len());
        if bytes.get(open) == Some(&b'(') {
            let close =
                match_bracket(query, open).ok_or_else(|| ParseError::at("Unmatched parenthesis", open))?;
            let arg = query[open + 1..close].trim();
            if !is_quoted(arg) {
                return Err(ParseError::at("getCollection requires a collection name string", open));
            }
            let dot = skip_ws(bytes, close + 1);
            if bytes.get(dot) != Some(&b'.') {
                return Err(invalid_format());
            }
            return Ok((unquote(arg), dot));
        }
    }
    match rest.find('.') {
        Some(0) | None => Err(invalid_format()),
        Some(rel) => Ok((rest[..rel].to_string(), PREFIX_LEN + rel)),
    }
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Argument parts of one call, normalized on demand.
struct Args<'a> {
    raw: &'a str,
    parts: Vec<String>,
}

impl Args<'_> {
    fn value(&self, idx: usize) -> Result<Option<Value>, ParseError> {
        self.parts.get(idx).map(|p| normalize(p)).transpose()
    }

    fn required(&self, idx: usize) -> Result<Value, ParseError> {
        self.value(idx).map(|v| v.unwrap_or(Value::Null))
    }

    fn filter(&self, idx: usize) -> Result<Value, ParseError> {
        self.value(idx).map(|v| v.unwrap_or_else(empty_object))
    }

    /// Quotes stripped, never normalized.
    fn bare(&self, idx: usize) -> Option<String> {
        self.parts.get(idx).map(|p| unquote(p)).filter(|s| !s.is_empty())
    }

    /// Array-shaped first argument plus optional options; varargs are wrapped into a sequence.
    fn sequence(&self) -> Result<(Vec<Value>, Option<Value>), ParseError> {
        if self.parts.first().is_some_and(|p| p.starts_with('[')) {
            let items = into_sequence(self.required(0)?);
            return Ok((items, self.value(1)?));
        }
        if self.raw.is_empty() {
            return Ok((Vec::new(), None));
        }
        let wrapped = normalize(&format!("[{}]", self.raw))?;
        Ok((into_sequence(wrapped), None))
    }
}

fn into_sequence(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        other => vec![other],
    }
}

fn build_operation(contract: &OperationContract, raw: &str) -> Result<Operation, ParseError> {
    let args = Args { raw, parts: split_top_level_args(raw) };
    contract.check_arity(args.parts.len())?;
    Ok(match contract.kind {
        OperationKind::Find => Operation::Find { filter: args.filter(0)?, projection: args.value(1)? },
        OperationKind::FindOne => {
            Operation::FindOne { filter: args.filter(0)?, projection: args.value(1)? }
        }
        OperationKind::Aggregate => {
            let (pipeline, options) = args.sequence()?;
            Operation::Aggregate { pipeline, options }
        }
        OperationKind::Count => Operation::Count { filter: args.filter(0)? },
        OperationKind::Distinct => {
            let field =
                args.bare(0).ok_or_else(|| ParseError::new("distinct requires a field name"))?;
            Operation::Distinct { field, filter: args.value(1)? }
        }
        OperationKind::InsertOne => Operation::InsertOne { document: args.required(0)? },
        OperationKind::InsertMany => {
            let (documents, options) = args.sequence()?;
            Operation::InsertMany { documents, options }
        }
        OperationKind::UpdateOne => Operation::UpdateOne {
            filter: args.required(0)?,
            update: args.required(1)?,
            options: args.value(2)?,
        },
        OperationKind::UpdateMany => Operation::UpdateMany {
            filter: args.required(0)?,
            update: args.required(1)?,
            options: args.value(2)?,
        },
        OperationKind::ReplaceOne => Operation::ReplaceOne {
            filter: args.required(0)?,
            replacement: args.required(1)?,
            options: args.value(2)?,
        },
        OperationKind::DeleteOne => Operation::DeleteOne { filter: args.filter(0)? },
        OperationKind::DeleteMany => Operation::DeleteMany { filter: args.filter(0)? },
        OperationKind::FindOneAndUpdate => Operation::FindOneAndUpdate {
            filter: args.required(0)?,
            update: args.required(1)?,
            options: args.value(2)?,
        },
        OperationKind::FindOneAndReplace => Operation::FindOneAndReplace {
            filter: args.required(0)?,
            replacement: args.required(1)?,
            options: args.value(2)?,
        },
        OperationKind::FindOneAndDelete => {
            Operation::FindOneAndDelete { filter: args.filter(0)?, options: args.value(1)? }
        }
        OperationKind::CreateIndex => {
            Operation::CreateIndex { keys: args.required(0)?, options: args.value(1)? }
        }
        OperationKind::DropIndex => {
            let index = if args.parts[0].starts_with('{') {
                args.required(0)?
            } else {
                Value::String(
                    args.bare(0).ok_or_else(|| ParseError::new("dropIndex requires an index name"))?,
                )
            };
            Operation::DropIndex { index }
        }
        OperationKind::GetIndexes => Operation::GetIndexes,
        OperationKind::BulkWrite => {
            let (operations, options) = args.sequence()?;
            Operation::BulkWrite { operations, options }
        }
    })
}

/// Merge `.sort/.limit/.skip` from the chain suffix; later calls override earlier ones.
///
/// The suffix must consist solely of `.name(...)` calls. Other method names are accepted and
/// ignored.
fn apply_chain(parsed: &mut CollectionQuery, suffix: &str, offset: usize) -> Result<(), ParseError> {
    let bytes = suffix.as_bytes();
    let mut i = skip_ws(bytes, 0);
    while i < bytes.len() {
        let name_start = skip_ws(bytes, i + 1);
        let name_end = ident_end(bytes, name_start);
        let open = skip_ws(bytes, name_end);
        if bytes[i] != b'.' || name_end == name_start || bytes.get(open) != Some(&b'(') {
            let rest: String = suffix[i..].chars().take(20).collect();
            return Err(ParseError::at(format!("Unexpected text after call: {rest}"), offset + i));
        }
        let close = match_bracket(suffix, open)
            .ok_or_else(|| ParseError::at("Unmatched parenthesis", offset + open))?;
        let arg = suffix[open + 1..close].trim();
        match &suffix[name_start..name_end] {
            "sort" => parsed.sort = Some(normalize(arg)?),
            "limit" => parsed.limit = Some(chain_integer("limit", arg)?),
            "skip" => parsed.skip = Some(chain_integer("skip", arg)?),
            other => log::debug!("ignoring chained method .{other}()"),
        }
        i = skip_ws(bytes, close + 1);
    }
    Ok(())
}

fn chain_integer(method: &str, arg: &str) -> Result<i64, ParseError> {
    let err = || ParseError::new(format!("{method} requires a numeric argument"));
    match parse_number(arg).ok_or_else(err)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15).map(|f| f as i64))
            .ok_or_else(err),
        _ => Err(err()),
    }
}
