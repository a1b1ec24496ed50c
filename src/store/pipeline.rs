//! Aggregation pipeline stages over in-memory documents.

use bson::{Bson, Document};
use std::cmp::Ordering;

use super::eval::{as_f64, bad_value, bson_eq, compare_bson, compare_docs, get_path, matches, project, validate_sort};
use crate::errors::StoreError;

/// Run `pipeline` over `docs`, stage by stage.
///
/// # Errors
/// Fails with `BadValue` on an unknown stage or a malformed stage argument.
pub fn run(mut docs: Vec<Document>, pipeline: &[Document]) -> Result<Vec<Document>, StoreError> {
    for stage in pipeline {
        let mut it = stage.iter();
        let (Some((name, arg)), None) = (it.next(), it.next()) else {
            return Err(bad_value("A pipeline stage specification object must contain exactly one field."));
        };
        docs = apply_stage(docs, name, arg)?;
    }
    Ok(docs)
}

fn stage_doc<'a>(name: &str, arg: &'a Bson) -> Result<&'a Document, StoreError> {
    match arg {
        Bson::Document(d) => Ok(d),
        _ => Err(bad_value(format!("the {name} stage specification must be an object"))),
    }
}

fn stage_count(name: &str, arg: &Bson) -> Result<usize, StoreError> {
    match as_f64(arg) {
        Some(n) if n >= 0.0 && n.fract() == 0.0 => Ok(n as usize),
        _ => Err(bad_value(format!("invalid argument to {name} stage: {arg}"))),
    }
}

fn apply_stage(docs: Vec<Document>, name: &str, arg: &Bson) -> Result<Vec<Document>, StoreError> {
    Ok(match name {
        "$match" => {
            let filter = stage_doc(name, arg)?;
            let mut out = Vec::with_capacity(docs.len());
            for d in docs {
                if matches(&d, filter)? {
                    out.push(d);
                }
            }
            out
        }
        "$sort" => {
            let spec = stage_doc(name, arg)?;
            validate_sort(spec)?;
            let mut docs = docs;
            docs.sort_by(|a, b| compare_docs(a, b, spec));
            docs
        }
        "$skip" => docs.into_iter().skip(stage_count(name, arg)?).collect(),
        "$limit" => {
            let n = stage_count(name, arg)?;
            if n == 0 {
                return Err(bad_value("the limit must be positive"));
            }
            docs.into_iter().take(n).collect()
        }
        "$count" => {
            let Bson::String(field) = arg else {
                return Err(bad_value("the count field must be a non-empty string"));
            };
            if field.is_empty() || field.starts_with('$') || field.contains('.') {
                return Err(bad_value("the count field must be a non-empty string"));
            }
            if docs.is_empty() {
                Vec::new()
            } else {
                let mut out = Document::new();
                out.insert(field.clone(), count_value(docs.len()));
                vec![out]
            }
        }
        "$project" => {
            let spec = stage_doc(name, arg)?;
            docs.iter().map(|d| project(d, spec)).collect::<Result<_, _>>()?
        }
        "$unwind" => unwind(docs, arg)?,
        "$group" => group(docs, stage_doc(name, arg)?)?,
        other => return Err(bad_value(format!("Unrecognized pipeline stage name: '{other}'"))),
    })
}

fn count_value(n: usize) -> Bson {
    i32::try_from(n).map_or_else(|_| Bson::Int64(n as i64), Bson::Int32)
}

/// `"$field"` reference to its path.
fn field_ref(arg: &Bson) -> Option<&str> {
    match arg {
        Bson::String(s) => s.strip_prefix('$'),
        _ => None,
    }
}

fn unwind(docs: Vec<Document>, arg: &Bson) -> Result<Vec<Document>, StoreError> {
    let (path, keep_empty) = match arg {
        Bson::Document(d) => (
            d.get("path").and_then(field_ref),
            d.get_bool("preserveNullAndEmptyArrays").unwrap_or(false),
        ),
        other => (field_ref(other), false),
    };
    let path = path.ok_or_else(|| bad_value("$unwind path must be a field path prefixed with '$'"))?;
    let mut out = Vec::new();
    for d in docs {
        match get_path(&d, path).cloned() {
            Some(Bson::Array(items)) if !items.is_empty() => {
                for item in items {
                    let mut copy = d.clone();
                    super::update::set_path(&mut copy, path, item)?;
                    out.push(copy);
                }
            }
            Some(Bson::Array(_)) | None | Some(Bson::Null) => {
                if keep_empty {
                    out.push(d);
                }
            }
            Some(_) => out.push(d),
        }
    }
    Ok(out)
}

/// Evaluate a group key or accumulator operand: a `$field` reference, an object of
/// expressions, or a literal.
fn eval_expr(doc: &Document, expr: &Bson) -> Bson {
    if let Some(path) = field_ref(expr) {
        return get_path(doc, path).cloned().unwrap_or(Bson::Null);
    }
    match expr {
        Bson::Document(fields) => {
            let mut out = Document::new();
            for (k, v) in fields {
                out.insert(k.clone(), eval_expr(doc, v));
            }
            Bson::Document(out)
        }
        other => other.clone(),
    }
}

#[derive(Debug)]
enum Accumulator {
    Sum(f64, bool),
    Avg(f64, u64),
    Min(Option<Bson>),
    Max(Option<Bson>),
    First(Option<Bson>),
    Last(Bson),
    Push(Vec<Bson>),
}

impl Accumulator {
    fn new(op: &str) -> Result<Self, StoreError> {
        Ok(match op {
            "$sum" => Self::Sum(0.0, true),
            "$avg" => Self::Avg(0.0, 0),
            "$min" => Self::Min(None),
            "$max" => Self::Max(None),
            "$first" => Self::First(None),
            "$last" => Self::Last(Bson::Null),
            "$push" => Self::Push(Vec::new()),
            other => return Err(bad_value(format!("unknown group operator '{other}'"))),
        })
    }

    fn feed(&mut self, v: Bson) {
        match self {
            Self::Sum(total, integral) => {
                if let Some(n) = as_f64(&v) {
                    *integral &= !matches!(v, Bson::Double(_));
                    *total += n;
                }
            }
            Self::Avg(total, n) => {
                if let Some(x) = as_f64(&v) {
                    *total += x;
                    *n += 1;
                }
            }
            Self::Min(cur) => {
                if !matches!(v, Bson::Null) && cur.as_ref().is_none_or(|c| compare_bson(&v, c) == Ordering::Less) {
                    *cur = Some(v);
                }
            }
            Self::Max(cur) => {
                if !matches!(v, Bson::Null) && cur.as_ref().is_none_or(|c| compare_bson(&v, c) == Ordering::Greater) {
                    *cur = Some(v);
                }
            }
            Self::First(cur) => {
                if cur.is_none() {
                    *cur = Some(v);
                }
            }
            Self::Last(cur) => *cur = v,
            Self::Push(items) => items.push(v),
        }
    }

    fn finish(self) -> Bson {
        match self {
            #[allow(clippy::cast_possible_truncation)]
            Self::Sum(total, true) if total.abs() < 9.0e15 => {
                let n = total as i64;
                i32::try_from(n).map_or(Bson::Int64(n), Bson::Int32)
            }
            Self::Sum(total, _) => Bson::Double(total),
            #[allow(clippy::cast_precision_loss)]
            Self::Avg(total, n) if n > 0 => Bson::Double(total / n as f64),
            Self::Avg(..) => Bson::Null,
            Self::Min(v) | Self::Max(v) | Self::First(v) => v.unwrap_or(Bson::Null),
            Self::Last(v) => v,
            Self::Push(items) => Bson::Array(items),
        }
    }
}

fn group(docs: Vec<Document>, spec: &Document) -> Result<Vec<Document>, StoreError> {
    let key_expr = spec.get("_id").ok_or_else(|| bad_value("a group specification must include an _id"))?;
    let mut fields = Vec::new();
    for (name, acc) in spec {
        if name == "_id" {
            continue;
        }
        let Bson::Document(acc) = acc else {
            return Err(bad_value(format!("The field '{name}' must be an accumulator object")));
        };
        let mut it = acc.iter();
        let (Some((op, operand)), None) = (it.next(), it.next()) else {
            return Err(bad_value(format!("The field '{name}' must specify one accumulator")));
        };
        Accumulator::new(op)?;
        fields.push((name.clone(), op.clone(), operand.clone()));
    }

    // first-seen key order
    let mut groups: Vec<(Bson, Vec<Accumulator>)> = Vec::new();
    for d in &docs {
        let key = eval_expr(d, key_expr);
        let idx = match groups.iter().position(|(k, _)| bson_eq(k, &key)) {
            Some(i) => i,
            None => {
                let accs = fields.iter().map(|(_, op, _)| Accumulator::new(op)).collect::<Result<_, _>>()?;
                groups.push((key, accs));
                groups.len() - 1
            }
        };
        for ((_, _, operand), acc) in fields.iter().zip(groups[idx].1.iter_mut()) {
            acc.feed(eval_expr(d, operand));
        }
    }

    Ok(groups
        .into_iter()
        .map(|(key, accs)| {
            let mut out = Document::new();
            out.insert("_id", key);
            for ((name, _, _), acc) in fields.iter().zip(accs) {
                out.insert(name.clone(), acc.finish());
            }
            out
        })
        .collect())
}
