use bson::{Bson, Document};
use std::cmp::Ordering;

use crate::errors::StoreError;

// Safety limits to prevent resource abuse
pub(crate) const MAX_PATH_DEPTH: usize = 32;
pub(crate) const MAX_IN_SET: usize = 1000;
pub(crate) const MAX_SORT_FIELDS: usize = 32;

pub(crate) const BAD_VALUE_CODE: i32 = 2;
pub(crate) const BAD_VALUE_NAME: &str = "BadValue";

pub(crate) fn bad_value(message: impl Into<String>) -> StoreError {
    StoreError::with_code(message, BAD_VALUE_CODE, BAD_VALUE_NAME)
}

/// Resolve a dotted path. Numeric segments index into arrays.
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    if path.is_empty() || path.len() > 1024 {
        return None;
    }
    let mut segs = path.split('.');
    let first = segs.next()?;
    let mut cur = doc.get(first)?;
    for (depth, seg) in segs.enumerate() {
        if depth + 1 >= MAX_PATH_DEPTH {
            return None;
        }
        cur = match cur {
            Bson::Document(d) => d.get(seg)?,
            Bson::Array(items) => items.get(seg.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(cur)
}

/// Evaluate a query document against `doc`.
///
/// # Errors
/// Fails with `BadValue` on an unknown or malformed operator.
pub fn matches(doc: &Document, filter: &Document) -> Result<bool, StoreError> {
    for (key, cond) in filter {
        let ok = match key.as_str() {
            "$and" => {
                let mut all = true;
                for f in logical_list(key, cond)? {
                    if !matches(doc, f)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" => {
                let mut any = false;
                for f in logical_list(key, cond)? {
                    if matches(doc, f)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            "$nor" => {
                let mut none = true;
                for f in logical_list(key, cond)? {
                    if matches(doc, f)? {
                        none = false;
                        break;
                    }
                }
                none
            }
            k if k.starts_with('$') => return Err(bad_value(format!("unknown top level operator: {k}"))),
            path => field_matches(get_path(doc, path), cond)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn logical_list<'a>(op: &str, cond: &'a Bson) -> Result<Vec<&'a Document>, StoreError> {
    let Bson::Array(items) = cond else {
        return Err(bad_value(format!("{op} must be an array")));
    };
    if items.is_empty() {
        return Err(bad_value(format!("{op} argument must be a non-empty array")));
    }
    items
        .iter()
        .map(|b| match b {
            Bson::Document(d) => Ok(d),
            _ => Err(bad_value(format!("{op} entries must be objects"))),
        })
        .collect()
}

/// An operator document has only `$`-prefixed keys.
fn is_operator_doc(d: &Document) -> bool {
    !d.is_empty() && d.keys().all(|k| k.starts_with('$'))
}

fn field_matches(value: Option<&Bson>, cond: &Bson) -> Result<bool, StoreError> {
    match cond {
        Bson::Document(ops) if is_operator_doc(ops) => {
            for (op, arg) in ops {
                if !apply_operator(value, op, arg, ops)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Bson::RegularExpression(re) => regex_matches(value, re.pattern.as_str(), re.options.as_str()),
        _ => Ok(value_equals(value, cond)),
    }
}

fn apply_operator(value: Option<&Bson>, op: &str, arg: &Bson, all: &Document) -> Result<bool, StoreError> {
    Ok(match op {
        "$eq" => value_equals(value, arg),
        "$ne" => !value_equals(value, arg),
        "$gt" => cmp_any(value, arg, |o| o == Ordering::Greater),
        "$gte" => cmp_any(value, arg, |o| o != Ordering::Less),
        "$lt" => cmp_any(value, arg, |o| o == Ordering::Less),
        "$lte" => cmp_any(value, arg, |o| o != Ordering::Greater),
        "$in" => in_set(value, set_arg(op, arg)?),
        "$nin" => !in_set(value, set_arg(op, arg)?),
        "$exists" => value.is_some() == truthy(arg),
        "$regex" => {
            let options = all.get_str("$options").unwrap_or("");
            match arg {
                Bson::String(p) => regex_matches(value, p, options)?,
                Bson::RegularExpression(re) => regex_matches(value, re.pattern.as_str(), re.options.as_str())?,
                _ => return Err(bad_value("$regex has to be a string")),
            }
        }
        "$options" => true,
        "$not" => !field_matches(value, arg)?,
        other => return Err(bad_value(format!("unknown operator: {other}"))),
    })
}

fn set_arg<'a>(op: &str, arg: &'a Bson) -> Result<&'a [Bson], StoreError> {
    match arg {
        Bson::Array(items) => Ok(&items[..items.len().min(MAX_IN_SET)]),
        _ => Err(bad_value(format!("{op} needs an array"))),
    }
}

pub(crate) fn truthy(v: &Bson) -> bool {
    match v {
        Bson::Boolean(b) => *b,
        Bson::Int32(i) => *i != 0,
        Bson::Int64(i) => *i != 0,
        Bson::Double(f) => *f != 0.0,
        Bson::Null | Bson::Undefined => false,
        _ => true,
    }
}

/// Equality with array fan-out: an array field matches if it equals `target` or any element does.
fn value_equals(value: Option<&Bson>, target: &Bson) -> bool {
    match value {
        None => matches!(target, Bson::Null),
        Some(v) if bson_eq(v, target) => true,
        Some(Bson::Array(items)) => items.iter().any(|i| bson_eq(i, target)),
        Some(_) => false,
    }
}

fn in_set(value: Option<&Bson>, set: &[Bson]) -> bool {
    set.iter().any(|candidate| match candidate {
        Bson::RegularExpression(re) => {
            regex_matches(value, re.pattern.as_str(), re.options.as_str()).unwrap_or(false)
        }
        other => value_equals(value, other),
    })
}

fn cmp_any(value: Option<&Bson>, target: &Bson, pred: impl Fn(Ordering) -> bool) -> bool {
    let comparable = |v: &Bson| same_class(v, target) && pred(compare_bson(v, target));
    match value {
        None => false,
        Some(Bson::Array(items)) if !matches!(target, Bson::Array(_)) => items.iter().any(comparable),
        Some(v) => comparable(v),
    }
}

/// Range operators only compare values of the same type class.
fn same_class(a: &Bson, b: &Bson) -> bool {
    (is_num(a) && is_num(b)) || type_rank(a) == type_rank(b)
}

#[cfg(feature = "regex")]
fn regex_matches(value: Option<&Bson>, pattern: &str, options: &str) -> Result<bool, StoreError> {
    let mut builder = regex::RegexBuilder::new(pattern);
    builder
        .case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .dot_matches_new_line(options.contains('s'))
        .ignore_whitespace(options.contains('x'));
    let re = builder.build().map_err(|e| bad_value(format!("invalid regex: {e}")))?;
    Ok(match value {
        Some(Bson::String(s)) => re.is_match(s),
        Some(Bson::Array(items)) => items.iter().any(|i| matches!(i, Bson::String(s) if re.is_match(s))),
        _ => false,
    })
}

#[cfg(not(feature = "regex"))]
fn regex_matches(_value: Option<&Bson>, _pattern: &str, _options: &str) -> Result<bool, StoreError> {
    Err(bad_value("$regex support is disabled in this build"))
}

pub(crate) fn is_num(x: &Bson) -> bool {
    matches!(x, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_))
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn as_f64(x: &Bson) -> Option<f64> {
    match x {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        Bson::Decimal128(d) => d.to_string().parse::<f64>().ok(),
        _ => None,
    }
}

/// Equality that treats numerically equal numbers of different widths as equal.
pub fn bson_eq(a: &Bson, b: &Bson) -> bool {
    if is_num(a) && is_num(b) {
        return compare_bson(a, b) == Ordering::Equal;
    }
    a == b
}

/// Total order used for sorting and range comparisons.
pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    if is_num(a) && is_num(b) {
        return as_f64(a).unwrap_or(f64::NAN).total_cmp(&as_f64(b).unwrap_or(f64::NAN));
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
        (Bson::Array(x), Bson::Array(y)) => {
            for (l, r) in x.iter().zip(y) {
                let o = compare_bson(l, r);
                if o != Ordering::Equal {
                    return o;
                }
            }
            x.len().cmp(&y.len())
        }
        (Bson::Document(x), Bson::Document(y)) => {
            for ((ka, va), (kb, vb)) in x.iter().zip(y) {
                let o = ka.cmp(kb).then_with(|| compare_bson(va, vb));
                if o != Ordering::Equal {
                    return o;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Cross-type ordering: null < numbers < strings < objects < arrays < ids < booleans < dates.
fn type_rank(v: &Bson) -> u8 {
    match v {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::DbPointer(_) => 12,
        Bson::JavaScriptCode(_) | Bson::JavaScriptCodeWithScope(_) => 13,
        Bson::MaxKey => 255,
    }
}

/// Compare two documents by a `{field: 1|-1, …}` sort specification. Missing fields sort first.
pub fn compare_docs(a: &Document, b: &Document, sort: &Document) -> Ordering {
    for (field, dir) in sort.iter().take(MAX_SORT_FIELDS) {
        let ord = match (get_path(a, field), get_path(b, field)) {
            (Some(x), Some(y)) => compare_bson(x, y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            let descending = as_f64(dir).is_some_and(|d| d < 0.0);
            return if descending { ord.reverse() } else { ord };
        }
    }
    Ordering::Equal
}

/// # Errors
/// Fails when a sort direction is not 1 or -1.
pub fn validate_sort(sort: &Document) -> Result<(), StoreError> {
    for (field, dir) in sort {
        match as_f64(dir) {
            Some(d) if d == 1.0 || d == -1.0 => {}
            _ => return Err(bad_value(format!("bad sort specification for {field}: {dir}"))),
        }
    }
    Ok(())
}

/// Apply an inclusion or exclusion projection. `_id` is kept unless excluded explicitly.
///
/// # Errors
/// Fails when inclusion and exclusion are mixed (other than for `_id`).
pub fn project(doc: &Document, projection: &Document) -> Result<Document, StoreError> {
    let mut include_id = true;
    let mut includes = Vec::new();
    let mut excludes = Vec::new();
    for (field, flag) in projection {
        let on = truthy(flag);
        if field == "_id" {
            include_id = on;
        } else if on {
            includes.push(field.as_str());
        } else {
            excludes.push(field.as_str());
        }
    }
    if !includes.is_empty() && !excludes.is_empty() {
        return Err(bad_value(format!(
            "Cannot do exclusion on field {} in inclusion projection",
            excludes[0]
        )));
    }
    if includes.is_empty() {
        let mut out = doc.clone();
        for path in excludes {
            super::update::unset_path(&mut out, path);
        }
        if !include_id {
            out.remove("_id");
        }
        return Ok(out);
    }
    let mut out = Document::new();
    if include_id && let Some(id) = doc.get("_id") {
        out.insert("_id", id.clone());
    }
    for path in includes {
        if let Some(v) = get_path(doc, path) {
            super::update::set_path(&mut out, path, v.clone())?;
        }
    }
    Ok(out)
}
