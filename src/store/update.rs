use bson::{Bson, Document};

use super::eval::{as_f64, bad_value, bson_eq, get_path, is_num};
use crate::errors::StoreError;

/// Array positions past the end are padded with nulls, up to this index.
const MAX_ARRAY_INDEX: usize = 1 << 16;

fn cannot_create(field: &str, parent: &str, at: &Bson) -> StoreError {
    bad_value(format!("Cannot create field '{field}' in element {{{parent}: {at}}}"))
}

/// Set a dotted path, creating missing intermediate documents. Numeric segments address
/// array elements. Returns whether the value changed.
///
/// # Errors
/// `BadValue` when an intermediate step is a scalar, or a non-numeric segment meets an array.
pub(crate) fn set_path(root: &mut Document, path: &str, value: Bson) -> Result<bool, StoreError> {
    match path.split_once('.') {
        None => {
            let old = root.insert(path.to_string(), value.clone());
            Ok(old.as_ref() != Some(&value))
        }
        Some((head, rest)) => {
            let child = root.entry(head.to_string()).or_insert_with(|| Bson::Document(Document::new()));
            set_in(child, head, rest, value)
        }
    }
}

fn set_in(node: &mut Bson, name: &str, path: &str, value: Bson) -> Result<bool, StoreError> {
    let (head, rest) = path.split_once('.').map_or((path, None), |(h, r)| (h, Some(r)));
    match node {
        Bson::Document(d) => set_path(d, path, value),
        Bson::Array(items) => {
            let Some(idx) = head.parse::<usize>().ok().filter(|i| *i <= MAX_ARRAY_INDEX) else {
                return Err(bad_value(format!("Cannot create field '{head}' in array '{name}'")));
            };
            if idx >= items.len() {
                items.resize(idx + 1, Bson::Null);
                if rest.is_some() {
                    items[idx] = Bson::Document(Document::new());
                }
            }
            match rest {
                None => {
                    let old = std::mem::replace(&mut items[idx], value.clone());
                    Ok(old != value)
                }
                Some(rest) => set_in(&mut items[idx], head, rest, value),
            }
        }
        other => Err(cannot_create(head, name, other)),
    }
}

/// Remove a dotted path if present. Never creates intermediate documents; an addressed array
/// element is nulled rather than removed so positions stay stable.
pub(crate) fn unset_path(root: &mut Document, path: &str) -> bool {
    match path.split_once('.') {
        None => root.remove(path).is_some(),
        Some((head, rest)) => root.get_mut(head).is_some_and(|child| unset_in(child, rest)),
    }
}

fn unset_in(node: &mut Bson, path: &str) -> bool {
    match node {
        Bson::Document(d) => unset_path(d, path),
        Bson::Array(items) => {
            let (head, rest) = path.split_once('.').map_or((path, None), |(h, r)| (h, Some(r)));
            let Some(item) = head.parse::<usize>().ok().and_then(|i| items.get_mut(i)) else {
                return false;
            };
            match rest {
                None => !matches!(std::mem::replace(item, Bson::Null), Bson::Null),
                Some(rest) => unset_in(item, rest),
            }
        }
        _ => false,
    }
}

/// Numeric addition keeping integer width where the result fits.
fn add_numbers(cur: &Bson, by: &Bson) -> Option<Bson> {
    Some(match (cur, by) {
        (Bson::Int32(a), Bson::Int32(b)) => {
            a.checked_add(*b).map_or_else(|| Bson::Int64(i64::from(*a) + i64::from(*b)), Bson::Int32)
        }
        (Bson::Int32(a), Bson::Int64(b)) => Bson::Int64(i64::from(*a).checked_add(*b)?),
        (Bson::Int64(a), Bson::Int32(b)) => Bson::Int64(a.checked_add(i64::from(*b))?),
        (Bson::Int64(a), Bson::Int64(b)) => Bson::Int64(a.checked_add(*b)?),
        _ => Bson::Double(as_f64(cur)? + as_f64(by)?),
    })
}

fn operator_fields<'a>(op: &str, arg: &'a Bson) -> Result<&'a Document, StoreError> {
    match arg {
        Bson::Document(d) => Ok(d),
        _ => Err(bad_value(format!("Modifiers operate on fields but we found {op}: {arg}"))),
    }
}

/// Apply an operator update document. `inserting` enables `$setOnInsert`.
///
/// # Errors
/// Fails on unknown operators, non-numeric `$inc`, `$push` onto a non-array, or an attempt to
/// change `_id`.
pub fn apply_operators(doc: &mut Document, update: &Document, inserting: bool) -> Result<bool, StoreError> {
    if update.is_empty() {
        return Err(bad_value("Update document requires atomic operators"));
    }
    // Work on a copy so a rejected update leaves `doc` untouched.
    let mut next = doc.clone();
    let changed = apply_all(&mut next, update, inserting)?;
    if let Some(id) = doc.get("_id")
        && !next.get("_id").is_some_and(|now| bson_eq(now, id))
    {
        return Err(bad_value("Performing an update on the path '_id' would modify the immutable field '_id'"));
    }
    *doc = next;
    Ok(changed)
}

fn apply_all(doc: &mut Document, update: &Document, inserting: bool) -> Result<bool, StoreError> {
    let mut changed = false;
    for (op, arg) in update {
        let fields = operator_fields(op, arg)?;
        for (path, value) in fields {
            changed |= match op.as_str() {
                "$set" => set_path(doc, path, value.clone())?,
                "$setOnInsert" => inserting && set_path(doc, path, value.clone())?,
                "$unset" => unset_path(doc, path),
                "$inc" => {
                    if !is_num(value) {
                        return Err(bad_value(format!("Cannot increment with non-numeric argument: {{{path}: {value}}}")));
                    }
                    let cur = get_path(doc, path).cloned().unwrap_or(Bson::Int32(0));
                    let next = add_numbers(&cur, value).ok_or_else(|| {
                        bad_value(format!("Cannot apply $inc to a value of non-numeric type: {path}"))
                    })?;
                    set_path(doc, path, next)?
                }
                "$push" => {
                    let mut items = match get_path(doc, path) {
                        None => Vec::new(),
                        Some(Bson::Array(items)) => items.clone(),
                        Some(_) => return Err(bad_value(format!("The field '{path}' must be an array"))),
                    };
                    match value {
                        Bson::Document(spec) if spec.contains_key("$each") => match spec.get("$each") {
                            Some(Bson::Array(each)) => items.extend(each.iter().cloned()),
                            _ => return Err(bad_value("$each requires an array")),
                        },
                        other => items.push(other.clone()),
                    }
                    set_path(doc, path, Bson::Array(items))?
                }
                other => return Err(bad_value(format!("Unknown modifier: {other}"))),
            };
        }
    }
    Ok(changed)
}

/// Replace everything but `_id`. Returns whether the stored document changed.
///
/// # Errors
/// Fails when the replacement contains update operators or a different `_id`.
pub fn apply_replacement(doc: &mut Document, replacement: &Document) -> Result<bool, StoreError> {
    if replacement.keys().any(|k| k.starts_with('$')) {
        return Err(bad_value("Replacement document must not contain update operators"));
    }
    let id = doc.get("_id").cloned();
    if let (Some(id), Some(new_id)) = (&id, replacement.get("_id"))
        && !bson_eq(id, new_id)
    {
        return Err(bad_value("The _id field cannot be changed"));
    }
    let mut next = Document::new();
    if let Some(id) = id {
        next.insert("_id", id);
    }
    for (k, v) in replacement {
        if k != "_id" {
            next.insert(k.clone(), v.clone());
        }
    }
    let changed = next != *doc;
    *doc = next;
    Ok(changed)
}

/// Seed document for an upsert: the filter's plain equality fields.
///
/// # Errors
/// `BadValue` when two equality paths collide (`{a: 1, "a.b": 2}`).
pub fn upsert_seed(filter: &Document) -> Result<Document, StoreError> {
    let mut seed = Document::new();
    for (k, v) in filter {
        if k.starts_with('$') {
            continue;
        }
        match v {
            Bson::Document(d) if d.keys().any(|k| k.starts_with('$')) => {
                if let Some(eq) = d.get("$eq") {
                    set_path(&mut seed, k, eq.clone())?;
                }
            }
            Bson::RegularExpression(_) => {}
            other => {
                set_path(&mut seed, k, other.clone())?;
            }
        }
    }
    Ok(seed)
}
