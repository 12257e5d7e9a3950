//! Filter evaluation, update application and projection over JSON documents.

use std::cmp::Ordering;

use docdb_core::DriverError;
use serde_json::{Map, Value};

use crate::schema::CompiledSchema;

fn bad(msg: impl Into<String>) -> DriverError {
    DriverError::invalid_argument(msg)
}

pub(crate) fn get_path<'a>(doc: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut cur = doc.get(parts.next()?)?;
    for part in parts {
        cur = cur.as_object()?.get(part)?;
    }
    Some(cur)
}

// -----------------------
// Filters
// -----------------------

pub(crate) fn matches(filter: &Map<String, Value>, doc: &Map<String, Value>) -> Result<bool, DriverError> {
    for (key, cond) in filter {
        let ok = match key.as_str() {
            "$and" => {
                let mut all = true;
                for sub in sub_filters(key, cond)? {
                    if !matches(sub, doc)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" => {
                let mut any = false;
                for sub in sub_filters(key, cond)? {
                    if matches(sub, doc)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            op if op.starts_with('$') => return Err(bad(format!("unknown filter operator {op:?}"))),
            path => field_matches(get_path(doc, path), cond)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn sub_filters<'a>(op: &str, cond: &'a Value) -> Result<Vec<&'a Map<String, Value>>, DriverError> {
    let arr = cond.as_array().ok_or_else(|| bad(format!("{op} expects an array of filters")))?;
    arr.iter()
        .map(|f| f.as_object().ok_or_else(|| bad(format!("{op} entries must be objects"))))
        .collect()
}

fn is_operator_object(cond: &Value) -> bool {
    match cond.as_object() {
        Some(obj) => !obj.is_empty() && obj.keys().all(|k| k.starts_with('$')),
        None => false,
    }
}

fn field_matches(actual: Option<&Value>, cond: &Value) -> Result<bool, DriverError> {
    let actual = actual.unwrap_or(&Value::Null);
    if !is_operator_object(cond) {
        return Ok(values_equal(actual, cond));
    }
    if let Some(ops) = cond.as_object() {
        for (op, operand) in ops {
            let ok = match op.as_str() {
                "$eq" => values_equal(actual, operand),
                "$ne" => !values_equal(actual, operand),
                "$gt" => compare(actual, operand) == Some(Ordering::Greater),
                "$gte" => matches!(compare(actual, operand), Some(Ordering::Greater | Ordering::Equal)),
                "$lt" => compare(actual, operand) == Some(Ordering::Less),
                "$lte" => matches!(compare(actual, operand), Some(Ordering::Less | Ordering::Equal)),
                other => return Err(bad(format!("unknown comparison operator {other:?}"))),
            };
            if !ok {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

/// Structural equality where numbers compare by value (`1 == 1.0`).
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare(a, b) == Some(Ordering::Equal),
        (Value::Array(x), Value::Array(y)) => x.len() == y.len() && x.iter().zip(y).all(|(p, q)| values_equal(p, q)),
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len() && x.iter().all(|(k, v)| y.get(k).map_or(false, |w| values_equal(v, w)))
        }
        _ => a == b,
    }
}

/// Ordering for comparison operators; values of different kinds are unordered.
pub(crate) fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let exact = |n: &serde_json::Number| n.as_i64().map(i128::from).or_else(|| n.as_u64().map(i128::from));
            match (exact(x), exact(y)) {
                (Some(i), Some(j)) => Some(i.cmp(&j)),
                _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
            }
        }
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

// -----------------------
// Updates
// -----------------------

/// Apply `$set` / `$unset` to `doc`. Primary-key fields are immutable.
pub(crate) fn apply_update(doc: &mut Map<String, Value>, update: &Map<String, Value>, schema: &CompiledSchema) -> Result<(), DriverError> {
    if update.is_empty() {
        return Err(bad("update has no operators"));
    }
    for (op, arg) in update {
        match op.as_str() {
            "$set" => {
                let fields = arg.as_object().ok_or_else(|| bad("$set expects an object"))?;
                for (path, value) in fields {
                    guard_path(path, schema)?;
                    set_path(doc, path, value.clone())?;
                }
            }
            "$unset" => {
                let paths: Vec<&str> = match arg {
                    Value::Array(items) => items
                        .iter()
                        .map(|p| p.as_str().ok_or_else(|| bad("$unset entries must be strings")))
                        .collect::<Result<_, _>>()?,
                    Value::Object(obj) => obj.keys().map(String::as_str).collect(),
                    _ => return Err(bad("$unset expects an array or an object")),
                };
                for path in paths {
                    guard_path(path, schema)?;
                    unset_path(doc, path);
                }
            }
            other => return Err(bad(format!("unknown update operator {other:?}"))),
        }
    }
    Ok(())
}

fn guard_path(path: &str, schema: &CompiledSchema) -> Result<(), DriverError> {
    let head = path.split('.').next().unwrap_or(path);
    if path.is_empty() || path.split('.').any(str::is_empty) {
        return Err(bad(format!("invalid field path {path:?}")));
    }
    if schema.is_primary_key(head) {
        return Err(bad(format!("primary key field {head:?} cannot be updated")));
    }
    Ok(())
}

fn set_path(doc: &mut Map<String, Value>, path: &str, value: Value) -> Result<(), DriverError> {
    let mut parts: Vec<&str> = path.split('.').collect();
    let last = parts.pop().unwrap_or(path);
    let mut cur = doc;
    for part in parts {
        let slot = cur.entry(part.to_string()).or_insert_with(|| Value::Object(Map::new()));
        if slot.is_null() {
            *slot = Value::Object(Map::new());
        }
        cur = slot
            .as_object_mut()
            .ok_or_else(|| bad(format!("cannot set {path:?}: {part:?} is not an object")))?;
    }
    cur.insert(last.to_string(), value);
    Ok(())
}

fn unset_path(doc: &mut Map<String, Value>, path: &str) {
    match path.rsplit_once('.') {
        None => {
            doc.remove(path);
        }
        Some((parent, leaf)) => {
            let mut cur = Some(doc);
            for part in parent.split('.') {
                cur = cur.and_then(|m| m.get_mut(part)).and_then(Value::as_object_mut);
            }
            if let Some(m) = cur {
                m.remove(leaf);
            }
        }
    }
}

// -----------------------
// Projection
// -----------------------

/// `{"f": true}` keeps only the listed fields (the primary key always stays);
/// `{"f": false}` drops the listed fields.
pub(crate) fn project(doc: &Map<String, Value>, fields: &Map<String, Value>, schema: &CompiledSchema) -> Result<Map<String, Value>, DriverError> {
    let mut include = Vec::new();
    let mut exclude = Vec::new();
    for (path, flag) in fields {
        match flag.as_bool() {
            Some(true) => include.push(path.as_str()),
            Some(false) => exclude.push(path.as_str()),
            None => return Err(bad(format!("projection of {path:?} must be true or false"))),
        }
    }
    if !include.is_empty() && !exclude.is_empty() {
        return Err(bad("projection cannot mix included and excluded fields"));
    }
    if include.is_empty() {
        let mut out = doc.clone();
        for path in exclude {
            unset_path(&mut out, path);
        }
        return Ok(out);
    }
    let mut out = Map::new();
    for pk in &schema.primary_key {
        if let Some(v) = doc.get(&pk.name) {
            out.insert(pk.name.clone(), v.clone());
        }
    }
    for path in include {
        if let Some(v) = get_path(doc, path) {
            set_path(&mut out, path, v.clone())?;
        }
    }
    Ok(out)
}
