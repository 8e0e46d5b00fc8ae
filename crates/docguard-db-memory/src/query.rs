//! Mongo-flavored document matching and update application.
//!
//! Queries are JSON objects mixing direct equality (`{"status": "open"}`),
//! per-field operator documents (`{"age": {"$gte": 18}}`) and top-level
//! logical combinators (`$or`, `$and`, `$nor`). Updates are either operator
//! documents (`{"$set": {...}}`) applied field by field, or plain documents
//! that replace the target (handled by the storage layer).

use std::cmp::Ordering;

use serde_json::Value;

use docguard_core::{JsonMap, is_update_operator};

/// Check whether `doc` satisfies `query`.
pub fn matches(doc: &Value, query: &JsonMap) -> bool {
    query.iter().all(|(key, cond)| match key.as_str() {
        "$or" => sub_queries(cond).iter().any(|sub| matches(doc, sub)),
        "$and" => sub_queries(cond).iter().all(|sub| matches(doc, sub)),
        "$nor" => !sub_queries(cond).iter().any(|sub| matches(doc, sub)),
        _ => matches_field(doc, key, cond),
    })
}

fn sub_queries(cond: &Value) -> Vec<&JsonMap> {
    cond.as_array()
        .map(|subs| subs.iter().filter_map(Value::as_object).collect())
        .unwrap_or_default()
}

fn matches_field(doc: &Value, path: &str, cond: &Value) -> bool {
    let value = get_path(doc, path);

    if let Some(ops) = cond.as_object()
        && ops.keys().any(|k| k.starts_with('$'))
    {
        return ops
            .iter()
            .all(|(op, operand)| matches_operator(value, op, operand));
    }

    match value {
        Some(v) => {
            value_eq(v, cond)
                || v.as_array()
                    .is_some_and(|items| items.iter().any(|item| value_eq(item, cond)))
        }
        None => cond.is_null(),
    }
}

fn matches_operator(value: Option<&Value>, op: &str, operand: &Value) -> bool {
    match op {
        "$eq" => value.is_some_and(|v| value_eq(v, operand)),
        "$neq" => !value.is_some_and(|v| value_eq(v, operand)),
        "$gt" => cmp_is(value, operand, |o| o == Ordering::Greater),
        "$gte" => cmp_is(value, operand, |o| o != Ordering::Less),
        "$lt" => cmp_is(value, operand, |o| o == Ordering::Less),
        "$lte" => cmp_is(value, operand, |o| o != Ordering::Greater),
        "$in" => operand.as_array().is_some_and(|candidates| {
            value.is_some_and(|v| candidates.iter().any(|c| value_eq(v, c)))
        }),
        "$nin" => !operand.as_array().is_some_and(|candidates| {
            value.is_some_and(|v| candidates.iter().any(|c| value_eq(v, c)))
        }),
        "$exists" => truthy(operand) == value.is_some(),
        "$size" => value
            .and_then(Value::as_array)
            .zip(operand.as_u64())
            .is_some_and(|(items, size)| items.len() as u64 == size),
        "$all" => value.and_then(Value::as_array).is_some_and(|items| {
            operand.as_array().is_some_and(|required| {
                required
                    .iter()
                    .all(|r| items.iter().any(|item| value_eq(item, r)))
            })
        }),
        "$regex" => value
            .and_then(Value::as_str)
            .zip(operand.as_str())
            .is_some_and(|(s, pattern)| {
                regex::Regex::new(pattern).is_ok_and(|re| re.is_match(s))
            }),
        "$not" => operand.as_object().is_some_and(|ops| {
            !ops.iter().all(|(op, operand)| matches_operator(value, op, operand))
        }),
        "$elemMatch" => value.and_then(Value::as_array).is_some_and(|items| {
            operand.as_object().is_some_and(|sub| {
                items.iter().any(|item| {
                    if sub.keys().any(|k| k.starts_with('$')) {
                        sub.iter()
                            .all(|(op, operand)| matches_operator(Some(item), op, operand))
                    } else {
                        matches(item, sub)
                    }
                })
            })
        }),
        _ => false,
    }
}

fn cmp_is(value: Option<&Value>, operand: &Value, pred: impl Fn(Ordering) -> bool) -> bool {
    value
        .and_then(|v| compare(v, operand))
        .is_some_and(pred)
}

/// Deep equality with numeric coercion: `1` equals `1.0`.
pub fn value_eq(a: &Value, b: &Value) -> bool {
    if a.is_number() && b.is_number() {
        return a.as_f64() == b.as_f64();
    }
    a == b
}

/// Order two values when they are mutually comparable (numbers or strings).
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    if a.is_number() && b.is_number() {
        return a.as_f64()?.partial_cmp(&b.as_f64()?);
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Resolve a dotted path inside a document. Numeric segments index arrays.
pub fn get_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Set a dotted path inside a document, creating intermediate objects.
pub fn set_path(doc: &mut Value, path: &str, value: Value) {
    let mut current = doc;
    let segments: Vec<&str> = path.split('.').collect();
    for segment in &segments[..segments.len() - 1] {
        if !current.is_object() {
            *current = Value::Object(JsonMap::new());
        }
        current = current
            .as_object_mut()
            .expect("just coerced to object")
            .entry(segment.to_string())
            .or_insert(Value::Object(JsonMap::new()));
    }
    if !current.is_object() {
        *current = Value::Object(JsonMap::new());
    }
    if let Some(map) = current.as_object_mut() {
        map.insert(segments[segments.len() - 1].to_string(), value);
    }
}

/// Remove a dotted path from a document. Returns the removed value.
pub fn remove_path(doc: &mut Value, path: &str) -> Option<Value> {
    let (parent_path, leaf) = match path.rsplit_once('.') {
        Some((parent, leaf)) => (Some(parent), leaf),
        None => (None, path),
    };
    let parent = match parent_path {
        Some(p) => get_path_mut(doc, p)?,
        None => doc,
    };
    parent.as_object_mut()?.remove(leaf)
}

fn get_path_mut<'a>(doc: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut current = doc;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get_mut(segment)?,
            Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Returns `true` if any top-level key of `update` is an update operator.
pub fn has_update_operator(update: &JsonMap) -> bool {
    update.keys().any(|k| is_update_operator(k))
}

/// Apply an operator-style update document to `doc`.
///
/// Non-operator top-level keys are ignored; the storage layer routes plain
/// documents to replacement instead.
pub fn apply_operators(doc: &mut Value, update: &JsonMap) {
    for (op, args) in update {
        let Some(args) = args.as_object() else {
            continue;
        };
        for (path, operand) in args {
            apply_operator(doc, op, path, operand);
        }
    }
}

fn apply_operator(doc: &mut Value, op: &str, path: &str, operand: &Value) {
    match op {
        "$set" => set_path(doc, path, operand.clone()),
        "$unset" => {
            remove_path(doc, path);
        }
        "$inc" => {
            let current = get_path(doc, path).and_then(Value::as_f64).unwrap_or(0.0);
            let delta = operand.as_f64().unwrap_or(0.0);
            set_path(doc, path, number(current + delta));
        }
        "$mul" => {
            let current = get_path(doc, path).and_then(Value::as_f64).unwrap_or(0.0);
            let factor = operand.as_f64().unwrap_or(0.0);
            set_path(doc, path, number(current * factor));
        }
        "$min" => {
            let keep = get_path(doc, path)
                .and_then(|current| compare(operand, current))
                .is_none_or(|o| o == Ordering::Less);
            if keep {
                set_path(doc, path, operand.clone());
            }
        }
        "$max" => {
            let keep = get_path(doc, path)
                .and_then(|current| compare(operand, current))
                .is_none_or(|o| o == Ordering::Greater);
            if keep {
                set_path(doc, path, operand.clone());
            }
        }
        "$rename" => {
            if let (Some(value), Some(new_name)) = (remove_path(doc, path), operand.as_str()) {
                set_path(doc, new_name, value);
            }
        }
        "$push" => {
            let mut items = get_path(doc, path)
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            match operand.get("$each").and_then(Value::as_array) {
                Some(each) => items.extend(each.iter().cloned()),
                None => items.push(operand.clone()),
            }
            set_path(doc, path, Value::Array(items));
        }
        "$pop" => {
            if let Some(items) = get_path_mut(doc, path).and_then(Value::as_array_mut) {
                match operand.as_i64() {
                    Some(-1) => {
                        if !items.is_empty() {
                            items.remove(0);
                        }
                    }
                    Some(1) => {
                        items.pop();
                    }
                    _ => {}
                }
            }
        }
        "$pull" => {
            if let Some(items) = get_path_mut(doc, path).and_then(Value::as_array_mut) {
                items.retain(|item| !pull_matches(item, operand));
            }
        }
        _ => {}
    }
}

fn pull_matches(item: &Value, operand: &Value) -> bool {
    if let Some(ops) = operand.as_object()
        && ops.keys().any(|k| k.starts_with('$'))
    {
        return ops
            .iter()
            .all(|(op, operand)| matches_operator(Some(item), op, operand));
    }
    value_eq(item, operand)
}

fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}
