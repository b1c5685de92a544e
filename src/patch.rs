//! Dotted-path property patches applied to record bodies.
//!
//! Paths are split on `.` so `properties.src:geom` addresses the `src:geom` key of the
//! `properties` object. Keys themselves never contain dots.

use crate::error::{GeoError, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Path -> new value. Ordered so that patches apply deterministically.
pub type Updates = BTreeMap<String, Value>;

pub fn get<'a>(body: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = body;

    for key in path.split('.') {
        current = current.as_object()?.get(key)?;
    }

    Some(current)
}

pub fn assign(body: &mut Value, path: &str, value: Value) -> Result<()> {
    let keys: Vec<&str> = path.split('.').collect();

    if keys.iter().any(|k| k.is_empty()) {
        return Err(GeoError::Patch {
            path: path.to_string(),
            reason: String::from("empty path segment"),
        });
    }

    let (last, parents) = match keys.split_last() {
        Some(split) => split,
        None => {
            return Err(GeoError::Patch {
                path: path.to_string(),
                reason: String::from("empty path"),
            });
        }
    };

    let mut current = body;

    for key in parents {
        let obj = current.as_object_mut().ok_or_else(|| GeoError::Patch {
            path: path.to_string(),
            reason: format!("'{}' is not inside an object", key),
        })?;

        current = obj
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    let obj = current.as_object_mut().ok_or_else(|| GeoError::Patch {
        path: path.to_string(),
        reason: format!("parent of '{}' is not an object", last),
    })?;

    obj.insert(last.to_string(), value);
    Ok(())
}

/// Removes `path` from `body`, returning the old value if there was one.
pub fn remove(body: &mut Value, path: &str) -> Option<Value> {
    let (parent_path, last) = match path.rsplit_once('.') {
        Some((parent, last)) => (Some(parent), last),
        None => (None, path),
    };

    let parent = match parent_path {
        Some(p) => get_mut(body, p)?,
        None => body,
    };

    parent.as_object_mut()?.remove(last)
}

fn get_mut<'a>(body: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut current = body;

    for key in path.split('.') {
        current = current.as_object_mut()?.get_mut(key)?;
    }

    Some(current)
}

pub fn assign_properties(mut body: Value, updates: &Updates) -> Result<Value> {
    for (path, value) in updates {
        assign(&mut body, path, value.clone())?;
    }

    Ok(body)
}

/// Applies `updates` and reports whether any path's value actually differed.
pub fn assign_properties_if_changed(body: &Value, updates: &Updates) -> Result<(bool, Value)> {
    let changed = updates
        .iter()
        .any(|(path, value)| get(body, path) != Some(value));

    if !changed {
        return Ok((false, body.clone()));
    }

    let new_body = assign_properties(body.clone(), updates)?;
    Ok((true, new_body))
}

pub fn remove_properties<S: AsRef<str>>(mut body: Value, paths: &[S]) -> Value {
    for path in paths {
        remove(&mut body, path.as_ref());
    }

    body
}

pub fn get_i64(body: &Value, path: &str) -> Option<i64> {
    get(body, path).and_then(Value::as_i64)
}

pub fn get_f64(body: &Value, path: &str) -> Option<f64> {
    get(body, path).and_then(Value::as_f64)
}

pub fn get_str<'a>(body: &'a Value, path: &str) -> Option<&'a str> {
    get(body, path).and_then(Value::as_str)
}

/// Every integer in the array at `path`; non-integers are skipped.
pub fn get_i64_array(body: &Value, path: &str) -> Vec<i64> {
    match get(body, path).and_then(Value::as_array) {
        Some(values) => values.iter().filter_map(Value::as_i64).collect(),
        None => Vec::new(),
    }
}
