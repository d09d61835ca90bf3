//! Recursive filtering of raw JSON trees.
//!
//! Used to build a comparison-stable projection of a Graph payload by
//! dropping properties that differ between otherwise identical responses.

use serde_json::{Map, Value};

/// Rebuilds `value` keeping only the entries for which `keep` returns true.
///
/// `keep` receives the path of each entry and its value. Paths are built
/// from `/key` for object members and `[index]` for array elements, e.g.
/// `/children[2]/@odata.type`. The root itself is always kept. When an
/// entry is kept its children are filtered in turn; leaves pass through.
pub fn traverse<F>(value: &Value, mut keep: F) -> Value
where
    F: FnMut(&str, &Value) -> bool,
{
    walk(value, "", &mut keep)
}

fn walk<F>(value: &Value, path: &str, keep: &mut F) -> Value
where
    F: FnMut(&str, &Value) -> bool,
{
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, child) in map {
                let child_path = format!("{path}/{key}");
                if keep(&child_path, child) {
                    out.insert(key.clone(), walk(child, &child_path, keep));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, child) in items.iter().enumerate() {
                let child_path = format!("{path}[{i}]");
                if keep(&child_path, child) {
                    out.push(walk(child, &child_path, keep));
                }
            }
            Value::Array(out)
        }
        leaf => leaf.clone(),
    }
}

/// Returns the object key a traversal path ends in, or `None` when the
/// path ends in an array index.
pub fn last_key(path: &str) -> Option<&str> {
    let segment = path.rsplit('/').next()?;
    if segment.ends_with(']') || path.is_empty() {
        return None;
    }
    Some(segment)
}
