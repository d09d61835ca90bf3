//! Unwrapping of collection-shaped responses.

use serde_json::Value;

/// Outcome of reading one entity through a collection endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum SingleItem {
    /// The collection was empty.
    NotFound,
    /// Exactly one element, or a response that was not collection-shaped.
    Found(Value),
    /// More than one element; the response is passed through unchanged.
    Multiple(Value),
}

/// Unwraps a `{"value": [...]}` response expected to hold a single entity.
pub fn unwrap_single(raw: Value) -> SingleItem {
    let Some(items) = raw.get("value").and_then(Value::as_array) else {
        return SingleItem::Found(raw);
    };
    match items.len() {
        0 => SingleItem::NotFound,
        1 => SingleItem::Found(items[0].clone()),
        _ => SingleItem::Multiple(raw),
    }
}
