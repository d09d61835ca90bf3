//! The typed attribute tree exchanged with the host.

use crate::path::{AttrPath, PathStep};
use crate::{Error, Result};
use serde_json::Number;
use std::collections::BTreeMap;

/// A node of the host's typed attribute tree.
///
/// Every non-null leaf matches the kind declared by its schema node; the
/// tree itself carries no schema. Set elements have no identity: two sets
/// are equal when they hold the same elements, in any order.
#[derive(Debug, Clone)]
pub enum TypedValue {
    /// Explicit absence of a value.
    Null,
    /// Not yet determined (known only after apply).
    Unknown,
    Bool(bool),
    Number(Number),
    String(String),
    /// Ordered collection.
    List(Vec<TypedValue>),
    /// Unordered collection, compared by deep structural equality.
    Set(Vec<TypedValue>),
    /// Object with a fixed attribute set.
    Object(BTreeMap<String, TypedValue>),
    /// Map with arbitrary keys.
    Map(BTreeMap<String, TypedValue>),
}

static NULL: TypedValue = TypedValue::Null;

impl TypedValue {
    /// A shared null, for lookups that default to null.
    pub fn null_ref() -> &'static TypedValue {
        &NULL
    }

    /// Builds a string value.
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    /// Builds a number value from anything `serde_json::Number` accepts.
    pub fn number(n: impl Into<Number>) -> Self {
        Self::Number(n.into())
    }

    /// Builds an object from `(name, value)` pairs.
    pub fn object<I, K>(attrs: I) -> Self
    where
        I: IntoIterator<Item = (K, TypedValue)>,
        K: Into<String>,
    {
        Self::Object(attrs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Returns a short name of the variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Unknown => "unknown",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Object(_) => "object",
            Self::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Returns true if the value is null or unknown.
    pub fn is_null_or_unknown(&self) -> bool {
        matches!(self, Self::Null | Self::Unknown)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Self::Number(n) => Some(n),
            _ => None,
        }
    }

    /// Returns the attributes of an object value.
    pub fn as_object(&self) -> Option<&BTreeMap<String, TypedValue>> {
        match self {
            Self::Object(attrs) => Some(attrs),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut BTreeMap<String, TypedValue>> {
        match self {
            Self::Object(attrs) => Some(attrs),
            _ => None,
        }
    }

    /// Returns the elements of a list or set value.
    pub fn elements(&self) -> Option<&[TypedValue]> {
        match self {
            Self::List(items) | Self::Set(items) => Some(items),
            _ => None,
        }
    }

    /// Returns a top-level attribute of an object value.
    pub fn get_attr(&self, name: &str) -> Option<&TypedValue> {
        self.as_object().and_then(|attrs| attrs.get(name))
    }

    /// Returns the string value of a top-level attribute, if set.
    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.get_attr(name).and_then(TypedValue::as_str)
    }

    /// Looks up the node at `path`.
    pub fn get(&self, path: &AttrPath) -> Option<&TypedValue> {
        let mut current = self;
        for step in path.steps() {
            current = match (step, current) {
                (PathStep::Attr(name), Self::Object(attrs)) => attrs.get(name)?,
                (PathStep::Key(key), Self::Map(entries)) => entries.get(key)?,
                (PathStep::Index(i), Self::List(items) | Self::Set(items)) => items.get(*i)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Replaces the node at `path` with `value`.
    ///
    /// Object attributes and map keys are inserted if missing; every
    /// intermediate node must already exist.
    pub fn set(&mut self, path: &AttrPath, value: TypedValue) -> Result<()> {
        let Some((last, parents)) = path.steps().split_last() else {
            *self = value;
            return Ok(());
        };

        let mut current = self;
        let mut walked = AttrPath::root();
        for step in parents {
            current = match (step, current) {
                (PathStep::Attr(name), Self::Object(attrs)) => attrs
                    .get_mut(name)
                    .ok_or_else(|| Error::PathNotFound(walked.join_attr(name.clone())))?,
                (PathStep::Key(key), Self::Map(entries)) => entries
                    .get_mut(key)
                    .ok_or_else(|| Error::PathNotFound(walked.join_key(key.clone())))?,
                (PathStep::Index(i), Self::List(items) | Self::Set(items)) => {
                    items.get_mut(*i).ok_or(Error::IndexOutOfBounds {
                        path: walked.clone(),
                        index: *i,
                    })?
                }
                (_, other) => {
                    return Err(Error::NotAContainer {
                        path: walked,
                        kind: other.kind_name(),
                    });
                }
            };
            walked = match step {
                PathStep::Attr(name) => walked.join_attr(name.clone()),
                PathStep::Key(key) => walked.join_key(key.clone()),
                PathStep::Index(i) => walked.join_index(*i),
            };
        }

        match (last, current) {
            (PathStep::Attr(name), Self::Object(attrs)) => {
                attrs.insert(name.clone(), value);
                Ok(())
            }
            (PathStep::Key(key), Self::Map(entries)) => {
                entries.insert(key.clone(), value);
                Ok(())
            }
            (PathStep::Index(i), Self::List(items) | Self::Set(items)) => {
                let slot = items.get_mut(*i).ok_or(Error::IndexOutOfBounds {
                    path: walked,
                    index: *i,
                })?;
                *slot = value;
                Ok(())
            }
            (_, other) => Err(Error::NotAContainer {
                path: walked,
                kind: other.kind_name(),
            }),
        }
    }
}

impl PartialEq for TypedValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) | (Self::Unknown, Self::Unknown) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => numbers_equal(a, b),
            (Self::String(a), Self::String(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Set(a), Self::Set(b)) => multiset_equal(a, b),
            (Self::Object(a), Self::Object(b)) | (Self::Map(a), Self::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for TypedValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for TypedValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for TypedValue {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

// `1` and `1.0` are the same number to the host.
fn numbers_equal(a: &Number, b: &Number) -> bool {
    if a == b {
        return true;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn multiset_equal(a: &[TypedValue], b: &[TypedValue]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut matched = vec![false; b.len()];
    a.iter().all(|item| {
        let found = b
            .iter()
            .enumerate()
            .find(|(i, candidate)| !matched[*i] && *candidate == item)
            .map(|(i, _)| i);
        match found {
            Some(i) => {
                matched[i] = true;
                true
            }
            None => false,
        }
    })
}
