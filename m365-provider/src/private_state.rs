//! Host-persisted private resource state.
//!
//! The host stores these bytes next to the resource's state but never shows
//! them in a plan or diffs them.

use std::collections::HashMap;

/// Opaque per-instance key/value store owned by the host.
pub trait PrivateState: Send + Sync {
    fn get_key(&self, key: &str) -> Option<Vec<u8>>;

    fn set_key(&mut self, key: &str, value: Vec<u8>);
}

/// In-memory private state, for hosts that hand over a plain map and for
/// tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryPrivateState {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryPrivateState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, key: impl Into<String>, value: Vec<u8>) -> Self {
        self.entries.insert(key.into(), value);
        self
    }

    pub fn into_entries(self) -> HashMap<String, Vec<u8>> {
        self.entries
    }
}

impl PrivateState for MemoryPrivateState {
    fn get_key(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.get(key).cloned()
    }

    fn set_key(&mut self, key: &str, value: Vec<u8>) {
        self.entries.insert(key.to_string(), value);
    }
}
