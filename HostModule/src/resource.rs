//! # Resources
//!
//! Named, read-only assets reachable through `resource:` steps.

use std::collections::HashMap;

use serde_json::Value;

use crate::object::Node;

/// Loads a named resource. Returns `None` when nothing by that name exists.
pub trait ResourceProvider {
    fn load(&self, name: &str) -> Option<Node>;
}

/// Resources held in memory, either plain data or live objects
#[derive(Default)]
pub struct MemoryResources {
    entries: HashMap<String, Node>,
}

impl MemoryResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, resource: impl Into<Node>) {
        self.entries.insert(name.to_string(), resource.into());
    }

    pub fn with(mut self, name: &str, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ResourceProvider for MemoryResources {
    fn load(&self, name: &str) -> Option<Node> {
        self.entries.get(name).cloned()
    }
}
