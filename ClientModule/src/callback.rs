//! # Callback Table
//!
//! Continuations keyed by Callback-ID. The host answers a `Query` (or a
//! finished animation) with `{"event": "Callback", "id": ..., "data": ...}`
//! and the router looks the continuation up here.
//!
//! There is no timeout: a callback the host never answers stays in the table
//! until [`CallbackTable::remove`] is called for it.

use std::collections::HashMap;
use std::rc::Rc;

use bridge_shared::CallbackId;
use log::debug;
use serde_json::Value;

use crate::bridge::Bridge;

/// A registered continuation
pub enum Callback {
    /// Removed from the table before it runs
    Once(Box<dyn FnOnce(&mut Bridge, Value)>),
    /// Stays registered until cleared
    Persistent(Rc<dyn Fn(&mut Bridge, Value)>),
}

impl Callback {
    pub fn once(f: impl FnOnce(&mut Bridge, Value) + 'static) -> Self {
        Callback::Once(Box::new(f))
    }

    pub fn persistent(f: impl Fn(&mut Bridge, Value) + 'static) -> Self {
        Callback::Persistent(Rc::new(f))
    }

    pub fn invoke(self, bridge: &mut Bridge, data: Value) {
        match self {
            Callback::Once(f) => f(bridge, data),
            Callback::Persistent(f) => f(bridge, data),
        }
    }
}

#[derive(Default)]
pub struct CallbackTable {
    entries: HashMap<CallbackId, Callback>,
}

impl CallbackTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: CallbackId, callback: Callback) {
        debug!("Registered callback {}", id);
        self.entries.insert(id, callback);
    }

    /// Look up a callback for invocation.
    ///
    /// One-shot entries leave the table here, before the caller runs them, so
    /// a re-entrant or duplicate `Callback` for the same ID finds nothing.
    pub fn take(&mut self, id: &str) -> Option<Callback> {
        if let Some(Callback::Persistent(f)) = self.entries.get(id) {
            return Some(Callback::Persistent(Rc::clone(f)));
        }
        self.entries.remove(id)
    }

    /// Drop a callback that will never be answered. Returns whether it existed.
    pub fn remove(&mut self, id: &str) -> bool {
        self.entries.remove(id).is_some()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot_entries_leave_on_take() {
        let mut table = CallbackTable::new();
        table.register("Callback_0".to_string(), Callback::once(|_, _| {}));
        table.register("Callback_1".to_string(), Callback::persistent(|_, _| {}));

        assert!(matches!(table.take("Callback_0"), Some(Callback::Once(_))));
        assert!(table.take("Callback_0").is_none());

        assert!(matches!(table.take("Callback_1"), Some(Callback::Persistent(_))));
        assert!(table.contains("Callback_1"));
        assert!(table.remove("Callback_1"));
        assert!(!table.remove("Callback_1"));
        assert!(table.is_empty());
    }
}
