//! # Client-side Object System
//!
//! Caller-side record of every object the bridge has asked the host to
//! create: its ID, the kind it was created from, its lifecycle state and the
//! interest handlers that route host events back to caller code.
//!
//! Handlers never cross the wire. Only their [`InterestSpec`] (the query) is
//! sent; the closures stay in this table keyed by event name.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use bridge_shared::{InterestSpec, ObjectId, ObjectLifecycleState, ParseError};
use log::debug;
use serde_json::Value;

use crate::bridge::Bridge;

/// Caller code run when the host raises an event the caller is interested in.
/// Receives the bridge, the object ID and the event data.
pub type InterestHandler = Rc<dyn Fn(&mut Bridge, &str, &Value)>;

/// An event subscription on one object
#[derive(Clone)]
pub struct Interest {
    /// Wire half: what the host should resolve when the event fires
    pub spec: InterestSpec,
    handler: InterestHandler,
}

impl Interest {
    pub fn new(spec: InterestSpec, handler: impl Fn(&mut Bridge, &str, &Value) + 'static) -> Self {
        Self {
            spec,
            handler: Rc::new(handler),
        }
    }

    /// Build an interest from `(output key, path)` query pairs
    pub fn on<'a>(
        query: impl IntoIterator<Item = (&'a str, &'a str)>,
        handler: impl Fn(&mut Bridge, &str, &Value) + 'static,
    ) -> Result<Self, ParseError> {
        Ok(Self::new(InterestSpec::from_query(query)?, handler))
    }

    /// Shared handle to the handler, so it can run while the bridge is borrowed mutably
    pub fn handler(&self) -> InterestHandler {
        Rc::clone(&self.handler)
    }
}

impl fmt::Debug for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interest").field("spec", &self.spec).finish_non_exhaustive()
    }
}

/// Caller-side view of a host object
#[derive(Debug, Clone)]
pub struct ClientObject {
    /// Opaque Object-ID issued by this bridge
    pub id: ObjectId,

    /// Prefab, component or default kind the ID was derived from
    pub kind: String,

    /// Current lifecycle state
    pub state: ObjectLifecycleState,

    /// Event name -> interest
    pub interests: BTreeMap<String, Interest>,
}

impl ClientObject {
    pub fn new(id: ObjectId, kind: impl Into<String>, interests: BTreeMap<String, Interest>) -> Self {
        Self {
            id,
            kind: kind.into(),
            state: ObjectLifecycleState::Requested,
            interests,
        }
    }

    /// Whether the host has confirmed the object with `Created`
    pub fn is_active(&self) -> bool {
        self.state == ObjectLifecycleState::Active
    }
}

/// Object-ID -> object for one bridge
#[derive(Debug, Default)]
pub struct ObjectTable {
    objects: HashMap<ObjectId, ClientObject>,
}

impl ObjectTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, object: ClientObject) {
        debug!("Tracking object {} ({})", object.id, object.kind);
        self.objects.insert(object.id.clone(), object);
    }

    pub fn remove(&mut self, id: &str) -> Option<ClientObject> {
        self.objects.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&ClientObject> {
        self.objects.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ClientObject> {
        self.objects.get_mut(id)
    }

    /// An object that still accepts operations (not destroyed, not being destroyed)
    pub fn live_mut(&mut self, id: &str) -> Option<&mut ClientObject> {
        self.objects
            .get_mut(id)
            .filter(|object| object.state.accepts_operations())
    }

    pub fn is_live(&self, id: &str) -> bool {
        self.objects
            .get(id)
            .is_some_and(|object| object.state.accepts_operations())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_destroy_is_not_live() {
        let mut table = ObjectTable::new();
        table.insert(ClientObject::new("Ball_0".to_string(), "Ball", BTreeMap::new()));
        assert!(table.is_live("Ball_0"));
        assert!(!table.get("Ball_0").unwrap().is_active());

        table.get_mut("Ball_0").unwrap().state = ObjectLifecycleState::PendingDestroy;
        assert!(!table.is_live("Ball_0"));
        assert!(table.live_mut("Ball_0").is_none());
        assert!(table.get("Ball_0").is_some());
        assert!(!table.is_live("Ball_1"));
    }

    #[test]
    fn interests_parse_their_query() {
        let interest = Interest::on([("where", "transform:Head/position")], |_, _, _| {}).unwrap();
        assert_eq!(interest.spec.query["where"].to_string(), "transform:Head/position");
        assert!(Interest::on([("bad", "a//b")], |_, _, _| {}).is_err());
    }
}
