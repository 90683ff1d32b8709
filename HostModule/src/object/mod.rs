//! # Host Object Module
//!
//! The live object model the accessor engine walks. Every addressable host
//! type implements [`HostObject`]; plain data (arrays, records, scalars) is
//! carried as JSON inside [`Node::Value`]. The [`ObjectStore`] maps opaque
//! Object-IDs to handles and holds the interest registrations pushed by the
//! caller.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use bridge_shared::{InterestSpec, ObjectId};
use log::{debug, warn};
use serde_json::Value;

use crate::property::ResolutionError;

// Submodules
pub mod class; // Prefab and component factories
pub mod game_object; // Generic scene object and component
pub mod members; // Member registration tables

pub use class::ClassRegistry;
pub use game_object::{Behaviour, GameObject};
pub use members::MemberTable;

/// Shared, single-threaded reference to a live object
pub type ObjectHandle = Rc<RefCell<dyn HostObject>>;

/// Wrap a host object into a handle
pub fn handle<T: HostObject + 'static>(object: T) -> ObjectHandle {
    Rc::new(RefCell::new(object))
}

/// What a path step can land on: plain data or a live object
#[derive(Clone)]
pub enum Node {
    /// JSON arrays are ordered containers, JSON objects keyed containers,
    /// everything else a scalar
    Value(Value),
    Object(ObjectHandle),
}

impl Node {
    pub fn null() -> Self {
        Node::Value(Value::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Value(Value::Null))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Node::Value(value) => Some(value),
            Node::Object(_) => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectHandle> {
        match self {
            Node::Object(handle) => Some(handle),
            Node::Value(_) => None,
        }
    }

    /// Short description used in error messages
    pub fn describe(&self) -> String {
        match self {
            Node::Value(Value::Null) => "null".to_string(),
            Node::Value(Value::Bool(_)) => "boolean".to_string(),
            Node::Value(Value::Number(_)) => "number".to_string(),
            Node::Value(Value::String(_)) => "string".to_string(),
            Node::Value(Value::Array(_)) => "array".to_string(),
            Node::Value(Value::Object(_)) => "record".to_string(),
            Node::Object(handle) => match handle.try_borrow() {
                Ok(object) => object.type_name().to_string(),
                Err(_) => "object".to_string(),
            },
        }
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        Node::Value(value)
    }
}

impl From<ObjectHandle> for Node {
    fn from(handle: ObjectHandle) -> Self {
        Node::Object(handle)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Node::Object(_) => f.debug_tuple("Object").field(&self.describe()).finish(),
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Node::Value(a), Node::Value(b)) => a == b,
            (Node::Object(a), Node::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Capabilities a live host object exposes to the accessor engine.
///
/// Only `type_name`, `get_member` and `set_member` are required. Everything
/// else defaults to "not supported", which the accessor reports as the
/// matching resolution error.
pub trait HostObject {
    fn type_name(&self) -> &str;

    fn get_member(&self, name: &str) -> Option<Node>;

    fn set_member(&mut self, name: &str, value: Node) -> Result<(), ResolutionError>;

    fn component(&self, _type_name: &str) -> Option<ObjectHandle> {
        None
    }

    fn add_component(&mut self, component: ObjectHandle) -> Result<(), ResolutionError> {
        Err(ResolutionError::NoSuchComponent {
            component: describe_handle(&component),
            type_name: self.type_name().to_string(),
        })
    }

    /// Named child in the transform hierarchy
    fn child(&self, _name: &str) -> Option<ObjectHandle> {
        None
    }

    fn add_child(
        &mut self,
        child: ObjectHandle,
        _world_position_stays: bool,
    ) -> Result<(), ResolutionError> {
        Err(ResolutionError::NoSuchChild {
            child: describe_handle(&child),
            type_name: self.type_name().to_string(),
        })
    }

    /// `None` when no method of that name exists
    fn invoke(&mut self, _method: &str, _args: Vec<Value>) -> Option<Result<Node, String>> {
        None
    }

    fn get_index(&self, _index: usize) -> Result<Node, ResolutionError> {
        Err(ResolutionError::NotIndexable {
            type_name: self.type_name().to_string(),
        })
    }

    fn set_index(&mut self, _index: usize, _value: Node) -> Result<(), ResolutionError> {
        Err(ResolutionError::NotIndexable {
            type_name: self.type_name().to_string(),
        })
    }

    fn get_key(&self, _key: &str) -> Result<Node, ResolutionError> {
        Err(ResolutionError::NotKeyed {
            type_name: self.type_name().to_string(),
        })
    }

    fn set_key(&mut self, _key: &str, _value: Node) -> Result<(), ResolutionError> {
        Err(ResolutionError::NotKeyed {
            type_name: self.type_name().to_string(),
        })
    }

    /// Template pre/post events addressed to this object
    fn handle_event(&mut self, event: &str, _data: Option<&Value>) {
        debug!("{} ignored event {}", self.type_name(), event);
    }
}

/// Type name of a handle that may already be borrowed mutably up the stack
fn describe_handle(handle: &ObjectHandle) -> String {
    handle
        .try_borrow()
        .map(|object| object.type_name().to_string())
        .unwrap_or_else(|_| "object".to_string())
}

/// One registered object
pub struct StoreEntry {
    pub handle: ObjectHandle,

    /// Event name -> query pushed by the caller
    pub interests: BTreeMap<String, InterestSpec>,
}

fn handle_key(handle: &ObjectHandle) -> usize {
    Rc::as_ptr(handle) as *const () as usize
}

/// Object-ID -> live object mapping.
///
/// The host owns object lifetimes; the store only names them. `remove` is
/// only called when a `Destroy` is applied.
#[derive(Default)]
pub struct ObjectStore {
    objects: HashMap<ObjectId, StoreEntry>,
    ids_by_handle: HashMap<usize, ObjectId>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an object under a fresh ID
    pub fn insert(&mut self, id: &str, handle: ObjectHandle) -> Result<(), ResolutionError> {
        if self.objects.contains_key(id) {
            warn!("Object ID {} is already registered", id);
            return Err(ResolutionError::DuplicateObjectId { id: id.to_string() });
        }
        self.ids_by_handle.insert(handle_key(&handle), id.to_string());
        self.objects.insert(
            id.to_string(),
            StoreEntry {
                handle,
                interests: BTreeMap::new(),
            },
        );
        debug!("Registered object {}", id);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Option<StoreEntry> {
        let entry = self.objects.remove(id)?;
        self.ids_by_handle.remove(&handle_key(&entry.handle));
        debug!("Removed object {}", id);
        Some(entry)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.objects.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<ObjectHandle> {
        self.objects.get(id).map(|entry| Rc::clone(&entry.handle))
    }

    pub fn entry(&self, id: &str) -> Option<&StoreEntry> {
        self.objects.get(id)
    }

    pub fn entry_mut(&mut self, id: &str) -> Option<&mut StoreEntry> {
        self.objects.get_mut(id)
    }

    /// Reverse lookup used when a query result lands on a live object
    pub fn id_of(&self, handle: &ObjectHandle) -> Option<&str> {
        self.ids_by_handle
            .get(&handle_key(handle))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(String::as_str)
    }
}
