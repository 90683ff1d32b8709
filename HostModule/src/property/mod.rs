//! # Property System
//!
//! Path resolution against the live object graph. The accessor engine walks a
//! parsed [`Path`] one step at a time; `conversion` turns resolved nodes back
//! into wire JSON.
//!
//! Resolution failures are always local: one bad path never aborts the rest
//! of an operation or batch.

use std::collections::BTreeMap;

use bridge_shared::{ExpressionError, ParseError, Path};
use log::warn;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::object::{Node, ObjectStore};
use crate::resource::ResourceProvider;

// Submodules
pub mod accessor;
pub mod conversion;

pub use accessor::{assign, resolve_get, resolve_set};
pub use conversion::node_to_json;

/// Why a path could not be resolved against an object graph
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolutionError {
    #[error("{type_name} has no member `{member}`")]
    NoSuchMember { member: String, type_name: String },

    #[error("{type_name} has no component `{component}`")]
    NoSuchComponent { component: String, type_name: String },

    #[error("{type_name} has no child `{child}`")]
    NoSuchChild { child: String, type_name: String },

    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("no key `{key}`")]
    NoSuchKey { key: String },

    #[error("{type_name} has no method `{method}`")]
    NoSuchMethod { method: String, type_name: String },

    #[error("unknown step type `{tag}`")]
    UnknownStepType { tag: String },

    #[error("{type_name} is not an ordered container")]
    NotIndexable { type_name: String },

    #[error("{type_name} is not a keyed container")]
    NotKeyed { type_name: String },

    #[error("`{step}` needs a live object, found {found}")]
    NotAnObject { step: String, found: String },

    #[error("member `{member}` of {type_name} is read-only")]
    ReadOnly { member: String, type_name: String },

    #[error("`{step}` steps cannot be assigned")]
    NotAssignable { step: String },

    #[error("unknown object ID `{id}`")]
    UnknownObjectId { id: String },

    #[error("object ID `{id}` is already registered")]
    DuplicateObjectId { id: String },

    #[error("no resource `{name}`")]
    NoSuchResource { name: String },

    #[error("invalid {step_type} literal `{value}`")]
    InvalidLiteral { step_type: String, value: String },

    #[error("expected {expected}, found {found}")]
    TypeMismatch { expected: &'static str, found: String },

    #[error("cannot attach an object to itself via `{parent}`")]
    AttachToSelf { parent: String },

    /// The object is already borrowed further up the call stack
    #[error("object is busy")]
    ObjectBusy,

    #[error(transparent)]
    Expression(#[from] ExpressionError),

    #[error("method `{method}` failed: {message}")]
    Method { method: String, message: String },

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Everything besides the root that a path may reach
#[derive(Clone, Copy)]
pub struct ResolveContext<'a> {
    pub store: &'a ObjectStore,
    pub resources: &'a dyn ResourceProvider,
}

impl<'a> ResolveContext<'a> {
    pub fn new(store: &'a ObjectStore, resources: &'a dyn ResourceProvider) -> Self {
        Self { store, resources }
    }
}

/// Resolve every entry of a query map against `root`.
///
/// Keys whose path fails are logged and omitted; the rest still resolve.
pub fn resolve_query(
    ctx: ResolveContext<'_>,
    root: &Node,
    query: &BTreeMap<String, Path>,
) -> Map<String, Value> {
    let mut results = Map::new();
    for (key, path) in query {
        match resolve_get(ctx, root, path) {
            Ok(node) => {
                results.insert(key.clone(), node_to_json(ctx.store, &node));
            }
            Err(err) => warn!("Query key `{}` ({}) failed: {}", key, path, err),
        }
    }
    results
}
