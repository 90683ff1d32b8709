//! # Operation Dispatch (Host-Side)
//!
//! The [`Host`] owns the object store and applies inbound operations to it:
//! - `handlers`: one function per inbound operation kind
//! - `outgoing`: lifecycle markers, interest events and callback replies
//!
//! Every operation in a batch is applied independently. A failure is logged
//! with the event name and object ID and the rest of the batch continues;
//! the wire has no error channel back to the caller.

use bridge_shared::{
    decode_batch, CodecError, EventName, HostConfig, ObjectId, Operation, OutboundQueue, Path,
    SendError, Transport, TransportError,
};
use log::{debug, trace, warn};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::animation::Animator;
use crate::object::{ClassRegistry, Node, ObjectHandle, ObjectStore};
use crate::property::{node_to_json, resolve_get, ResolutionError, ResolveContext};
use crate::resource::{MemoryResources, ResourceProvider};

// Submodules
pub mod handlers;
pub mod outgoing;

/// Why an inbound operation could not be applied
#[derive(Debug, Error)]
pub enum HostError {
    #[error("`{event}` operation has no object ID")]
    MissingId { event: String },

    #[error("unknown object ID `{0}`")]
    UnknownObjectId(ObjectId),

    #[error("unknown prefab `{0}`")]
    UnknownPrefab(String),

    #[error("unknown component `{0}`")]
    UnknownComponent(String),

    #[error("`{0}` is not an operation the host accepts")]
    UnexpectedEvent(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Send(#[from] SendError),
}

/// Host end of the bridge
pub struct Host {
    config: HostConfig,
    store: ObjectStore,
    classes: ClassRegistry,
    resources: Box<dyn ResourceProvider>,
    globals: Map<String, Value>,
    animator: Animator,
    queue: OutboundQueue,
}

impl Host {
    /// Create a host that talks to the caller through `transport`.
    ///
    /// Sends `StartedUnity` right away when the config asks for it.
    pub fn new(transport: Box<dyn Transport>, config: HostConfig) -> Self {
        let mut queue = OutboundQueue::new(transport).with_wire_logging(config.log_wire);
        // Host sends are batched per frame from the start
        queue.set_started(true);

        let mut host = Self {
            config,
            store: ObjectStore::new(),
            classes: ClassRegistry::new(),
            resources: Box::new(MemoryResources::new()),
            globals: Map::new(),
            animator: Animator::new(),
            queue,
        };
        if host.config.send_started_on_attach {
            host.announce_started();
        }
        host
    }

    pub fn with_classes(mut self, classes: ClassRegistry) -> Self {
        self.classes = classes;
        self
    }

    pub fn with_resources(mut self, resources: impl ResourceProvider + 'static) -> Self {
        self.resources = Box::new(resources);
        self
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn classes_mut(&mut self) -> &mut ClassRegistry {
        &mut self.classes
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    pub fn object(&self, id: &str) -> Option<ObjectHandle> {
        self.store.get(id)
    }

    pub fn globals(&self) -> &Map<String, Value> {
        &self.globals
    }

    /// Make a host-owned object addressable by the caller
    pub fn register_object(&mut self, id: &str, object: ObjectHandle) -> Result<(), HostError> {
        self.store.insert(id, object)?;
        Ok(())
    }

    /// Resolve a path against a registered object and encode the result
    pub fn resolve(&self, id: &str, path: &str) -> Result<Value, HostError> {
        let root = Node::Object(self.require_object(id)?);
        let path = Path::parse(path).map_err(ResolutionError::from)?;
        let node = resolve_get(self.ctx(), &root, &path)?;
        Ok(node_to_json(&self.store, &node))
    }

    /// Decode and apply one inbound batch, then flush whatever it produced
    pub fn receive_batch(&mut self, raw: &str) {
        if self.config.log_wire {
            trace!("<- {}", raw);
        }
        let ops = match decode_batch(raw) {
            Ok(ops) => ops,
            Err(err) => {
                warn!("Dropping malformed batch: {}", err);
                return;
            }
        };

        for op in ops {
            let event = op.event.clone();
            let id = subject_id(&op).to_string();
            match self.apply(op) {
                Ok(()) => {}
                Err(HostError::UnknownObjectId(id)) if !self.config.report_unknown_objects => {
                    debug!("{} for unknown object {} ignored", event, id);
                }
                Err(err) => warn!("{} {} failed: {}", event, id, err),
            }
        }
        if let Err(err) = self.flush() {
            debug!("Replies to batch not delivered: {}", err);
        }
    }

    /// Apply a single decoded operation
    pub fn apply(&mut self, op: Operation) -> Result<(), HostError> {
        match &op.event {
            EventName::Create => self.create(op.payload()?),
            EventName::Update => self.update(require_id(&op)?, op.payload()?),
            EventName::Query => self.query(require_id(&op)?, op.payload()?),
            EventName::Animate => self.animate(require_id(&op)?, op.payload()?),
            EventName::UpdateInterests => self.update_interests(require_id(&op)?, op.payload()?),
            EventName::Destroy => self.destroy(require_id(&op)?),
            EventName::SetGlobals => self.set_globals(op.payload()?),
            EventName::Log => self.log(op.payload()?),
            other => Err(HostError::UnexpectedEvent(other.to_string())),
        }
    }

    /// Advance animations by `dt` seconds and flush this frame's sends
    pub fn tick(&mut self, dt: f64) {
        let completed = {
            let ctx = ResolveContext::new(&self.store, self.resources.as_ref());
            self.animator.advance(ctx, dt)
        };
        for done in completed {
            if let Some(callback_id) = done.callback_id {
                self.send_logged(Operation::callback(&callback_id, done.value));
            }
        }
        if let Err(err) = self.queue.tick() {
            debug!("Frame sends not delivered: {}", err);
        }
    }

    /// Send everything queued so far. Failures are logged by the queue.
    pub fn flush(&mut self) -> Result<(), TransportError> {
        self.queue.flush()
    }

    fn ctx(&self) -> ResolveContext<'_> {
        ResolveContext::new(&self.store, self.resources.as_ref())
    }

    fn require_object(&self, id: &str) -> Result<ObjectHandle, HostError> {
        self.store
            .get(id)
            .ok_or_else(|| HostError::UnknownObjectId(id.to_string()))
    }

    fn send_logged(&mut self, op: Operation) {
        if let Err(err) = self.queue.send(&op) {
            warn!("Could not send {}: {}", op.event, err);
        }
    }
}

/// Object an operation is about; `Create` carries its ID in the template
fn subject_id(op: &Operation) -> &str {
    match (&op.event, op.id.as_deref()) {
        (_, Some(id)) if !id.is_empty() => id,
        (EventName::Create, _) => op
            .data
            .as_ref()
            .and_then(|data| data.get("id"))
            .and_then(Value::as_str)
            .unwrap_or_default(),
        _ => "",
    }
}

fn require_id(op: &Operation) -> Result<&str, HostError> {
    op.id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| HostError::MissingId {
            event: op.event.to_string(),
        })
}

/// Unwrap a node that must be a live object
fn as_object(node: Node, step: &str) -> Result<ObjectHandle, ResolutionError> {
    match node {
        Node::Object(handle) => Ok(handle),
        other => Err(ResolutionError::NotAnObject {
            step: step.to_string(),
            found: other.describe(),
        }),
    }
}
