//! # Bridge Coordinator
//!
//! Caller end of the protocol. A [`Bridge`] owns everything one connection
//! needs: the object and callback tables, the two ID allocators and the
//! outbound queue. Instances share no state, so several can run side by side.

use std::collections::BTreeMap;

use bridge_shared::constants::ids::CALLBACK_KIND;
use bridge_shared::{
    Animation, BridgeConfig, CallbackId, CreateTemplate, IdAllocator, InterestSpec,
    ObjectId, ObjectLifecycleState, Operation, OutboundQueue, ParseError, Path, QueryPayload,
    Transport, TransportError,
};
use log::{debug, info};
use serde_json::{Map, Value};

use crate::callback::{Callback, CallbackTable};
use crate::error::BridgeError;
use crate::object::{ClientObject, Interest, ObjectTable};

pub struct Bridge {
    config: BridgeConfig,
    object_ids: IdAllocator,
    callback_ids: IdAllocator,
    pub(crate) objects: ObjectTable,
    pub(crate) callbacks: CallbackTable,
    pub(crate) queue: OutboundQueue,
}

impl Bridge {
    pub fn new(transport: Box<dyn Transport>, config: BridgeConfig) -> Self {
        let mut queue = OutboundQueue::new(transport).with_wire_logging(config.log_wire);
        queue.set_started(config.start_immediate);
        Self {
            config,
            object_ids: IdAllocator::new(),
            callback_ids: IdAllocator::new(),
            objects: ObjectTable::new(),
            callbacks: CallbackTable::new(),
            queue,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Whether the host has sent `StartedUnity`
    pub fn is_started(&self) -> bool {
        self.queue.is_started()
    }

    pub fn object(&self, id: &str) -> Option<&ClientObject> {
        self.objects.get(id)
    }

    pub fn objects(&self) -> &ObjectTable {
        &self.objects
    }

    /// Callbacks still waiting for an answer
    pub fn pending_callbacks(&self) -> usize {
        self.callbacks.len()
    }

    /// Ask the host to instantiate an object.
    ///
    /// The ID is allocated here from the template's kind and written into the
    /// template; interest handlers are kept locally and only their queries are
    /// sent. The object is tracked before the `Create` leaves, so a `Created`
    /// that comes straight back already finds it.
    pub fn create_object(
        &mut self,
        mut template: CreateTemplate,
        interests: BTreeMap<String, Interest>,
    ) -> Result<ObjectId, BridgeError> {
        let kind = template.kind().to_string();
        let id = self.object_ids.make_id(&kind);
        template.id = id.clone();
        template.interests.extend(
            interests
                .iter()
                .map(|(event, interest)| (event.clone(), interest.spec.clone())),
        );

        let op = Operation::create(&template)?;
        self.objects
            .insert(ClientObject::new(id.clone(), kind, interests));
        if let Err(err) = self.queue.send(&op) {
            self.objects.remove(&id);
            return Err(err.into());
        }
        info!("Requested {}", id);
        Ok(id)
    }

    /// Apply `path -> value` assignments. Values may be operation expressions.
    pub fn update_object(&mut self, id: &str, data: Map<String, Value>) -> Result<(), BridgeError> {
        self.require_live(id)?;
        self.queue.send(&Operation::update(id, data))?;
        Ok(())
    }

    /// Resolve each path against the object on the host and hand the
    /// `key -> value` record to `callback`
    pub fn query_object(
        &mut self,
        id: &str,
        query: BTreeMap<String, Path>,
        callback: impl FnOnce(&mut Bridge, Value) + 'static,
    ) -> Result<CallbackId, BridgeError> {
        self.require_live(id)?;
        let callback_id = self.register_callback(Callback::once(callback));
        let payload = QueryPayload {
            query,
            callback_id: Some(callback_id.clone()),
        };
        let sent = Operation::query(id, &payload)
            .map_err(BridgeError::from)
            .and_then(|op| self.queue.send(&op).map_err(BridgeError::from));
        if let Err(err) = sent {
            self.callbacks.remove(&callback_id);
            return Err(err);
        }
        Ok(callback_id)
    }

    /// [`Bridge::query_object`] with `(output key, path)` pairs in text form.
    /// Nothing is sent if any path fails to parse.
    pub fn query_paths<'a>(
        &mut self,
        id: &str,
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
        callback: impl FnOnce(&mut Bridge, Value) + 'static,
    ) -> Result<CallbackId, BridgeError> {
        let query = pairs
            .into_iter()
            .map(|(key, path)| Path::parse(path).map(|path| (key.to_string(), path)))
            .collect::<Result<BTreeMap<_, _>, ParseError>>()?;
        self.query_object(id, query, callback)
    }

    /// Start tweens on the host. Set an animation's `callback_id` from
    /// [`Bridge::register_callback`] to hear when it finishes.
    pub fn animate_object(&mut self, id: &str, animations: &[Animation]) -> Result<(), BridgeError> {
        self.require_live(id)?;
        self.queue.send(&Operation::animate(id, animations)?)?;
        Ok(())
    }

    /// Ask the host to destroy an object.
    ///
    /// The ID stops accepting operations at once. The entry itself stays until
    /// `Destroyed` arrives so a `Destroyed` interest can still run.
    pub fn destroy_object(&mut self, id: &str) -> Result<(), BridgeError> {
        let object = self
            .objects
            .live_mut(id)
            .ok_or_else(|| BridgeError::UnknownObjectId(id.to_string()))?;
        object.state = ObjectLifecycleState::PendingDestroy;
        self.queue.send(&Operation::destroy(id))?;
        info!("Requested destruction of {}", id);
        Ok(())
    }

    /// Add, replace (`Some`) or remove (`None`) interests on an object.
    ///
    /// The local table changes before the operation is queued, so events
    /// arriving after this call already see the new mapping.
    pub fn update_interests(
        &mut self,
        id: &str,
        changes: BTreeMap<String, Option<Interest>>,
    ) -> Result<(), BridgeError> {
        let object = self
            .objects
            .live_mut(id)
            .ok_or_else(|| BridgeError::UnknownObjectId(id.to_string()))?;

        let mut wire: BTreeMap<String, Option<InterestSpec>> = BTreeMap::new();
        for (event, change) in changes {
            match change {
                Some(interest) => {
                    wire.insert(event.clone(), Some(interest.spec.clone()));
                    object.interests.insert(event, interest);
                }
                None => {
                    object.interests.remove(&event);
                    wire.insert(event, None);
                }
            }
        }
        self.queue.send(&Operation::update_interests(id, &wire)?)?;
        Ok(())
    }

    pub fn set_globals(&mut self, globals: Map<String, Value>) -> Result<(), BridgeError> {
        self.queue.send(&Operation::set_globals(globals))?;
        Ok(())
    }

    /// Write a line to the host's log
    pub fn log(&mut self, line: &str) -> Result<(), BridgeError> {
        self.queue.send(&Operation::log(line))?;
        Ok(())
    }

    /// Register a continuation under a fresh Callback-ID
    pub fn register_callback(&mut self, callback: Callback) -> CallbackId {
        let id = self.callback_ids.make_id(CALLBACK_KIND);
        self.callbacks.register(id.clone(), callback);
        id
    }

    /// Forget a callback the host will never answer. Returns whether it was pending.
    pub fn clear_callback(&mut self, id: &str) -> bool {
        let removed = self.callbacks.remove(id);
        if removed {
            debug!("Cleared callback {}", id);
        }
        removed
    }

    /// Run the flush scheduled during this turn, if any
    pub fn tick(&mut self) -> Result<(), TransportError> {
        self.queue.tick()
    }

    /// Send everything queued right away
    pub fn flush(&mut self) -> Result<(), TransportError> {
        self.queue.flush()
    }

    fn require_live(&self, id: &str) -> Result<(), BridgeError> {
        if self.objects.is_live(id) {
            Ok(())
        } else {
            Err(BridgeError::UnknownObjectId(id.to_string()))
        }
    }
}
