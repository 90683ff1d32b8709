//! # Event / Interest Router
//!
//! Routes inbound host operations to caller code:
//! - `Callback` -> the continuation registered under that Callback-ID
//! - `StartedUnity` -> switch the outbound queue to per-turn batching
//! - `Created` / `Destroyed` -> lifecycle bookkeeping, then any interest
//! - anything else -> the interest registered for that event on that object
//!
//! Nothing here fails upward. An operation that matches nothing is logged
//! and dropped, and the rest of the batch is still delivered.

use bridge_shared::{decode_batch, EventName, ObjectLifecycleState, Operation};
use log::{debug, info, trace, warn};
use serde_json::Value;

use crate::bridge::Bridge;

impl Bridge {
    /// Decode one inbound batch and distribute each operation in order
    pub fn receive_batch(&mut self, raw: &str) {
        if self.config().log_wire {
            trace!("<- {}", raw);
        }
        match decode_batch(raw) {
            Ok(ops) => {
                for op in ops {
                    self.distribute(op);
                }
            }
            Err(err) => warn!("Dropping malformed batch: {}", err),
        }
    }

    /// Route a single inbound operation
    pub fn distribute(&mut self, op: Operation) {
        let data = op.data.unwrap_or(Value::Null);
        let Some(id) = op.id else {
            match op.event {
                EventName::Started => self.on_started(),
                other => warn!("{} without an ID dropped", other),
            }
            return;
        };

        match op.event {
            EventName::Callback => self.on_callback(&id, data),
            EventName::Started => self.on_started(),
            EventName::Created => self.on_created(&id, &data),
            EventName::Destroyed => self.on_destroyed(&id, &data),
            EventName::Custom(event) => self.dispatch_interest(&event, &id, &data),
            other => warn!("{} is not an inbound event; dropped", other),
        }
    }

    fn on_started(&mut self) {
        info!("Host started");
        self.queue.set_started(true);
        // Anything queued before the handshake goes out now
        if let Err(err) = self.queue.flush() {
            debug!("Early sends not delivered: {}", err);
        }
    }

    fn on_callback(&mut self, id: &str, data: Value) {
        match self.callbacks.take(id) {
            Some(callback) => callback.invoke(self, data),
            None => warn!("Callback {} is not pending; dropped", id),
        }
    }

    fn on_created(&mut self, id: &str, data: &Value) {
        match self.objects.get_mut(id) {
            Some(object) if object.state == ObjectLifecycleState::Requested => {
                object.state = ObjectLifecycleState::Active;
            }
            Some(_) => {}
            None => {
                warn!("Created for unknown object {}; dropped", id);
                return;
            }
        }
        self.run_interest(id, EventName::Created.as_str(), data);
    }

    /// The `Destroyed` interest runs before the entry is removed
    fn on_destroyed(&mut self, id: &str, data: &Value) {
        if self.objects.get(id).is_none() {
            warn!("Destroyed for unknown object {}; dropped", id);
            return;
        }
        self.run_interest(id, EventName::Destroyed.as_str(), data);
        self.objects.remove(id);
        debug!("Forgot object {}", id);
    }

    fn dispatch_interest(&mut self, event: &str, id: &str, data: &Value) {
        if self.objects.get(id).is_none() {
            warn!("{} for unknown object {}; dropped", event, id);
            return;
        }
        self.run_interest(id, event, data);
    }

    fn run_interest(&mut self, id: &str, event: &str, data: &Value) {
        let handler = self
            .objects
            .get(id)
            .and_then(|object| object.interests.get(event))
            .map(|interest| interest.handler());
        match handler {
            Some(handler) => handler(self, id, data),
            None => debug!("No interest in {} on {}", event, id),
        }
    }
}
