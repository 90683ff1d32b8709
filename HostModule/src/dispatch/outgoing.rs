//! # Outgoing Operations
//!
//! Host -> caller traffic: lifecycle markers, callback replies, reported
//! updates and interest-routed events. Everything goes through the outbound
//! queue and leaves with the next flush.

use bridge_shared::constants::events;
use bridge_shared::{EventName, Operation};
use log::{debug, info};
use serde_json::{Map, Value};

use super::{Host, HostError};
use crate::object::Node;
use crate::property::resolve_query;

impl Host {
    /// Tell the caller the host is ready to accept operations
    pub fn announce_started(&mut self) {
        info!("Host started");
        self.send_logged(Operation::started());
        if let Err(err) = self.flush() {
            debug!("Start marker not delivered: {}", err);
        }
    }

    /// Raise `event` on an object.
    ///
    /// If the caller registered interest in it, the interest's query is
    /// resolved against the object and sent as the event data. Returns
    /// whether anything was sent; events nobody is interested in are dropped.
    pub fn emit_event(&mut self, id: &str, event: &str) -> Result<bool, HostError> {
        self.emit_event_with(id, event, Map::new())
    }

    /// Like [`Host::emit_event`], with extra host data merged under the
    /// query results
    pub fn emit_event_with(
        &mut self,
        id: &str,
        event: &str,
        mut data: Map<String, Value>,
    ) -> Result<bool, HostError> {
        self.require_object(id)?;
        let Some(Value::Object(results)) = self.interest_data(id, event) else {
            debug!("No interest in {} on {}; dropped", event, id);
            return Ok(false);
        };
        data.extend(results);
        self.queue
            .send(&Operation::event(event, id, Value::Object(data)))?;
        Ok(true)
    }

    pub fn send_callback(&mut self, callback_id: &str, data: Value) -> Result<(), HostError> {
        self.queue.send(&Operation::callback(callback_id, data))?;
        Ok(())
    }

    /// Resolve the query of the interest registered for `event`, if any
    pub(super) fn interest_data(&self, id: &str, event: &str) -> Option<Value> {
        let entry = self.store.entry(id)?;
        let spec = entry.interests.get(event)?;
        let root = Node::Object(entry.handle.clone());
        Some(Value::Object(resolve_query(self.ctx(), &root, &spec.query)))
    }

    pub(super) fn send_created(&mut self, id: &str) -> Result<(), HostError> {
        let data = self.interest_data(id, events::CREATED);
        self.queue.send(&Operation::new(
            EventName::Created,
            Some(id.to_string()),
            data,
        ))?;
        Ok(())
    }

    pub(super) fn send_destroyed(&mut self, id: &str, data: Option<Value>) -> Result<(), HostError> {
        self.queue.send(&Operation::new(
            EventName::Destroyed,
            Some(id.to_string()),
            data,
        ))?;
        Ok(())
    }

    /// Values written by `reportUpdate` expressions travel as one `Updated` event
    pub(super) fn report_updates(&mut self, id: &str, reported: Map<String, Value>) -> Result<(), HostError> {
        if reported.is_empty() {
            return Ok(());
        }
        self.queue
            .send(&Operation::event(events::UPDATED, id, Value::Object(reported)))?;
        Ok(())
    }
}
