//! # Outbound Queue
//!
//! Batches encoded operations and hands them to a pluggable [`Transport`].
//!
//! Until the far end has started, every `send` flushes immediately. After the
//! boot handshake, sends only mark a flush as scheduled; the owner's event
//! loop calls [`OutboundQueue::tick`] once per turn so that everything sent
//! within one synchronous turn travels as one wire message.

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, error, trace};

use crate::constants::queue::BATCH_SEPARATOR;
use crate::error::{SendError, TransportError};
use crate::operation::{encode, Operation};

/// The single capability the protocol core needs from the outside world
pub trait Transport {
    /// Deliver one batch string to the other end
    fn transmit(&mut self, batch: &str) -> Result<(), TransportError>;
}

/// Closures work as in-process transports
impl<F> Transport for F
where
    F: FnMut(&str) -> Result<(), TransportError>,
{
    fn transmit(&mut self, batch: &str) -> Result<(), TransportError> {
        self(batch)
    }
}

/// Transport that records batches in memory. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    batches: Rc<RefCell<Vec<String>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything transmitted so far
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.batches.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.batches.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.borrow().is_empty()
    }
}

impl Transport for MemoryTransport {
    fn transmit(&mut self, batch: &str) -> Result<(), TransportError> {
        self.batches.borrow_mut().push(batch.to_string());
        Ok(())
    }
}

/// Per-turn batching buffer in front of a transport
pub struct OutboundQueue {
    pending: Vec<String>,
    started: bool,
    flush_scheduled: bool,
    transport: Box<dyn Transport>,
    log_wire: bool,
}

impl OutboundQueue {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            pending: Vec::new(),
            started: false,
            flush_scheduled: false,
            transport,
            log_wire: false,
        }
    }

    pub fn with_wire_logging(mut self, enabled: bool) -> Self {
        self.log_wire = enabled;
        self
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Record that the far end completed its boot handshake
    pub fn set_started(&mut self, started: bool) {
        if self.started != started {
            debug!("Outbound queue started: {}", started);
        }
        self.started = started;
    }

    /// Swap the transport; anything pending goes out through the new one
    pub fn set_transport(&mut self, transport: Box<dyn Transport>) {
        self.transport = transport;
    }

    pub fn is_flush_scheduled(&self) -> bool {
        self.flush_scheduled
    }

    /// Number of encoded operations waiting for the next flush
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Queue an operation, flushing now if the far end has not started yet
    pub fn send(&mut self, op: &Operation) -> Result<(), SendError> {
        self.pending.push(encode(op)?);

        if !self.started {
            self.flush()?;
        } else if !self.flush_scheduled {
            trace!("Scheduling flush for next tick");
            self.flush_scheduled = true;
        }
        Ok(())
    }

    /// Flush now. Cancels any scheduled flush; no-op when nothing is pending.
    pub fn flush(&mut self) -> Result<(), TransportError> {
        self.flush_scheduled = false;
        if self.pending.is_empty() {
            return Ok(());
        }

        let batch = self.pending.join(BATCH_SEPARATOR);
        let count = self.pending.len();
        self.pending.clear();

        if self.log_wire {
            trace!("-> {}", batch);
        }
        debug!("Flushing {} operation(s)", count);

        self.transport.transmit(&batch).map_err(|err| {
            // The wire has no retry or NACK; the batch is gone
            error!("Dropped batch of {} operation(s): {}", count, err);
            err
        })
    }

    /// Run a scheduled flush, if any
    pub fn tick(&mut self) -> Result<(), TransportError> {
        if self.flush_scheduled {
            self.flush()
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> (OutboundQueue, MemoryTransport) {
        let _ = env_logger::builder().is_test(true).try_init();
        let transport = MemoryTransport::new();
        (OutboundQueue::new(Box::new(transport.clone())), transport)
    }

    #[test]
    fn flushes_every_send_before_start() {
        let (mut queue, wire) = queue();
        queue.send(&Operation::destroy("A_0")).unwrap();
        queue.send(&Operation::destroy("A_1")).unwrap();

        assert_eq!(
            wire.take(),
            vec![
                r#"{"event":"Destroy","id":"A_0"}"#.to_string(),
                r#"{"event":"Destroy","id":"A_1"}"#.to_string(),
            ]
        );
        assert!(!queue.is_flush_scheduled());
    }

    #[test]
    fn batches_one_turn_after_start() {
        let (mut queue, wire) = queue();
        queue.set_started(true);
        queue.send(&Operation::destroy("A_0")).unwrap();
        queue.send(&Operation::destroy("A_1")).unwrap();
        assert!(wire.is_empty());
        assert!(queue.is_flush_scheduled());

        queue.tick().unwrap();
        assert_eq!(
            wire.take(),
            vec![r#"{"event":"Destroy","id":"A_0"},{"event":"Destroy","id":"A_1"}"#.to_string()]
        );

        // Nothing scheduled, nothing sent
        queue.tick().unwrap();
        assert!(wire.is_empty());
    }

    #[test]
    fn immediate_flush_cancels_scheduled_one() {
        let (mut queue, wire) = queue();
        queue.set_started(true);
        queue.send(&Operation::log("x")).unwrap();
        queue.flush().unwrap();
        assert_eq!(wire.len(), 1);
        assert!(!queue.is_flush_scheduled());

        queue.tick().unwrap();
        queue.flush().unwrap();
        assert_eq!(wire.take().len(), 1);
    }

    #[test]
    fn transport_errors_surface() {
        let mut queue = OutboundQueue::new(Box::new(|_: &str| -> Result<(), TransportError> {
            Err(TransportError("socket closed".to_string()))
        }));
        let err = queue.send(&Operation::started()).unwrap_err();
        assert!(matches!(err, SendError::Transport(_)));
        assert!(queue.is_empty());
    }
}
