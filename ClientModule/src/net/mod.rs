//! # Network Module
//!
//! In-process transport for the bridge: batches travel over tokio unbounded
//! channels, and [`run_pump`] is the event loop that feeds inbound batches to
//! a [`Bridge`] and runs its scheduled flushes.
//!
//! Everything here is single-threaded. The bridge lives in an `Rc<RefCell<_>>`
//! and the pump must run on a `LocalSet` or be awaited directly.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use bridge_shared::{Transport, TransportError};
use log::{debug, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::MissedTickBehavior;

use crate::bridge::Bridge;

/// Sends each batch as one channel message
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: UnboundedSender<String>,
}

impl ChannelTransport {
    pub fn new(tx: UnboundedSender<String>) -> Self {
        Self { tx }
    }
}

impl Transport for ChannelTransport {
    fn transmit(&mut self, batch: &str) -> Result<(), TransportError> {
        self.tx
            .send(batch.to_string())
            .map_err(|_| TransportError("receiving end closed".to_string()))
    }
}

/// A transport and the receiver its batches arrive on
pub fn channel() -> (ChannelTransport, UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelTransport::new(tx), rx)
}

/// Drive `bridge` until `inbound` closes.
///
/// Each inbound batch is one turn: it is distributed, then whatever the
/// handlers sent is flushed together. Between batches the pump ticks every
/// `flush_interval_ms` so sends made outside a turn still go out.
pub async fn run_pump(bridge: Rc<RefCell<Bridge>>, mut inbound: UnboundedReceiver<String>) {
    let period = Duration::from_millis(bridge.borrow().config().flush_interval_ms.max(1));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!("Pump running every {:?}", period);

    loop {
        tokio::select! {
            batch = inbound.recv() => {
                let mut bridge = bridge.borrow_mut();
                match batch {
                    Some(raw) => {
                        bridge.receive_batch(&raw);
                        if let Err(err) = bridge.tick() {
                            warn!("Flush after inbound batch failed: {}", err);
                        }
                    }
                    None => {
                        debug!("Inbound channel closed; pump stopping");
                        if let Err(err) = bridge.flush() {
                            debug!("Final flush failed: {}", err);
                        }
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                if let Err(err) = bridge.borrow_mut().tick() {
                    warn!("Scheduled flush failed: {}", err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use bridge_shared::{BridgeConfig, CreateTemplate};
    use tokio::task::LocalSet;

    use super::*;
    use crate::object::Interest;

    #[test]
    fn closed_receiver_is_a_transport_error() {
        let (mut transport, rx) = channel();
        transport.transmit("{}").unwrap();
        drop(rx);
        assert!(transport.transmit("{}").is_err());
    }

    #[tokio::test]
    async fn pump_routes_batches_and_flushes_per_turn() {
        let _ = env_logger::builder().is_test(true).try_init();
        let (transport, mut outbound) = channel();
        let (inbound, inbound_rx) = mpsc::unbounded_channel();
        let config = BridgeConfig {
            flush_interval_ms: 1,
            ..BridgeConfig::default()
        };
        let bridge = Rc::new(RefCell::new(Bridge::new(Box::new(transport), config)));

        let hits = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&hits);
        let mut interests = BTreeMap::new();
        interests.insert(
            "Hit".to_string(),
            Interest::new(Default::default(), move |bridge, _, _| {
                *counter.borrow_mut() += 1;
                bridge.log("hit").unwrap();
                bridge.log("again").unwrap();
            }),
        );
        let id = bridge
            .borrow_mut()
            .create_object(CreateTemplate::prefab("Ball"), interests)
            .unwrap();
        // Not started yet: sent straight away
        assert!(outbound.recv().await.unwrap().contains("\"Create\""));

        let local = LocalSet::new();
        local
            .run_until(async {
                let pump = tokio::task::spawn_local(run_pump(Rc::clone(&bridge), inbound_rx));

                inbound
                    .send(format!(r#"{{"event":"StartedUnity"}},{{"event":"Hit","id":"{id}"}}"#))
                    .unwrap();
                let batch = outbound.recv().await.unwrap();
                assert_eq!(
                    batch,
                    r#"{"event":"Log","data":{"line":"hit"}},{"event":"Log","data":{"line":"again"}}"#
                );
                assert!(bridge.borrow().is_started());

                // Sends outside a turn go out on the next tick
                bridge.borrow_mut().destroy_object(&id).unwrap();
                let batch = outbound.recv().await.unwrap();
                assert_eq!(batch, format!(r#"{{"event":"Destroy","id":"{id}"}}"#));

                drop(inbound);
                pump.await.unwrap();
            })
            .await;
        assert_eq!(*hits.borrow(), 1);
    }
}
