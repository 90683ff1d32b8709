//! Caller and host wired back to back through in-memory transports

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use std::time::Duration;

use bridge_client::{channel, run_pump, Bridge, BridgeError, Callback, Interest};
use bridge_host::{handle, Behaviour, ClassRegistry, GameObject, Host};
use bridge_shared::{
    Animation, BridgeConfig, CreateTemplate, HostConfig, MemoryTransport, Path,
};
use serde_json::{json, Map, Value};

fn player_classes() -> ClassRegistry {
    let mut classes = ClassRegistry::new();
    classes.register_prefab("Prefabs/Player", || {
        handle(GameObject::new("Player").with_component(handle(
            Behaviour::new("Health").with_field("health", json!(100)),
        )))
    });
    classes
}

struct Loopback {
    bridge: Bridge,
    host: Host,
    to_host: MemoryTransport,
    to_caller: MemoryTransport,
}

impl Loopback {
    fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let to_host = MemoryTransport::new();
        let to_caller = MemoryTransport::new();

        let host = Host::new(Box::new(to_caller.clone()), HostConfig::default())
            .with_classes(player_classes());
        let bridge = Bridge::new(Box::new(to_host.clone()), BridgeConfig::default());

        let mut lb = Self {
            bridge,
            host,
            to_host,
            to_caller,
        };
        lb.settle();
        lb
    }

    /// Shuttle batches both ways until neither side has anything to say
    fn settle(&mut self) {
        loop {
            self.bridge.tick().unwrap();
            let up = self.to_host.take();
            let down = self.to_caller.take();
            if up.is_empty() && down.is_empty() {
                break;
            }
            for batch in up {
                self.host.receive_batch(&batch);
            }
            for batch in down {
                self.bridge.receive_batch(&batch);
            }
        }
    }

    fn spawn(&mut self, interests: BTreeMap<String, Interest>) -> String {
        let id = self
            .bridge
            .create_object(CreateTemplate::prefab("Prefabs/Player"), interests)
            .unwrap();
        self.settle();
        id
    }

    fn query(&mut self, id: &str, pairs: &[(&str, &str)]) -> Value {
        let answer = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&answer);
        self.bridge
            .query_paths(id, pairs.iter().copied(), move |_, data| *sink.borrow_mut() = Some(data))
            .unwrap();
        self.settle();
        let value = answer.borrow_mut().take();
        value.expect("query was answered")
    }
}

type Seen = Rc<RefCell<Vec<(String, Value)>>>;

fn recording(seen: &Seen, pairs: &[(&str, &str)]) -> Interest {
    let seen = Rc::clone(seen);
    Interest::on(pairs.iter().copied(), move |_, id, data| {
        seen.borrow_mut().push((id.to_string(), data.clone()))
    })
    .unwrap()
}

#[test]
fn boot_handshake_starts_the_caller() {
    let lb = Loopback::new();
    assert!(lb.bridge.is_started());
}

#[test]
fn created_interest_reports_initial_state() {
    let mut lb = Loopback::new();
    let seen: Seen = Rc::default();
    let mut interests = BTreeMap::new();
    interests.insert("Created".to_string(), recording(&seen, &[("hp", "component:Health/health")]));

    let id = lb.spawn(interests);
    assert_eq!(id, "Prefabs_Player_0");
    assert!(lb.bridge.object(&id).unwrap().is_active());
    assert_eq!(*seen.borrow(), vec![(id, json!({"hp": 100}))]);
}

#[test]
fn clamped_update_then_query() {
    let mut lb = Loopback::new();
    let id = lb.spawn(BTreeMap::new());

    for delta in [-10, -250, 40, 900] {
        let mut data = Map::new();
        data.insert(
            "component:Health/health".to_string(),
            json!({"_expr_": {"op": "add", "value": delta, "constraints": [{"type": "clamp", "min": 0, "max": 100}]}}),
        );
        lb.bridge.update_object(&id, data).unwrap();
        lb.settle();
        let hp = lb.query(&id, &[("hp", "component:Health/health")])["hp"]
            .as_f64()
            .unwrap();
        assert!((0.0..=100.0).contains(&hp), "health {hp} escaped its clamp");
    }
    assert_eq!(lb.query(&id, &[("hp", "component:Health/health")]), json!({"hp": 100}));
}

#[test]
fn duplicate_callback_is_dropped() {
    let mut lb = Loopback::new();
    let id = lb.spawn(BTreeMap::new());

    let calls = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&calls);
    let query = BTreeMap::from([("name".to_string(), Path::parse("name").unwrap())]);
    let callback_id = lb
        .bridge
        .query_object(&id, query, move |_, data| {
            assert_eq!(data, json!({"name": "Player"}));
            *counter.borrow_mut() += 1;
        })
        .unwrap();
    lb.settle();

    let replay = format!(r#"{{"event":"Callback","id":"{callback_id}","data":{{"name":"Player"}}}}"#);
    lb.bridge.receive_batch(&replay);
    assert_eq!(*calls.borrow(), 1);
    assert_eq!(lb.bridge.pending_callbacks(), 0);
}

#[test]
fn interest_dispatch_is_exactly_once_and_per_object() {
    let mut lb = Loopback::new();
    let first = lb.spawn(BTreeMap::new());
    let second = lb.spawn(BTreeMap::new());

    let seen: Seen = Rc::default();
    let mut changes = BTreeMap::new();
    changes.insert("Hit".to_string(), Some(recording(&seen, &[("hp", "component:Health/health")])));
    lb.bridge.update_interests(&first, changes).unwrap();
    lb.settle();

    assert!(lb.host.emit_event(&first, "Hit").unwrap());
    assert!(!lb.host.emit_event(&second, "Hit").unwrap());
    lb.host.flush().unwrap();
    lb.settle();
    assert_eq!(*seen.borrow(), vec![(first.clone(), json!({"hp": 100}))]);

    // Removing the interest stops delivery on both ends
    let mut changes = BTreeMap::new();
    changes.insert("Hit".to_string(), None);
    lb.bridge.update_interests(&first, changes).unwrap();
    lb.settle();
    assert!(!lb.host.emit_event(&first, "Hit").unwrap());
    assert_eq!(seen.borrow().len(), 1);
}

#[test]
fn destroyed_interest_runs_before_the_id_dies() {
    let mut lb = Loopback::new();
    let seen: Seen = Rc::default();
    let mut interests = BTreeMap::new();
    interests.insert("Destroyed".to_string(), recording(&seen, &[("name", "name")]));
    let id = lb.spawn(interests);

    lb.bridge.destroy_object(&id).unwrap();
    lb.settle();

    assert_eq!(*seen.borrow(), vec![(id.clone(), json!({"name": "Player"}))]);
    assert!(lb.bridge.object(&id).is_none());
    assert!(lb.host.object(&id).is_none());
    assert!(matches!(
        lb.bridge.update_object(&id, Map::new()),
        Err(BridgeError::UnknownObjectId(_))
    ));
}

#[test]
fn reported_updates_reach_the_updated_interest() {
    let mut lb = Loopback::new();
    let seen: Seen = Rc::default();
    let mut interests = BTreeMap::new();
    interests.insert("Updated".to_string(), recording(&seen, &[]));
    let id = lb.spawn(interests);

    let mut data = Map::new();
    data.insert(
        "component:Health/health".to_string(),
        json!({"_expr_": {"op": "multiply", "value": 0.5, "reportUpdate": true}}),
    );
    lb.bridge.update_object(&id, data).unwrap();
    lb.settle();
    assert_eq!(
        *seen.borrow(),
        vec![(id, json!({"component:Health/health": 50}))]
    );
}

#[test]
fn finished_animation_answers_its_callback() {
    let mut lb = Loopback::new();
    let id = lb.spawn(BTreeMap::new());

    let landed = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&landed);
    let callback_id = lb
        .bridge
        .register_callback(Callback::once(move |_, data| *sink.borrow_mut() = Some(data)));
    let mut slide = Animation::new(Path::parse("position").unwrap(), json!([3, 0, 6]), 1.0);
    slide.callback_id = Some(callback_id);
    lb.bridge.animate_object(&id, &[slide]).unwrap();
    lb.settle();

    lb.host.tick(0.5);
    lb.settle();
    assert!(landed.borrow().is_none());
    assert_eq!(
        lb.query(&id, &[("at", "position")]),
        json!({"at": [1.5, 0, 3]})
    );

    lb.host.tick(0.5);
    lb.settle();
    assert_eq!(*landed.borrow(), Some(json!([3, 0, 6])));
    assert_eq!(lb.bridge.pending_callbacks(), 0);
}

#[test]
fn globals_and_log_lines_reach_the_host() {
    let mut lb = Loopback::new();
    let mut globals = Map::new();
    globals.insert("gravity".to_string(), json!(-9.8));
    lb.bridge.set_globals(globals).unwrap();
    lb.bridge.log("hello from the caller").unwrap();
    lb.settle();
    assert_eq!(lb.host.globals()["gravity"], json!(-9.8));
}

#[tokio::test]
async fn pumped_over_channels() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (to_host, mut host_inbox) = channel();
    let (to_caller, caller_inbox) = channel();
    let mut host = Host::new(Box::new(to_caller), HostConfig::default()).with_classes(player_classes());
    let config = BridgeConfig {
        flush_interval_ms: 1,
        ..BridgeConfig::default()
    };
    let bridge = Rc::new(RefCell::new(Bridge::new(Box::new(to_host), config)));

    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            tokio::task::spawn_local(run_pump(Rc::clone(&bridge), caller_inbox));
            tokio::task::spawn_local(async move {
                while let Some(batch) = host_inbox.recv().await {
                    host.receive_batch(&batch);
                }
            });

            let answer = Rc::new(RefCell::new(None));
            let sink = Rc::clone(&answer);
            let id = bridge
                .borrow_mut()
                .create_object(CreateTemplate::prefab("Prefabs/Player"), BTreeMap::new())
                .unwrap();
            let query = BTreeMap::from([("hp".to_string(), Path::parse("component:Health/health").unwrap())]);
            bridge
                .borrow_mut()
                .query_object(&id, query, move |_, data| *sink.borrow_mut() = Some(data))
                .unwrap();

            tokio::time::timeout(Duration::from_secs(5), async {
                while answer.borrow().is_none() {
                    tokio::task::yield_now().await;
                }
            })
            .await
            .expect("query answered over the channels");
            assert_eq!(*answer.borrow(), Some(json!({"hp": 100})));
            assert!(bridge.borrow().is_started());
            assert!(bridge.borrow().object(&id).unwrap().is_active());
        })
        .await;
}
