//! # Game Objects
//!
//! Generic scene node used when a template names no prefab, and the
//! data-driven [`Behaviour`] component.

use std::rc::Rc;

use log::{debug, trace};
use once_cell::sync::Lazy;
use serde_json::{json, Map, Value};

use crate::object::{HostObject, MemberTable, Node, ObjectHandle};
use crate::property::conversion::{
    expect_bool, expect_string, expect_vec3, into_value, vec3_to_value,
};
use crate::property::ResolutionError;

static GAME_OBJECT_MEMBERS: Lazy<MemberTable<GameObject>> = Lazy::new(|| {
    MemberTable::<GameObject>::new("GameObject")
        .field(
            "name",
            |o| Node::from(json!(o.name)),
            |o, v| {
                o.name = expect_string(&v)?;
                Ok(())
            },
        )
        .field(
            "tag",
            |o| Node::from(json!(o.tag)),
            |o, v| {
                o.tag = expect_string(&v)?;
                Ok(())
            },
        )
        .field(
            "active",
            |o| Node::from(json!(o.active)),
            |o, v| {
                o.active = expect_bool(&v)?;
                Ok(())
            },
        )
        .field(
            "position",
            |o| Node::from(vec3_to_value(o.position)),
            |o, v| {
                o.position = expect_vec3(&v)?;
                Ok(())
            },
        )
        .field(
            "rotation",
            |o| Node::from(vec3_to_value(o.rotation)),
            |o, v| {
                o.rotation = expect_vec3(&v)?;
                Ok(())
            },
        )
        .field(
            "scale",
            |o| Node::from(vec3_to_value(o.scale)),
            |o, v| {
                o.scale = expect_vec3(&v)?;
                Ok(())
            },
        )
        .read_only("childCount", |o| Node::from(json!(o.children.len())))
        .read_only("receivedEvents", |o| {
            Node::from(Value::Array(
                o.received_events
                    .iter()
                    .map(|name| Value::String(name.clone()))
                    .collect(),
            ))
        })
        .method("SetActive", |o, args| {
            o.active = args
                .first()
                .and_then(Value::as_bool)
                .ok_or_else(|| "SetActive expects a boolean".to_string())?;
            Ok(Node::null())
        })
        .method("Translate", |o, args| {
            if args.len() != 3 {
                return Err(format!("Translate expects 3 numbers, got {}", args.len()));
            }
            for (axis, arg) in o.position.iter_mut().zip(&args) {
                *axis += arg
                    .as_f64()
                    .ok_or_else(|| format!("Translate expects numbers, got {arg}"))?;
            }
            Ok(Node::from(vec3_to_value(o.position)))
        })
        .method("GetChildCount", |o, _| Ok(Node::from(json!(o.children.len()))))
});

/// A named scene node with a transform, components and children
pub struct GameObject {
    name: String,
    tag: String,
    active: bool,
    position: [f64; 3],
    rotation: [f64; 3],
    scale: [f64; 3],
    components: Vec<ObjectHandle>,
    children: Vec<ObjectHandle>,
    received_events: Vec<String>,
}

impl GameObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: String::new(),
            active: true,
            position: [0.0; 3],
            rotation: [0.0; 3],
            scale: [1.0; 3],
            components: Vec::new(),
            children: Vec::new(),
            received_events: Vec::new(),
        }
    }

    pub fn with_position(mut self, position: [f64; 3]) -> Self {
        self.position = position;
        self
    }

    pub fn with_component(mut self, component: ObjectHandle) -> Self {
        self.components.push(component);
        self
    }

    pub fn with_child(mut self, child: ObjectHandle) -> Self {
        self.children.push(child);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> [f64; 3] {
        self.position
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn received_events(&self) -> &[String] {
        &self.received_events
    }
}

fn name_of(handle: &ObjectHandle) -> Option<String> {
    let object = handle.try_borrow().ok()?;
    match object.get_member("name")? {
        Node::Value(Value::String(name)) => Some(name),
        _ => None,
    }
}

impl HostObject for GameObject {
    fn type_name(&self) -> &str {
        GAME_OBJECT_MEMBERS.type_name()
    }

    fn get_member(&self, name: &str) -> Option<Node> {
        GAME_OBJECT_MEMBERS.get(self, name)
    }

    fn set_member(&mut self, name: &str, value: Node) -> Result<(), ResolutionError> {
        GAME_OBJECT_MEMBERS.set(self, name, value)
    }

    fn component(&self, type_name: &str) -> Option<ObjectHandle> {
        self.components
            .iter()
            .find(|c| {
                c.try_borrow()
                    .map(|c| c.type_name() == type_name)
                    .unwrap_or(false)
            })
            .map(Rc::clone)
    }

    fn add_component(&mut self, component: ObjectHandle) -> Result<(), ResolutionError> {
        trace!("Adding component to {}", self.name);
        self.components.push(component);
        Ok(())
    }

    fn child(&self, name: &str) -> Option<ObjectHandle> {
        self.children
            .iter()
            .find(|c| name_of(c).as_deref() == Some(name))
            .map(Rc::clone)
    }

    /// With `world_position_stays` the child keeps its world position, so its
    /// local position becomes relative to this object.
    fn add_child(
        &mut self,
        child: ObjectHandle,
        world_position_stays: bool,
    ) -> Result<(), ResolutionError> {
        if world_position_stays {
            let mut object = child
                .try_borrow_mut()
                .map_err(|_| ResolutionError::ObjectBusy)?;
            if let Some(position) = object.get_member("position") {
                let world = expect_vec3(&position)?;
                let local = [
                    world[0] - self.position[0],
                    world[1] - self.position[1],
                    world[2] - self.position[2],
                ];
                object.set_member("position", Node::from(vec3_to_value(local)))?;
            }
        }
        debug!("Attached child to {}", self.name);
        self.children.push(child);
        Ok(())
    }

    fn invoke(&mut self, method: &str, args: Vec<Value>) -> Option<Result<Node, String>> {
        GAME_OBJECT_MEMBERS.invoke(self, method, args)
    }

    fn get_index(&self, index: usize) -> Result<Node, ResolutionError> {
        self.children
            .get(index)
            .map(|child| Node::Object(Rc::clone(child)))
            .ok_or(ResolutionError::IndexOutOfRange {
                index,
                len: self.children.len(),
            })
    }

    fn handle_event(&mut self, event: &str, data: Option<&Value>) {
        debug!("{} received {} ({:?})", self.name, event, data);
        self.received_events.push(event.to_string());
    }
}

/// Component whose members are a free-form record.
///
/// Members must exist before they can be assigned, the same as a compiled
/// component. The record doubles as a keyed container, so `map:` steps may
/// add new entries.
pub struct Behaviour {
    type_name: String,
    enabled: bool,
    fields: Map<String, Value>,
}

impl Behaviour {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            enabled: true,
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: Value) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    fn store(&mut self, name: &str, value: Node) -> Result<(), ResolutionError> {
        self.fields.insert(name.to_string(), into_value(value)?);
        Ok(())
    }
}

impl HostObject for Behaviour {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn get_member(&self, name: &str) -> Option<Node> {
        if name == "enabled" {
            return Some(Node::from(json!(self.enabled)));
        }
        self.fields.get(name).cloned().map(Node::Value)
    }

    fn set_member(&mut self, name: &str, value: Node) -> Result<(), ResolutionError> {
        if name == "enabled" {
            self.enabled = expect_bool(&value)?;
            return Ok(());
        }
        if !self.fields.contains_key(name) {
            return Err(ResolutionError::NoSuchMember {
                member: name.to_string(),
                type_name: self.type_name.clone(),
            });
        }
        self.store(name, value)
    }

    fn get_key(&self, key: &str) -> Result<Node, ResolutionError> {
        self.fields
            .get(key)
            .cloned()
            .map(Node::Value)
            .ok_or_else(|| ResolutionError::NoSuchKey {
                key: key.to_string(),
            })
    }

    fn set_key(&mut self, key: &str, value: Node) -> Result<(), ResolutionError> {
        self.store(key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::handle;

    #[test]
    fn transform_members_round_trip() {
        let mut ball = GameObject::new("Ball");
        ball.set_member("position", Node::from(json!([1, 2, 3]))).unwrap();
        assert_eq!(ball.get_member("position"), Some(Node::from(json!([1, 2, 3]))));
        assert_eq!(ball.get_member("scale"), Some(Node::from(json!([1, 1, 1]))));
        assert!(matches!(
            ball.set_member("childCount", Node::from(json!(3))),
            Err(ResolutionError::ReadOnly { .. })
        ));
    }

    #[test]
    fn methods_run_through_the_table() {
        let mut ball = GameObject::new("Ball");
        let moved = ball.invoke("Translate", vec![json!(1), json!(0), json!(-2)]);
        assert_eq!(moved, Some(Ok(Node::from(json!([1, 0, -2])))));
        assert!(matches!(ball.invoke("SetActive", vec![json!("no")]), Some(Err(_))));
        assert!(ball.invoke("Fly", vec![]).is_none());
    }

    #[test]
    fn children_and_components_are_found_by_name() {
        let arm = handle(GameObject::new("Arm").with_position([5.0, 0.0, 0.0]));
        let mut body = GameObject::new("Body").with_position([1.0, 0.0, 0.0]);
        body.add_child(Rc::clone(&arm), true).unwrap();
        body.add_component(handle(Behaviour::new("Health").with_field("hp", json!(10))))
            .unwrap();

        let found = body.child("Arm").unwrap();
        assert!(Rc::ptr_eq(&found, &arm));
        assert_eq!(arm.borrow().get_member("position"), Some(Node::from(json!([4, 0, 0]))));
        assert!(body.component("Health").is_some());
        assert!(body.component("Mesh").is_none());
        assert!(matches!(body.get_index(0), Ok(Node::Object(_))));
    }

    #[test]
    fn behaviour_fields_must_exist_for_member_sets() {
        let mut health = Behaviour::new("Health").with_field("hp", json!(10));
        health.set_member("hp", Node::from(json!(4))).unwrap();
        assert_eq!(health.field("hp"), Some(&json!(4)));
        assert!(health.set_member("armor", Node::from(json!(1))).is_err());
        health.set_key("armor", Node::from(json!(1))).unwrap();
        assert_eq!(health.get_member("armor"), Some(Node::from(json!(1))));
    }
}
