//! # Property Conversion
//!
//! Conversions between resolved nodes, wire JSON and the typed fields host
//! objects store.

use bridge_shared::expression::number;
use bridge_shared::StepType;
use serde_json::Value;

use crate::object::{Node, ObjectStore};
use crate::property::ResolutionError;

/// Encode a resolved node for the wire. Live objects encode as their
/// Object-ID, or `null` when they were never registered.
pub fn node_to_json(store: &ObjectStore, node: &Node) -> Value {
    match node {
        Node::Value(value) => value.clone(),
        Node::Object(handle) => store
            .id_of(handle)
            .map(|id| Value::String(id.to_string()))
            .unwrap_or(Value::Null),
    }
}

/// Plain data carried by a node. Live objects cannot be stored inside JSON.
pub fn into_value(node: Node) -> Result<Value, ResolutionError> {
    match node {
        Node::Value(value) => Ok(value),
        other => Err(ResolutionError::TypeMismatch {
            expected: "plain value",
            found: other.describe(),
        }),
    }
}

/// Interpret an evaluated payload: JSON when it parses, the raw text otherwise
pub fn value_from_text(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn mismatch(expected: &'static str, node: &Node) -> ResolutionError {
    ResolutionError::TypeMismatch {
        expected,
        found: node.describe(),
    }
}

pub fn expect_f64(node: &Node) -> Result<f64, ResolutionError> {
    node.as_value()
        .and_then(Value::as_f64)
        .ok_or_else(|| mismatch("number", node))
}

pub fn expect_bool(node: &Node) -> Result<bool, ResolutionError> {
    node.as_value()
        .and_then(Value::as_bool)
        .ok_or_else(|| mismatch("boolean", node))
}

pub fn expect_string(node: &Node) -> Result<String, ResolutionError> {
    node.as_value()
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| mismatch("string", node))
}

/// `[x, y, z]` as a three-element numeric array
pub fn expect_vec3(node: &Node) -> Result<[f64; 3], ResolutionError> {
    let items = node
        .as_value()
        .and_then(Value::as_array)
        .filter(|items| items.len() == 3)
        .ok_or_else(|| mismatch("[x, y, z]", node))?;

    let mut out = [0.0; 3];
    for (slot, item) in out.iter_mut().zip(items) {
        *slot = item.as_f64().ok_or_else(|| mismatch("[x, y, z]", node))?;
    }
    Ok(out)
}

pub fn vec3_to_value(v: [f64; 3]) -> Value {
    Value::Array(v.iter().map(|c| number(*c)).collect())
}

/// Coerce an evaluated value to the type a literal step declares
pub fn coerce_literal(step_type: &StepType, value: Value) -> Result<Value, ResolutionError> {
    let invalid = |value: &Value| ResolutionError::InvalidLiteral {
        step_type: step_type.name().to_string(),
        value: value.to_string(),
    };

    match step_type {
        StepType::String => Ok(match value {
            Value::String(s) => Value::String(s),
            other => Value::String(other.to_string()),
        }),
        StepType::Float => match &value {
            Value::Number(n) => n.as_f64().map(number).ok_or_else(|| invalid(&value)),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(number)
                .map_err(|_| invalid(&value)),
            _ => Err(invalid(&value)),
        },
        StepType::Integer => match &value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
                .map(Value::from)
                .ok_or_else(|| invalid(&value)),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| invalid(&value)),
            _ => Err(invalid(&value)),
        },
        StepType::Boolean => match &value {
            Value::Bool(_) => Ok(value),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(invalid(&value)),
            },
            _ => Err(invalid(&value)),
        },
        StepType::Null => Ok(Value::Null),
        _ => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{handle, GameObject};
    use serde_json::json;
    use std::rc::Rc;

    #[test]
    fn objects_encode_as_their_id() {
        let mut store = ObjectStore::new();
        let ball = handle(GameObject::new("Ball"));
        store.insert("Ball_0", Rc::clone(&ball)).unwrap();

        assert_eq!(node_to_json(&store, &Node::Object(ball)), json!("Ball_0"));
        let stray = Node::Object(handle(GameObject::new("Stray")));
        assert_eq!(node_to_json(&store, &stray), Value::Null);
        assert_eq!(node_to_json(&store, &Node::from(json!([1, 2]))), json!([1, 2]));
    }

    #[test]
    fn literals_coerce_to_declared_type() {
        assert_eq!(coerce_literal(&StepType::Integer, json!(4.9)).unwrap(), json!(4));
        assert_eq!(coerce_literal(&StepType::Float, json!("2.5")).unwrap(), json!(2.5));
        assert_eq!(coerce_literal(&StepType::String, json!(7)).unwrap(), json!("7"));
        assert_eq!(coerce_literal(&StepType::Boolean, json!("TRUE")).unwrap(), json!(true));
        assert!(coerce_literal(&StepType::Boolean, json!(1)).is_err());
    }

    #[test]
    fn vec3_requires_three_numbers() {
        assert_eq!(expect_vec3(&Node::from(json!([1, 2.5, -3]))).unwrap(), [1.0, 2.5, -3.0]);
        assert!(expect_vec3(&Node::from(json!([1, 2]))).is_err());
        assert!(expect_vec3(&Node::from(json!(["a", 2, 3]))).is_err());
        assert_eq!(vec3_to_value([1.0, 0.5, 0.0]), json!([1, 0.5, 0]));
        assert_eq!(value_from_text("{\"a\":1}"), json!({"a": 1}));
        assert_eq!(value_from_text("plain"), json!("plain"));
    }
}
