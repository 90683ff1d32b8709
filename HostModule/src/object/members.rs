//! # Member Registration Tables
//!
//! Each addressable host type registers its members once, as plain function
//! pointers keyed by name. Path steps resolve against the table instead of
//! reflecting over the type, so unknown names surface as precise errors.

use std::collections::BTreeMap;

use log::debug;
use serde_json::Value;

use crate::object::Node;
use crate::property::ResolutionError;

pub type Getter<T> = fn(&T) -> Node;
pub type Setter<T> = fn(&mut T, Node) -> Result<(), ResolutionError>;
pub type Method<T> = fn(&mut T, Vec<Value>) -> Result<Node, String>;

struct Field<T> {
    get: Getter<T>,
    set: Option<Setter<T>>,
}

/// Name -> accessor table for one host type
pub struct MemberTable<T> {
    type_name: &'static str,
    fields: BTreeMap<&'static str, Field<T>>,
    methods: BTreeMap<&'static str, Method<T>>,
}

impl<T> MemberTable<T> {
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            fields: BTreeMap::new(),
            methods: BTreeMap::new(),
        }
    }

    /// Register a read-write member
    pub fn field(mut self, name: &'static str, get: Getter<T>, set: Setter<T>) -> Self {
        self.fields.insert(name, Field { get, set: Some(set) });
        self
    }

    pub fn read_only(mut self, name: &'static str, get: Getter<T>) -> Self {
        self.fields.insert(name, Field { get, set: None });
        self
    }

    pub fn method(mut self, name: &'static str, method: Method<T>) -> Self {
        self.methods.insert(name, method);
        self
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn get(&self, target: &T, name: &str) -> Option<Node> {
        self.fields.get(name).map(|field| (field.get)(target))
    }

    pub fn set(&self, target: &mut T, name: &str, value: Node) -> Result<(), ResolutionError> {
        let field = self
            .fields
            .get(name)
            .ok_or_else(|| ResolutionError::NoSuchMember {
                member: name.to_string(),
                type_name: self.type_name.to_string(),
            })?;
        let set = field.set.ok_or_else(|| ResolutionError::ReadOnly {
            member: name.to_string(),
            type_name: self.type_name.to_string(),
        })?;
        set(target, value)
    }

    /// `None` when no method of that name is registered
    pub fn invoke(
        &self,
        target: &mut T,
        name: &str,
        args: Vec<Value>,
    ) -> Option<Result<Node, String>> {
        let method = self.methods.get(name)?;
        debug!("Invoking {}::{} with {} argument(s)", self.type_name, name, args.len());
        Some(method(target, args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::conversion::expect_f64;
    use serde_json::json;

    struct Gauge {
        level: f64,
    }

    fn table() -> MemberTable<Gauge> {
        MemberTable::<Gauge>::new("Gauge")
            .field(
                "level",
                |g| Node::from(json!(g.level)),
                |g, v| {
                    g.level = expect_f64(&v)?;
                    Ok(())
                },
            )
            .read_only("max", |_| Node::from(json!(10)))
            .method("Reset", |g, _| {
                g.level = 0.0;
                Ok(Node::null())
            })
    }

    #[test]
    fn registered_members_resolve_by_name() {
        let table = table();
        let mut gauge = Gauge { level: 2.0 };

        table.set(&mut gauge, "level", Node::from(json!(7.5))).unwrap();
        assert_eq!(table.get(&gauge, "level"), Some(Node::from(json!(7.5))));
        assert_eq!(table.get(&gauge, "missing"), None);
        assert!(table.invoke(&mut gauge, "Reset", vec![]).is_some());
        assert_eq!(gauge.level, 0.0);
        assert!(table.invoke(&mut gauge, "Explode", vec![]).is_none());
    }

    #[test]
    fn unknown_and_read_only_members_are_errors() {
        let table = table();
        let mut gauge = Gauge { level: 0.0 };

        assert!(matches!(
            table.set(&mut gauge, "max", Node::from(json!(3))),
            Err(ResolutionError::ReadOnly { .. })
        ));
        assert!(matches!(
            table.set(&mut gauge, "speed", Node::from(json!(3))),
            Err(ResolutionError::NoSuchMember { .. })
        ));
        assert!(matches!(
            table.set(&mut gauge, "level", Node::from(json!("high"))),
            Err(ResolutionError::TypeMismatch { .. })
        ));
    }
}
