//! # Operation Codec
//!
//! Wire representation of protocol messages. Every operation is a single-line
//! JSON object `{"event": ..., "id"?: ..., "data"?: ...}`; a batch is the
//! comma-joined concatenation of the operations flushed together.

use std::collections::BTreeMap;
use std::fmt;

use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::animation::Animation;
use crate::constants::{events, ids, queue::BATCH_SEPARATOR};
use crate::error::{CodecError, ParseError};
use crate::path::Path;

/// Opaque identifier of a live object
pub type ObjectId = String;

/// Opaque identifier of a pending callback
pub type CallbackId = String;

/// The `event` field of an operation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventName {
    Create,
    Destroy,
    Update,
    Query,
    Animate,
    UpdateInterests,
    SetGlobals,
    Log,
    Callback,
    Started,
    Created,
    Destroyed,
    /// Host-defined event routed through interests
    Custom(String),
}

impl EventName {
    pub fn from_name(name: &str) -> Self {
        match name {
            events::CREATE => EventName::Create,
            events::DESTROY => EventName::Destroy,
            events::UPDATE => EventName::Update,
            events::QUERY => EventName::Query,
            events::ANIMATE => EventName::Animate,
            events::UPDATE_INTERESTS => EventName::UpdateInterests,
            events::SET_GLOBALS => EventName::SetGlobals,
            events::LOG => EventName::Log,
            events::CALLBACK => EventName::Callback,
            events::STARTED => EventName::Started,
            events::CREATED => EventName::Created,
            events::DESTROYED => EventName::Destroyed,
            other => EventName::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventName::Create => events::CREATE,
            EventName::Destroy => events::DESTROY,
            EventName::Update => events::UPDATE,
            EventName::Query => events::QUERY,
            EventName::Animate => events::ANIMATE,
            EventName::UpdateInterests => events::UPDATE_INTERESTS,
            EventName::SetGlobals => events::SET_GLOBALS,
            EventName::Log => events::LOG,
            EventName::Callback => events::CALLBACK,
            EventName::Started => events::STARTED,
            EventName::Created => events::CREATED,
            EventName::Destroyed => events::DESTROYED,
            EventName::Custom(name) => name,
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(EventName::from_name(&name))
    }
}

/// A single protocol message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub event: EventName,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Operation {
    pub fn new(event: EventName, id: Option<String>, data: Option<Value>) -> Self {
        Self { event, id, data }
    }

    /// `Create` carries its object ID inside the template, not at top level
    pub fn create(template: &CreateTemplate) -> Result<Self, CodecError> {
        Ok(Self::new(EventName::Create, None, Some(serde_json::to_value(template)?)))
    }

    pub fn destroy(id: &str) -> Self {
        Self::new(EventName::Destroy, Some(id.to_string()), None)
    }

    pub fn update(id: &str, data: Map<String, Value>) -> Self {
        Self::new(EventName::Update, Some(id.to_string()), Some(Value::Object(data)))
    }

    pub fn query(id: &str, payload: &QueryPayload) -> Result<Self, CodecError> {
        Ok(Self::new(
            EventName::Query,
            Some(id.to_string()),
            Some(serde_json::to_value(payload)?),
        ))
    }

    pub fn animate(id: &str, animations: &[Animation]) -> Result<Self, CodecError> {
        Ok(Self::new(
            EventName::Animate,
            Some(id.to_string()),
            Some(serde_json::to_value(animations)?),
        ))
    }

    /// A `None` entry removes the interest for that event
    pub fn update_interests(
        id: &str,
        interests: &BTreeMap<String, Option<InterestSpec>>,
    ) -> Result<Self, CodecError> {
        Ok(Self::new(
            EventName::UpdateInterests,
            Some(id.to_string()),
            Some(serde_json::to_value(interests)?),
        ))
    }

    pub fn set_globals(globals: Map<String, Value>) -> Self {
        Self::new(EventName::SetGlobals, None, Some(Value::Object(globals)))
    }

    pub fn log(line: &str) -> Self {
        let mut data = Map::new();
        data.insert("line".to_string(), Value::String(line.to_string()));
        Self::new(EventName::Log, None, Some(Value::Object(data)))
    }

    pub fn callback(callback_id: &str, data: Value) -> Self {
        Self::new(EventName::Callback, Some(callback_id.to_string()), Some(data))
    }

    pub fn started() -> Self {
        Self::new(EventName::Started, None, None)
    }

    pub fn created(id: &str) -> Self {
        Self::new(EventName::Created, Some(id.to_string()), None)
    }

    pub fn destroyed(id: &str) -> Self {
        Self::new(EventName::Destroyed, Some(id.to_string()), None)
    }

    pub fn event(name: &str, id: &str, data: Value) -> Self {
        Self::new(EventName::from_name(name), Some(id.to_string()), Some(data))
    }

    /// Decode `data` into a typed payload; a missing `data` decodes as `null`
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, CodecError> {
        let data = self.data.clone().unwrap_or(Value::Null);
        serde_json::from_value(data).map_err(|err| CodecError::InvalidPayload {
            event: self.event.to_string(),
            message: err.to_string(),
        })
    }
}

/// Encode one operation as single-line JSON
pub fn encode(op: &Operation) -> Result<String, CodecError> {
    Ok(serde_json::to_string(op)?)
}

/// Encode operations into one comma-joined batch string
pub fn encode_batch(ops: &[Operation]) -> Result<String, CodecError> {
    let encoded = ops.iter().map(encode).collect::<Result<Vec<_>, _>>()?;
    Ok(encoded.join(BATCH_SEPARATOR))
}

/// Decode a comma-joined batch.
///
/// The batch must be valid JSON once wrapped in `[...]`. Entries that are not
/// operations are logged and skipped so one bad entry does not cost the rest
/// of the batch.
pub fn decode_batch(raw: &str) -> Result<Vec<Operation>, CodecError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }

    let entries: Vec<Value> = serde_json::from_str(&format!("[{raw}]"))?;
    let mut ops = Vec::with_capacity(entries.len());
    for entry in entries {
        match serde_json::from_value::<Operation>(entry) {
            Ok(op) => ops.push(op),
            Err(err) => warn!("Skipping malformed operation in batch: {}", err),
        }
    }
    Ok(ops)
}

/// Allocates `"{kind}_{n}"` identifiers from a monotonic counter
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh ID; the counter never rewinds, so IDs are never reused
    pub fn make_id(&mut self, kind: &str) -> String {
        let id = format!("{}{}{}", sanitize_kind(kind), ids::ID_SEPARATOR, self.next);
        self.next += 1;
        id
    }

    /// Number of IDs issued so far
    pub fn issued(&self) -> u64 {
        self.next
    }
}

/// Replace characters that carry path syntax so IDs are always a single step
pub fn sanitize_kind(kind: &str) -> String {
    if kind.is_empty() {
        return ids::DEFAULT_OBJECT_KIND.to_string();
    }
    kind.chars()
        .map(|c| {
            if ids::PATH_UNSAFE_CHARS.contains(&c) {
                ids::ID_SEPARATOR
            } else {
                c
            }
        })
        .collect()
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, str::is_empty)
}

/// An event delivered to an object before or after its update is applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateEvent {
    pub event: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Interest metadata as sent over the wire. Handlers stay local.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterestSpec {
    /// Output key -> path resolved against the object when the event fires
    #[serde(default)]
    pub query: BTreeMap<String, Path>,

    /// Any other metadata is carried through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InterestSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a query map from `(output key, path)` pairs
    pub fn from_query<'a>(
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, ParseError> {
        let mut spec = Self::new();
        for (key, path) in pairs {
            spec.query.insert(key.to_string(), Path::parse(path)?);
        }
        Ok(spec)
    }
}

/// `data` of a `Create` operation. Absent or empty fields are not emitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateTemplate {
    #[serde(default)]
    pub id: ObjectId,

    #[serde(default, skip_serializing_if = "is_blank")]
    pub prefab: Option<String>,

    #[serde(default, skip_serializing_if = "is_blank")]
    pub component: Option<String>,

    #[serde(default, rename = "preEvents", skip_serializing_if = "Vec::is_empty")]
    pub pre_events: Vec<TemplateEvent>,

    /// Path resolved with the new object as root, usually `object:<id>/...`
    #[serde(default, skip_serializing_if = "is_blank")]
    pub parent: Option<String>,

    #[serde(default, rename = "worldPositionStays", skip_serializing_if = "Option::is_none")]
    pub world_position_stays: Option<bool>,

    /// Path -> value or expression
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub update: Map<String, Value>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub interests: BTreeMap<String, InterestSpec>,

    #[serde(default, rename = "postEvents", skip_serializing_if = "Vec::is_empty")]
    pub post_events: Vec<TemplateEvent>,
}

impl CreateTemplate {
    pub fn prefab(name: &str) -> Self {
        Self {
            prefab: Some(name.to_string()),
            ..Self::default()
        }
    }

    /// Kind used to derive the object's ID
    pub fn kind(&self) -> &str {
        self.prefab
            .as_deref()
            .filter(|p| !p.is_empty())
            .or(self.component.as_deref().filter(|c| !c.is_empty()))
            .unwrap_or(ids::DEFAULT_OBJECT_KIND)
    }
}

/// `data` of a `Query` operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryPayload {
    pub query: BTreeMap<String, Path>,

    #[serde(default, rename = "callbackID", skip_serializing_if = "Option::is_none")]
    pub callback_id: Option<CallbackId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn create_with_prefab_matches_wire_shape() {
        let mut ids = IdAllocator::new();
        let mut template = CreateTemplate::prefab("P");
        template.id = ids.make_id(template.kind());

        let encoded = encode(&Operation::create(&template).unwrap()).unwrap();
        assert_eq!(encoded, r#"{"event":"Create","data":{"id":"P_0","prefab":"P"}}"#);
    }

    #[test]
    fn create_minimization_is_idempotent() {
        let raw = r#"{"event":"Create","data":{"id":"Ball_3","component":"Spin","update":{"speed":2},"interests":{"Hit":{"query":{"where":"position"},"priority":1}}}}"#;
        let ops = decode_batch(raw).unwrap();
        let template: CreateTemplate = ops[0].payload().unwrap();
        assert!(template.prefab.is_none());
        assert!(template.pre_events.is_empty());
        assert_eq!(template.interests["Hit"].extra["priority"], json!(1));

        let again = encode(&Operation::create(&template).unwrap()).unwrap();
        let reparsed: Value = serde_json::from_str(&again).unwrap();
        let original: Value = serde_json::from_str(raw).unwrap();
        assert_eq!(reparsed, original);
    }

    #[test]
    fn empty_strings_are_omitted() {
        let template = CreateTemplate {
            id: "Object_0".to_string(),
            prefab: Some(String::new()),
            parent: Some(String::new()),
            ..CreateTemplate::default()
        };
        assert_eq!(serde_json::to_value(&template).unwrap(), json!({"id": "Object_0"}));
        assert_eq!(template.kind(), "Object");
    }

    #[test]
    fn ids_are_sanitized_and_never_repeat() {
        let mut ids = IdAllocator::new();
        assert_eq!(ids.make_id("Prefabs/Tracker"), "Prefabs_Tracker_0");
        assert_eq!(ids.make_id("a:b?"), "a_b__1");

        let kinds = ["Ball", "Ball", "Prefabs/Ball", "Prefabs_Ball", ""];
        let mut rng = rand::thread_rng();
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            let kind = kinds[rng.gen_range(0..kinds.len())];
            let id = ids.make_id(kind);
            assert!(!id.contains('/'));
            assert!(seen.insert(id), "duplicate id issued");
        }
        assert_eq!(ids.issued(), 1002);
    }

    #[test]
    fn batch_round_trip() {
        let ops = vec![
            Operation::destroy("Ball_1"),
            Operation::log("hello, world"),
            Operation::callback("Callback_7", json!({"x": 1})),
        ];
        let batch = encode_batch(&ops).unwrap();
        assert!(!batch.contains('\n'));
        assert_eq!(decode_batch(&batch).unwrap(), ops);
        assert!(decode_batch("  ").unwrap().is_empty());
    }

    #[test]
    fn bad_entries_do_not_poison_the_batch() {
        let ops = decode_batch(r#"{"event":"Destroyed","id":"A_0"},{"id":"B_1"},{"event":"Hit","id":"C_2"}"#)
            .unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[1].event, EventName::Custom("Hit".to_string()));
        assert!(decode_batch("{not json").is_err());
    }

    #[test]
    fn misshapen_payloads_name_their_event() {
        let op = decode_batch(r#"{"event":"Update","id":"A_0","data":[1,2]}"#).unwrap().remove(0);
        match op.payload::<Map<String, Value>>() {
            Err(CodecError::InvalidPayload { event, .. }) => assert_eq!(event, "Update"),
            other => panic!("expected InvalidPayload, got {other:?}"),
        }
        let empty = Operation::destroy("A_0");
        assert_eq!(empty.payload::<Option<Value>>().unwrap(), None);
    }

    #[test]
    fn query_payload_shape() {
        let mut payload = QueryPayload::default();
        payload
            .query
            .insert("pos".to_string(), Path::parse("transform:Head/position").unwrap());
        payload.callback_id = Some("Callback_0".to_string());
        let op = Operation::query("Avatar_2", &payload).unwrap();
        assert_eq!(
            encode(&op).unwrap(),
            r#"{"event":"Query","id":"Avatar_2","data":{"callbackID":"Callback_0","query":{"pos":"transform:Head/position"}}}"#
        );
    }
}
