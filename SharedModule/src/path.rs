//! # Path Grammar
//!
//! Tokenizes slash-delimited path strings into typed steps.
//!
//! ```text
//! path      := step ('/' step)*
//! step      := bareNumber | typedStep
//! bareNumber:= [0-9]+                     # sugar for "index:" + bareNumber
//! typedStep := [type ':'] value [modifiers]
//! modifiers := '?' | '!' | '?!' | '!?'
//! ```
//!
//! Type tags are matched case-insensitively. A tag nobody recognizes is kept
//! as [`StepType::Unknown`] and only fails once the path is resolved against a
//! live object graph.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Number, Value};

use crate::constants::path::{
    CONDITIONAL_MODIFIER, EXCITED_MODIFIER, STEP_SEPARATOR, TYPE_SEPARATOR,
};
use crate::error::ParseError;

/// The accessor kind selected by a step's type tag
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StepType {
    /// `member`, `field`, `property`, or no tag at all
    Member,
    /// `component`
    Component,
    /// `transform`: named child in the hierarchy
    Transform,
    /// `index`, `jarray`, `array`, `list`
    Index,
    /// `map`, `dict`, `dictionary`, `jobject`
    Map,
    /// `resource`
    Resource,
    /// `string` literal
    String,
    /// `float` literal
    Float,
    /// `integer` / `int` literal
    Integer,
    /// `boolean` / `bool` literal
    Boolean,
    /// `null` literal
    Null,
    /// `json` literal
    Json,
    /// `object`: an Object-ID looked up in the store
    Object,
    /// `method`
    Method,
    /// Any other tag; rejected at resolution time
    Unknown(String),
}

/// Type tags and their aliases
static STEP_TYPE_TAGS: Lazy<HashMap<&'static str, StepType>> = Lazy::new(|| {
    let mut tags = HashMap::new();
    tags.insert("string", StepType::String);
    tags.insert("float", StepType::Float);
    tags.insert("integer", StepType::Integer);
    tags.insert("int", StepType::Integer);
    tags.insert("boolean", StepType::Boolean);
    tags.insert("bool", StepType::Boolean);
    tags.insert("null", StepType::Null);
    tags.insert("json", StepType::Json);
    tags.insert("index", StepType::Index);
    tags.insert("jarray", StepType::Index);
    tags.insert("array", StepType::Index);
    tags.insert("list", StepType::Index);
    tags.insert("map", StepType::Map);
    tags.insert("dict", StepType::Map);
    tags.insert("dictionary", StepType::Map);
    tags.insert("jobject", StepType::Map);
    tags.insert("transform", StepType::Transform);
    tags.insert("component", StepType::Component);
    tags.insert("resource", StepType::Resource);
    tags.insert("member", StepType::Member);
    tags.insert("field", StepType::Member);
    tags.insert("property", StepType::Member);
    tags.insert("object", StepType::Object);
    tags.insert("method", StepType::Method);
    tags
});

impl StepType {
    /// Look up a type tag, ignoring case
    pub fn from_tag(tag: &str) -> Self {
        let lowered = tag.to_ascii_lowercase();
        match STEP_TYPE_TAGS.get(lowered.as_str()) {
            Some(step_type) => step_type.clone(),
            None => StepType::Unknown(lowered),
        }
    }

    /// Canonical tag name
    pub fn name(&self) -> &str {
        match self {
            StepType::Member => "member",
            StepType::Component => "component",
            StepType::Transform => "transform",
            StepType::Index => "index",
            StepType::Map => "map",
            StepType::Resource => "resource",
            StepType::String => "string",
            StepType::Float => "float",
            StepType::Integer => "integer",
            StepType::Boolean => "boolean",
            StepType::Null => "null",
            StepType::Json => "json",
            StepType::Object => "object",
            StepType::Method => "method",
            StepType::Unknown(tag) => tag,
        }
    }

    /// Literal steps produce a value instead of traversing
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            StepType::String
                | StepType::Float
                | StepType::Integer
                | StepType::Boolean
                | StepType::Null
                | StepType::Json
        )
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One segment of a path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Step {
    /// Accessor kind
    pub step_type: StepType,

    /// Type-specific payload with modifiers removed
    pub value: String,

    /// Trailing `?`: failures degrade to null (get) or no-op (set)
    pub conditional: bool,

    /// Trailing `!`: the payload is evaluated instead of used verbatim
    pub excited: bool,
}

impl Step {
    pub fn new(step_type: StepType, value: impl Into<String>) -> Self {
        Self {
            step_type,
            value: value.into(),
            conditional: false,
            excited: false,
        }
    }

    pub fn member(name: impl Into<String>) -> Self {
        Self::new(StepType::Member, name)
    }

    pub fn index(index: usize) -> Self {
        Self::new(StepType::Index, index.to_string())
    }

    pub fn conditional(mut self) -> Self {
        self.conditional = true;
        self
    }

    pub fn excited(mut self) -> Self {
        self.excited = true;
        self
    }

    /// Numeric payload of an `index` step
    pub fn as_index(&self) -> Option<usize> {
        self.value.parse().ok()
    }

    /// Value produced by a non-excited literal step.
    ///
    /// Returns `None` for non-literal steps and for payloads that do not
    /// parse as the declared literal type.
    pub fn literal_value(&self) -> Option<Value> {
        let raw = self.value.as_str();
        match self.step_type {
            StepType::String => Some(Value::String(raw.to_string())),
            StepType::Float => raw
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number),
            StepType::Integer => raw.trim().parse::<i64>().ok().map(Value::from),
            StepType::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            StepType::Null => Some(Value::Null),
            StepType::Json => serde_json::from_str(raw).ok(),
            _ => None,
        }
    }

    fn validate(&self, offset: usize) -> Result<(), ParseError> {
        if self.excited {
            // Evaluated payloads are checked when they are evaluated
            return Ok(());
        }
        if self.step_type == StepType::Index && self.as_index().is_none() {
            return Err(ParseError::InvalidIndex {
                offset,
                value: self.value.clone(),
            });
        }
        if self.step_type.is_literal() && self.literal_value().is_none() {
            return Err(ParseError::InvalidLiteral {
                offset,
                step_type: literal_name(&self.step_type),
                value: self.value.clone(),
            });
        }
        Ok(())
    }
}

fn literal_name(step_type: &StepType) -> &'static str {
    match step_type {
        StepType::String => "string",
        StepType::Float => "float",
        StepType::Integer => "integer",
        StepType::Boolean => "boolean",
        StepType::Null => "null",
        _ => "json",
    }
}

/// A parsed path: an immutable sequence of steps.
///
/// The source text is retained so the path re-emits byte-for-byte. Equality
/// compares steps only, so `contacts/0/point` equals `contacts/index:0/point`.
#[derive(Debug, Clone, Default)]
pub struct Path {
    source: String,
    steps: Vec<Step>,
}

impl Path {
    /// The empty path, which resolves to the root
    pub fn root() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Result<Self, ParseError> {
        parse(text)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.steps == other.steps
    }
}

impl Eq for Path {}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for Path {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Parse a path string into steps
pub fn parse(text: &str) -> Result<Path, ParseError> {
    if text.is_empty() {
        return Ok(Path::root());
    }

    let mut steps = Vec::new();
    let mut offset = 0;
    for token in text.split(STEP_SEPARATOR) {
        steps.push(parse_step(token, offset)?);
        offset += token.len() + STEP_SEPARATOR.len_utf8();
    }

    Ok(Path {
        source: text.to_string(),
        steps,
    })
}

fn parse_step(token: &str, offset: usize) -> Result<Step, ParseError> {
    let (body, conditional, excited) = strip_modifiers(token);

    if body.is_empty() {
        return Err(ParseError::EmptyStep { offset });
    }

    let (step_type, value) = match body.split_once(TYPE_SEPARATOR) {
        // Bare numbers are sugar for `index:<n>`
        None if body.bytes().all(|b| b.is_ascii_digit()) => (StepType::Index, body),
        None => (StepType::Member, body),
        Some(("", _)) => return Err(ParseError::EmptyTypeTag { offset }),
        Some((tag, value)) => (StepType::from_tag(tag), value),
    };

    let step = Step {
        step_type,
        value: value.to_string(),
        conditional,
        excited,
    };
    step.validate(offset)?;
    Ok(step)
}

/// Strip trailing `?` / `!` in either order
fn strip_modifiers(token: &str) -> (&str, bool, bool) {
    let mut body = token;
    let mut conditional = false;
    let mut excited = false;
    loop {
        if !conditional {
            if let Some(rest) = body.strip_suffix(CONDITIONAL_MODIFIER) {
                conditional = true;
                body = rest;
                continue;
            }
        }
        if !excited {
            if let Some(rest) = body.strip_suffix(EXCITED_MODIFIER) {
                excited = true;
                body = rest;
                continue;
            }
        }
        break;
    }
    (body, conditional, excited)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn bare_number_is_index_sugar() {
        let sugar = parse("contacts/0/point").unwrap();
        let explicit = parse("contacts/index:0/point").unwrap();

        assert_eq!(
            sugar.steps(),
            &[Step::member("contacts"), Step::index(0), Step::member("point")]
        );
        assert_eq!(sugar, explicit);
        assert_eq!(sugar.to_string(), "contacts/0/point");
    }

    #[test]
    fn random_numeric_segments_match_explicit_index() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let n: u32 = rng.gen_range(0..100_000);
            let prefix = if rng.gen_bool(0.5) { "a/b" } else { "component:Mesh" };
            let sugar = parse(&format!("{prefix}/{n}/tail")).unwrap();
            let explicit = parse(&format!("{prefix}/index:{n}/tail")).unwrap();
            assert_eq!(sugar.steps(), explicit.steps());
        }

        // Past `usize::MAX` both spellings fail the same way
        for _ in 0..50 {
            let digits: String = (0..rng.gen_range(1..8))
                .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
                .collect();
            let n = format!("{}{digits}", u128::from(u64::MAX) + u128::from(rng.gen::<u32>()));
            let sugar = parse(&format!("a/{n}/tail"));
            let explicit = parse(&format!("a/index:{n}/tail"));
            assert!(matches!(sugar, Err(ParseError::InvalidIndex { offset: 2, .. })), "{n}");
            assert_eq!(sugar, explicit);
        }
    }

    #[test]
    fn modifiers_strip_in_either_order() {
        let a = parse("component:Renderer?!").unwrap();
        let b = parse("component:Renderer!?").unwrap();
        assert_eq!(a.steps(), b.steps());

        let step = &a.steps()[0];
        assert_eq!(step.step_type, StepType::Component);
        assert_eq!(step.value, "Renderer");
        assert!(step.conditional);
        assert!(step.excited);
    }

    #[test]
    fn type_tags_are_case_insensitive_with_aliases() {
        let path = parse("Dict:name/JARRAY:2/Field:x/Bool:true").unwrap();
        let types: Vec<_> = path.steps().iter().map(|s| s.step_type.clone()).collect();
        assert_eq!(
            types,
            vec![StepType::Map, StepType::Index, StepType::Member, StepType::Boolean]
        );
        // Values keep their case
        assert_eq!(path.steps()[0].value, "name");
    }

    #[test]
    fn unknown_tag_is_deferred() {
        let path = parse("missing:thing?").unwrap();
        let step = &path.steps()[0];
        assert_eq!(step.step_type, StepType::Unknown("missing".to_string()));
        assert_eq!(step.value, "thing");
        assert!(step.conditional);
    }

    #[test]
    fn value_keeps_everything_after_first_colon() {
        let path = parse("json:{\"a\":1}").unwrap();
        assert_eq!(path.steps()[0].value, "{\"a\":1}");
        assert_eq!(
            path.steps()[0].literal_value(),
            Some(serde_json::json!({"a": 1}))
        );
    }

    #[test]
    fn empty_path_is_root() {
        let path = parse("").unwrap();
        assert!(path.is_empty());
        assert_eq!(path, Path::root());
    }

    #[test]
    fn malformed_paths_fail_at_parse_time() {
        assert_eq!(parse("a//b"), Err(ParseError::EmptyStep { offset: 2 }));
        assert_eq!(parse("/a"), Err(ParseError::EmptyStep { offset: 0 }));
        assert_eq!(parse("a/?"), Err(ParseError::EmptyStep { offset: 2 }));
        assert_eq!(parse(":x"), Err(ParseError::EmptyTypeTag { offset: 0 }));
        assert!(matches!(
            parse("list:abc"),
            Err(ParseError::InvalidIndex { .. })
        ));
        assert!(matches!(
            parse("a/float:fast"),
            Err(ParseError::InvalidLiteral { offset: 2, step_type: "float", .. })
        ));
    }

    #[test]
    fn excited_literals_skip_validation() {
        let path = parse("float:{\"_expr_\":{\"op\":\"add\",\"value\":1}}!").unwrap();
        assert!(path.steps()[0].excited);
    }

    #[test]
    fn numeric_with_modifier_is_conditional_index() {
        let path = parse("items/3?").unwrap();
        assert_eq!(path.steps()[1], Step::index(3).conditional());
    }

    #[test]
    fn path_serializes_as_source_text() {
        let path = parse("transform:Arm/member:length").unwrap();
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"transform:Arm/member:length\"");
        let back: Path = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
    }
}
