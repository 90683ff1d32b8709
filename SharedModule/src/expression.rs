//! # Operation Expressions
//!
//! Declarative deltas carried in place of plain values:
//!
//! ```json
//! {"_expr_": {"op": "add", "value": -10, "constraints": [{"type": "clamp", "min": 0, "max": 100}]}}
//! ```
//!
//! The vocabulary is closed. Nothing here evaluates host-language code; a
//! value is either a literal, a reference to another path, or one of the ops
//! below applied to the current value.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::expr::{EXPR_KEY, PATH_KEY};
use crate::error::ExpressionError;
use crate::path::Path;

/// A value on the right-hand side of an assignment
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Used verbatim
    Literal(Value),
    /// `{"_path_": "..."}`: resolved against the target object
    PathRef(Path),
    /// `{"_expr_": {...}}`: applied to the target's current value
    Operation(OperationExpr),
}

impl Expression {
    /// Interpret a JSON value as an expression
    pub fn from_value(value: Value) -> Result<Self, ExpressionError> {
        if let Value::Object(map) = &value {
            if map.len() == 1 {
                if let Some(inner) = map.get(EXPR_KEY) {
                    return OperationExpr::from_value(inner.clone()).map(Expression::Operation);
                }
                if let Some(inner) = map.get(PATH_KEY) {
                    let text = inner.as_str().ok_or_else(|| {
                        ExpressionError::Malformed(format!("`{PATH_KEY}` must be a string"))
                    })?;
                    let path = Path::parse(text)
                        .map_err(|e| ExpressionError::Malformed(e.to_string()))?;
                    return Ok(Expression::PathRef(path));
                }
            }
        }
        Ok(Expression::Literal(value))
    }

    /// Whether the written value should be reported back to the caller
    pub fn report_update(&self) -> bool {
        matches!(self, Expression::Operation(op) if op.report_update)
    }

    /// Encode back to the wire form
    pub fn to_value(&self) -> Value {
        match self {
            Expression::Literal(value) => value.clone(),
            Expression::PathRef(path) => {
                let mut map = Map::new();
                map.insert(PATH_KEY.to_string(), Value::String(path.to_string()));
                Value::Object(map)
            }
            Expression::Operation(op) => {
                let mut map = Map::new();
                map.insert(
                    EXPR_KEY.to_string(),
                    serde_json::to_value(op).unwrap_or(Value::Null),
                );
                Value::Object(map)
            }
        }
    }
}

/// Ops understood by [`OperationExpr`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprOp {
    Set,
    Add,
    Subtract,
    Multiply,
    Divide,
    Min,
    Max,
    Append,
    Prepend,
    Remove,
    Toggle,
}

impl FromStr for ExprOp {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "set" => Ok(ExprOp::Set),
            "add" => Ok(ExprOp::Add),
            "subtract" | "sub" => Ok(ExprOp::Subtract),
            "multiply" | "mul" => Ok(ExprOp::Multiply),
            "divide" | "div" => Ok(ExprOp::Divide),
            "min" => Ok(ExprOp::Min),
            "max" => Ok(ExprOp::Max),
            "append" => Ok(ExprOp::Append),
            "prepend" => Ok(ExprOp::Prepend),
            "remove" => Ok(ExprOp::Remove),
            "toggle" => Ok(ExprOp::Toggle),
            other => Err(ExpressionError::UnknownOp(other.to_string())),
        }
    }
}

/// Post-processing applied to the result of an op, in order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Constraint {
    /// Numeric clamp; either bound may be omitted
    Clamp {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    /// Round to a number of decimal digits (0 when omitted)
    Round {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        digits: Option<u32>,
    },
    /// Truncate a string (in chars) or an array
    MaxLength { length: usize },
    /// Render the value into a template, replacing `{}`
    Format { template: String },
}

/// Body of an `{"_expr_": ...}` object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationExpr {
    pub op: String,

    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub value: Value,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<Constraint>,

    #[serde(default, rename = "reportUpdate", skip_serializing_if = "is_false")]
    pub report_update: bool,
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

impl OperationExpr {
    pub fn new(op: &str, value: Value) -> Self {
        Self {
            op: op.to_string(),
            value,
            constraints: Vec::new(),
            report_update: false,
        }
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn from_value(value: Value) -> Result<Self, ExpressionError> {
        let expr: OperationExpr =
            serde_json::from_value(value).map_err(|e| ExpressionError::Malformed(e.to_string()))?;
        // Reject unknown ops up front rather than at apply time
        expr.op.parse::<ExprOp>()?;
        Ok(expr)
    }

    /// Compute the new value from the current one
    pub fn apply(&self, current: &Value) -> Result<Value, ExpressionError> {
        let op: ExprOp = self.op.parse()?;
        let mut result = apply_op(op, &self.op, current, &self.value)?;
        for constraint in &self.constraints {
            result = apply_constraint(constraint, result)?;
        }
        Ok(result)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn mismatch(op: &str, current: &Value, operand: &Value) -> ExpressionError {
    ExpressionError::TypeMismatch {
        op: op.to_string(),
        current: type_name(current),
        operand: type_name(operand),
    }
}

/// Emit integral results as JSON integers, everything else as floats.
/// Infinities saturate to the largest finite magnitude; NaN becomes `null`.
pub fn number(value: f64) -> Value {
    const EXACT: f64 = 9_007_199_254_740_992.0;
    let value = value.clamp(f64::MIN, f64::MAX);
    if value.fract() == 0.0 && value.abs() < EXACT {
        Value::from(value as i64)
    } else {
        serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

fn apply_op(op: ExprOp, name: &str, current: &Value, operand: &Value) -> Result<Value, ExpressionError> {
    match op {
        ExprOp::Set => Ok(operand.clone()),
        ExprOp::Toggle => match current {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            Value::Null => Ok(Value::Bool(true)),
            other => Err(mismatch(name, other, operand)),
        },
        ExprOp::Add => match (current, operand) {
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
            (Value::Null, Value::String(b)) => Ok(Value::String(b.clone())),
            _ => arithmetic(name, current, operand, |a, b| Ok(a + b)),
        },
        ExprOp::Subtract => arithmetic(name, current, operand, |a, b| Ok(a - b)),
        ExprOp::Multiply => arithmetic(name, current, operand, |a, b| Ok(a * b)),
        ExprOp::Divide => arithmetic(name, current, operand, |a, b| {
            if b == 0.0 {
                Err(ExpressionError::DivideByZero)
            } else {
                Ok(a / b)
            }
        }),
        ExprOp::Min => arithmetic(name, current, operand, |a, b| Ok(a.min(b))),
        ExprOp::Max => arithmetic(name, current, operand, |a, b| Ok(a.max(b))),
        ExprOp::Append => match (current, operand) {
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
            (Value::Null, Value::String(b)) => Ok(Value::String(b.clone())),
            (Value::Array(items), item) => {
                let mut items = items.clone();
                items.push(item.clone());
                Ok(Value::Array(items))
            }
            (Value::Null, item) => Ok(Value::Array(vec![item.clone()])),
            (other, item) => Err(mismatch(name, other, item)),
        },
        ExprOp::Prepend => match (current, operand) {
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{b}{a}"))),
            (Value::Null, Value::String(b)) => Ok(Value::String(b.clone())),
            (Value::Array(items), item) => {
                let mut items = items.clone();
                items.insert(0, item.clone());
                Ok(Value::Array(items))
            }
            (Value::Null, item) => Ok(Value::Array(vec![item.clone()])),
            (other, item) => Err(mismatch(name, other, item)),
        },
        ExprOp::Remove => match (current, operand) {
            (Value::Array(items), item) => Ok(Value::Array(
                items.iter().filter(|v| *v != item).cloned().collect(),
            )),
            (Value::Object(map), Value::String(key)) => {
                let mut map = map.clone();
                map.remove(key);
                Ok(Value::Object(map))
            }
            (other, item) => Err(mismatch(name, other, item)),
        },
    }
}

fn arithmetic(
    name: &str,
    current: &Value,
    operand: &Value,
    f: impl Fn(f64, f64) -> Result<f64, ExpressionError>,
) -> Result<Value, ExpressionError> {
    let a = match current {
        // Missing numeric slots start from zero
        Value::Null => 0.0,
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        other => return Err(mismatch(name, other, operand)),
    };
    let b = operand
        .as_f64()
        .ok_or_else(|| mismatch(name, current, operand))?;
    Ok(number(finite(name, f(a, b)?)?))
}

/// Saturate infinities to the largest finite magnitude; NaN has no bound
fn finite(op: &str, x: f64) -> Result<f64, ExpressionError> {
    if x.is_nan() {
        Err(ExpressionError::NotANumber { op: op.to_string() })
    } else {
        Ok(x.clamp(f64::MIN, f64::MAX))
    }
}

/// Largest rounding precision an `f64` can carry without the scale overflowing
const MAX_ROUND_DIGITS: u32 = 300;

fn apply_constraint(constraint: &Constraint, value: Value) -> Result<Value, ExpressionError> {
    match constraint {
        Constraint::Clamp { min, max } => {
            let mut x = value
                .as_f64()
                .ok_or_else(|| mismatch("clamp", &value, &Value::Null))?;
            if let Some(min) = min {
                x = x.max(*min);
            }
            if let Some(max) = max {
                x = x.min(*max);
            }
            Ok(number(finite("clamp", x)?))
        }
        Constraint::Round { digits } => {
            let x = value
                .as_f64()
                .ok_or_else(|| mismatch("round", &value, &Value::Null))?;
            let digits = digits.unwrap_or(0).min(MAX_ROUND_DIGITS);
            let scale = 10f64.powi(digits as i32);
            let scaled = x * scale;
            // Already exact at this precision; rescaling would only add error
            if !scaled.is_finite() || scaled.fract() == 0.0 {
                return Ok(number(x));
            }
            Ok(number(finite("round", scaled.round() / scale)?))
        }
        Constraint::MaxLength { length } => match value {
            Value::String(s) => Ok(Value::String(s.chars().take(*length).collect())),
            Value::Array(mut items) => {
                items.truncate(*length);
                Ok(Value::Array(items))
            }
            other => Err(mismatch("maxLength", &other, &Value::Null)),
        },
        Constraint::Format { template } => {
            let rendered = match &value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Ok(Value::String(template.replace("{}", &rendered)))
        }
    }
}
