//! # Shared Error Types
//!
//! Errors raised by the parser, the wire codec, the expression evaluator and
//! the transport seam. Resolution errors live with the accessor engine on the
//! host side.

use thiserror::Error;

/// A path string that could not be tokenized
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Two separators in a row, or a leading/trailing separator
    #[error("empty step at offset {offset}")]
    EmptyStep { offset: usize },

    /// A step of the form `:value`
    #[error("empty type tag at offset {offset}")]
    EmptyTypeTag { offset: usize },

    /// An `index` step whose value is not an unsigned integer
    #[error("invalid index `{value}` at offset {offset}")]
    InvalidIndex { offset: usize, value: String },

    /// A literal step whose payload does not parse as its declared type
    #[error("invalid {step_type} literal `{value}` at offset {offset}")]
    InvalidLiteral {
        offset: usize,
        step_type: &'static str,
        value: String,
    },
}

/// Failures while encoding or decoding wire operations
#[derive(Debug, Error)]
pub enum CodecError {
    /// The batch is not a comma-joined sequence of JSON objects
    #[error("malformed batch: {0}")]
    Json(#[from] serde_json::Error),

    /// A payload was missing a field the operation requires
    #[error("`{event}` operation is missing `{field}`")]
    MissingField {
        event: &'static str,
        field: &'static str,
    },

    /// A payload had the wrong JSON shape
    #[error("`{event}` payload has the wrong shape: {message}")]
    InvalidPayload { event: String, message: String },
}

/// Failures evaluating an operation expression
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    #[error("unknown expression op `{0}`")]
    UnknownOp(String),

    #[error("op `{op}` cannot combine {current} with {operand}")]
    TypeMismatch {
        op: String,
        current: &'static str,
        operand: &'static str,
    },

    #[error("division by zero")]
    DivideByZero,

    /// The numeric result was NaN
    #[error("op `{op}` produced a non-numeric result")]
    NotANumber { op: String },

    #[error("malformed expression: {0}")]
    Malformed(String),
}

/// Failure reported by a transport when handing off a batch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport failed: {0}")]
pub struct TransportError(pub String);

/// Failure while queueing or flushing outbound operations
#[derive(Debug, Error)]
pub enum SendError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
