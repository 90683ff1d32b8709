//! # SharedModule
//!
//! Shared types and utilities used by both the caller (client) and the host
//! ends of the Bridge protocol. This crate contains the path grammar, the
//! wire codec, ID allocation, operation expressions and the outbound queue so
//! that both sides of the process boundary agree on every byte.

// Export module structure
pub mod animation;
pub mod config;
pub mod constants;
pub mod error;
pub mod expression;
pub mod lifecycle;
pub mod operation;
pub mod path;
pub mod queue;

// Re-export commonly used items for convenience
pub use animation::{Animation, Ease};
pub use config::{BridgeConfig, HostConfig};
pub use error::{CodecError, ExpressionError, ParseError, SendError, TransportError};
pub use expression::{Constraint, Expression, OperationExpr};
pub use lifecycle::ObjectLifecycleState;
pub use operation::{
    decode_batch, encode, encode_batch, CallbackId, CreateTemplate, EventName, IdAllocator,
    InterestSpec, ObjectId, Operation, QueryPayload, TemplateEvent,
};
pub use path::{parse, Path, Step, StepType};
pub use queue::{MemoryTransport, OutboundQueue, Transport};
