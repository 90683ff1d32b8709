//! # Bridge Host Module
//!
//! The host end of the Bridge protocol. It owns the live objects the caller
//! addresses by Object-ID, applies inbound operations to them and reports
//! lifecycle and interest events back over the same transport.
//!
//! The system is organized into several sub-modules:
//! - `object`: Host object model, member tables and the object store
//! - `property`: Path accessor engine (get / set / assign) and JSON conversion
//! - `dispatch`: Inbound operation handlers and outbound reporting
//! - `animation`: Time-driven tweens started by `Animate`
//! - `resource`: Named assets reachable through `resource:` steps

// Module declarations
pub mod animation; // Tween stepping
pub mod dispatch; // Operation handling
pub mod object; // Host object model
pub mod property; // Path accessor engine
pub mod resource; // Resource lookup

// Re-export commonly used items
pub use dispatch::{Host, HostError};
pub use object::{
    handle, Behaviour, ClassRegistry, GameObject, HostObject, MemberTable, Node, ObjectHandle,
    ObjectStore,
};
pub use property::{assign, resolve_get, resolve_set, ResolutionError, ResolveContext};
pub use resource::{MemoryResources, ResourceProvider};
