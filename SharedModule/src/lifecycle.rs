//! # Object Lifecycle Types
//!
//! State of a bridged object as seen from either end of the wire.

use serde::{Deserialize, Serialize};

/// The current state of an object in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectLifecycleState {
    /// `Create` has been sent but `Created` has not arrived yet
    Requested,

    /// Object is live on the host
    Active,

    /// `Destroy` has been sent; the ID is no longer usable for new operations
    PendingDestroy,
}

impl ObjectLifecycleState {
    /// Whether new operations may target an object in this state
    pub fn accepts_operations(self) -> bool {
        !matches!(self, ObjectLifecycleState::PendingDestroy)
    }
}
