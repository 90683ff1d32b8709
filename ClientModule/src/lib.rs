//! # Bridge Client Module
//!
//! Caller end of the Bridge protocol. A [`Bridge`] issues Object-IDs and
//! Callback-IDs, turns caller requests into outbound operations, and routes
//! the host's replies and events back to caller code.
//!
//! The system is organized into several sub-modules:
//! - `bridge`: The coordinator and its outbound API
//! - `router`: Distribution of inbound operations
//! - `object`: Caller-side object table and interests
//! - `callback`: Pending continuations keyed by Callback-ID
//! - `net`: tokio channel transport and pump

// Module declarations
pub mod bridge; // Coordinator
pub mod callback; // Callback table
pub mod error; // Client errors
pub mod net; // Channel transport and pump
pub mod object; // Object table
pub mod router; // Inbound routing

// Re-export commonly used items
pub use bridge::Bridge;
pub use callback::{Callback, CallbackTable};
pub use error::BridgeError;
pub use net::{channel, run_pump, ChannelTransport};
pub use object::{ClientObject, Interest, InterestHandler, ObjectTable};
