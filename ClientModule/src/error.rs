//! # Client Errors

use bridge_shared::{CodecError, ObjectId, ParseError, SendError, TransportError};
use thiserror::Error;

/// Why a caller-side request could not be issued
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The ID was never issued, or its object has been destroyed
    #[error("unknown object ID `{0}`")]
    UnknownObjectId(ObjectId),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl From<SendError> for BridgeError {
    fn from(err: SendError) -> Self {
        match err {
            SendError::Codec(err) => BridgeError::Codec(err),
            SendError::Transport(err) => BridgeError::Transport(err),
        }
    }
}
