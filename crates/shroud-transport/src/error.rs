use shroud_crypto::ShroudCryptoError;

/// Errors returned by the transport layer.
///
/// Anything that is not [`ShroudTransportError::InvalidMessageType`] or
/// [`ShroudTransportError::Incomplete`] means the byte stream can no
/// longer be trusted and the connection must be closed.
#[derive(Debug, thiserror::Error)]
pub enum ShroudTransportError {
    #[error("crypto failure: {0}")]
    Crypto(#[from] ShroudCryptoError),

    #[error("invalid message type: {0:?}")]
    InvalidMessageType(String),

    #[error("message start mismatch: got {got:02x?}")]
    MagicMismatch { got: [u8; 4] },

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("no garbage terminator within {0} bytes")]
    GarbageTerminatorNotFound(usize),

    #[error("message incomplete")]
    Incomplete,
}
