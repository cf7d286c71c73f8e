/// Errors returned by the Shroud cryptographic core.
#[derive(Debug, thiserror::Error)]
pub enum ShroudCryptoError {
    #[error("ellswift encoding must be 64 bytes, got {0}")]
    InvalidEllSwiftLength(usize),

    #[error("ECDH peer point is the point at infinity")]
    EcdhZeroPoint,

    #[error("ECDH private key is zero modulo the curve order")]
    EcdhZeroScalar,

    #[error("packet authentication failed")]
    AeadAuthFail,

    #[error("contents length {0} does not fit the 3-byte length field")]
    LengthTooLarge(usize),

    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },
}

/// Coarse classification used by callers to decide between "fix the code"
/// and "tear down the connection".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller misuse (buffer sizing, oversized contents). Not retryable.
    InvariantViolation,
    /// Peer sent something we must not accept. The connection is dead.
    Protocol,
}

impl ShroudCryptoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ShroudCryptoError::BufferTooSmall { .. } | ShroudCryptoError::LengthTooLarge(_) => {
                ErrorKind::InvariantViolation
            }
            ShroudCryptoError::InvalidEllSwiftLength(_)
            | ShroudCryptoError::EcdhZeroPoint
            | ShroudCryptoError::EcdhZeroScalar
            | ShroudCryptoError::AeadAuthFail => ErrorKind::Protocol,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_buffer_too_small() {
        let err = ShroudCryptoError::BufferTooSmall {
            needed: 20,
            available: 4,
        };
        assert_eq!(err.to_string(), "buffer too small: need 20 bytes, have 4");
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
    }

    #[test]
    fn display_aead_auth_fail() {
        let err = ShroudCryptoError::AeadAuthFail;
        assert_eq!(err.to_string(), "packet authentication failed");
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }
}
