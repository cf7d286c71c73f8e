/// Errors from address decoding and parsing.
///
/// Message texts for BIP155 failures are part of the cross-implementation
/// contract and are matched verbatim by tests.
#[derive(Debug, thiserror::Error)]
pub enum ShroudNetError {
    #[error("Address too long: {0} > 512")]
    AddressTooLong(u64),

    #[error("BIP155 {network} address with length {length} (should be {expected})")]
    InvalidBip155Length {
        network: &'static str,
        length: u64,
        expected: usize,
    },

    #[error("end of data")]
    EndOfData,

    #[error("non-canonical compact size")]
    NonCanonicalCompactSize,

    #[error("compact size exceeds maximum: {0}")]
    CompactSizeTooLarge(u64),

    #[error("invalid address string: {0}")]
    InvalidAddressString(String),
}
