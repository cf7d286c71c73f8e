use std::fmt;

/// Longest allowed message type string.
pub const MAX_MSG_TYPE_SIZE: usize = 12;

/// Message type strings with meaning to the surrounding node. The
/// transport treats all types as opaque; these exist for callers and
/// tests.
pub mod msg_type {
    pub const VERSION: &str = "version";
    pub const VERACK: &str = "verack";
    pub const PING: &str = "ping";
    pub const PONG: &str = "pong";
    pub const TX: &str = "tx";
    pub const INV: &str = "inv";
    pub const ADDRV2: &str = "addrv2";
}

/// An outbound message: a type string and an opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedMessage {
    pub msg_type: String,
    pub payload: Vec<u8>,
}

impl SerializedMessage {
    pub fn new(msg_type: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            msg_type: msg_type.into(),
            payload,
        }
    }
}

/// An inbound message plus the verdict of the framing layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub msg_type: String,
    pub payload: Vec<u8>,
    /// Drop this message without processing it.
    pub reject: bool,
    /// The connection must be closed.
    pub disconnect: bool,
}

/// Message types are short graphic-ASCII strings.
pub(crate) fn is_valid_msg_type(msg_type: &str) -> bool {
    !msg_type.is_empty()
        && msg_type.len() <= MAX_MSG_TYPE_SIZE
        && msg_type.bytes().all(|b| (0x21..=0x7e).contains(&b))
}

/// Render bytes as lowercase hex for log lines.
pub(crate) struct HexDisplay<'a>(pub &'a [u8]);

impl fmt::Display for HexDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msg_type_validation() {
        assert!(is_valid_msg_type("verack"));
        assert!(is_valid_msg_type("foobar"));
        assert!(is_valid_msg_type("abcdefghijkl")); // exactly 12
        assert!(!is_valid_msg_type(""));
        assert!(!is_valid_msg_type("abcdefghijklm")); // 13
        assert!(!is_valid_msg_type("has space"));
        assert!(!is_valid_msg_type("nul\0led"));
        assert!(!is_valid_msg_type("ütf8"));
    }

    #[test]
    fn hex_display() {
        assert_eq!(HexDisplay(&[0x00, 0xab, 0x1f]).to_string(), "00ab1f");
    }
}
