use shroud_crypto::DEFAULT_REKEY_INTERVAL;

/// Network magic of the main network.
pub const MAINNET_MAGIC: [u8; 4] = [0xf9, 0xbe, 0xb4, 0xd9];

/// Protocol ceiling for one message's payload.
const MAX_MESSAGE_SIZE: usize = 4_000_000;

/// Transport parameters shared by both framing versions.
///
/// All fields have defaults for the main network:
///
/// ```rust
/// use shroud_transport::TransportConfig;
///
/// let config = TransportConfig::new([0x0b, 0x11, 0x09, 0x07])
///     .rekey_interval(64)
///     .max_message_size(2 * 1024 * 1024);
/// ```
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// 4-byte network identifier; prefixes V1 headers and salts the V2
    /// session derivation. Must match on both peers.
    pub(crate) magic: [u8; 4],
    /// Packets between V2 rekeys. Must match on both peers.
    pub(crate) rekey_interval: u32,
    /// Largest accepted message payload.
    pub(crate) max_message_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::new(MAINNET_MAGIC)
    }
}

impl TransportConfig {
    pub fn new(magic: [u8; 4]) -> Self {
        Self {
            magic,
            rekey_interval: DEFAULT_REKEY_INTERVAL,
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }

    /// Set the V2 rekey interval (default: 224 packets).
    pub fn rekey_interval(mut self, packets: u32) -> Self {
        self.rekey_interval = packets;
        self
    }

    /// Set the maximum accepted payload size (default: 4 MB).
    pub fn max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = bytes;
        self
    }

    pub fn magic(&self) -> [u8; 4] {
        self.magic
    }
}
