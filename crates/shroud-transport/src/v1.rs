//! Legacy plaintext framing.
//!
//! Wire layout: `magic(4) || command(12, null-padded ASCII) || length(4 LE)
//! || checksum(4) || payload`, with the checksum being the first four
//! bytes of the double-SHA256 of the payload.

use sha2::{Digest, Sha256};

use crate::config::TransportConfig;
use crate::error::ShroudTransportError;
use crate::message::{is_valid_msg_type, ReceivedMessage, SerializedMessage};
use crate::{TransportDeserializer, TransportSerializer};

pub const V1_HEADER_SIZE: usize = 24;
const COMMAND_SIZE: usize = 12;
const CHECKSUM_SIZE: usize = 4;

fn payload_checksum(payload: &[u8]) -> [u8; CHECKSUM_SIZE] {
    let digest = Sha256::digest(Sha256::digest(payload));
    digest[..CHECKSUM_SIZE].try_into().expect("digest is 32 bytes")
}

#[derive(Debug)]
pub struct V1TransportSerializer {
    magic: [u8; 4],
}

impl V1TransportSerializer {
    pub fn new(config: &TransportConfig) -> Self {
        Self {
            magic: config.magic,
        }
    }
}

impl TransportSerializer for V1TransportSerializer {
    fn prepare_for_transport(
        &mut self,
        msg: &mut SerializedMessage,
    ) -> Result<Vec<u8>, ShroudTransportError> {
        if !is_valid_msg_type(&msg.msg_type) {
            return Err(ShroudTransportError::InvalidMessageType(
                msg.msg_type.clone(),
            ));
        }
        let mut header = Vec::with_capacity(V1_HEADER_SIZE);
        header.extend_from_slice(&self.magic);
        let mut command = [0u8; COMMAND_SIZE];
        command[..msg.msg_type.len()].copy_from_slice(msg.msg_type.as_bytes());
        header.extend_from_slice(&command);
        header.extend_from_slice(&(msg.payload.len() as u32).to_le_bytes());
        header.extend_from_slice(&payload_checksum(&msg.payload));
        Ok(header)
    }
}

#[derive(Debug)]
pub struct V1TransportDeserializer {
    magic: [u8; 4],
    max_message_size: usize,
    /// Raw header bytes, then parsed fields once complete.
    header: Vec<u8>,
    msg_type: String,
    checksum: [u8; CHECKSUM_SIZE],
    payload_len: usize,
    payload: Vec<u8>,
    in_payload: bool,
}

impl V1TransportDeserializer {
    pub fn new(config: &TransportConfig) -> Self {
        Self {
            magic: config.magic,
            max_message_size: config.max_message_size,
            header: Vec::with_capacity(V1_HEADER_SIZE),
            msg_type: String::new(),
            checksum: [0u8; CHECKSUM_SIZE],
            payload_len: 0,
            payload: Vec::new(),
            in_payload: false,
        }
    }

    fn reset(&mut self) {
        self.header.clear();
        self.msg_type.clear();
        self.checksum = [0u8; CHECKSUM_SIZE];
        self.payload_len = 0;
        self.payload = Vec::new();
        self.in_payload = false;
    }

    /// Parse the 24 buffered header bytes. Magic or command violations
    /// poison the stream; there is no way to resynchronize.
    fn parse_header(&mut self) -> Result<(), ShroudTransportError> {
        let magic: [u8; 4] = self.header[..4].try_into().expect("header is complete");
        if magic != self.magic {
            return Err(ShroudTransportError::MagicMismatch { got: magic });
        }

        let command = &self.header[4..4 + COMMAND_SIZE];
        let end = command.iter().position(|b| *b == 0).unwrap_or(COMMAND_SIZE);
        if command[end..].iter().any(|b| *b != 0) {
            // Nonzero byte after the first null padding byte.
            return Err(ShroudTransportError::InvalidMessageType(
                String::from_utf8_lossy(command).into_owned(),
            ));
        }
        let msg_type = std::str::from_utf8(&command[..end])
            .ok()
            .filter(|t| is_valid_msg_type(t))
            .ok_or_else(|| {
                ShroudTransportError::InvalidMessageType(
                    String::from_utf8_lossy(&command[..end]).into_owned(),
                )
            })?;
        self.msg_type = msg_type.to_string();

        let length: [u8; 4] = self.header[16..20].try_into().expect("header is complete");
        self.payload_len = u32::from_le_bytes(length) as usize;
        if self.payload_len > self.max_message_size {
            return Err(ShroudTransportError::MessageTooLarge {
                size: self.payload_len,
                max: self.max_message_size,
            });
        }
        self.checksum = self.header[20..24].try_into().expect("header is complete");
        self.payload.reserve_exact(self.payload_len);
        self.in_payload = true;
        Ok(())
    }
}

impl TransportDeserializer for V1TransportDeserializer {
    fn read(&mut self, bytes: &[u8]) -> Result<usize, ShroudTransportError> {
        let mut consumed = 0;
        while consumed < bytes.len() && !self.complete() {
            if !self.in_payload {
                let want = V1_HEADER_SIZE - self.header.len();
                let take = want.min(bytes.len() - consumed);
                self.header.extend_from_slice(&bytes[consumed..consumed + take]);
                consumed += take;
                if self.header.len() == V1_HEADER_SIZE {
                    self.parse_header()?;
                }
            } else {
                let want = self.payload_len - self.payload.len();
                let take = want.min(bytes.len() - consumed);
                self.payload
                    .extend_from_slice(&bytes[consumed..consumed + take]);
                consumed += take;
            }
        }
        Ok(consumed)
    }

    fn complete(&self) -> bool {
        self.in_payload && self.payload.len() == self.payload_len
    }

    fn get_message(&mut self) -> Result<ReceivedMessage, ShroudTransportError> {
        if !self.complete() {
            return Err(ShroudTransportError::Incomplete);
        }
        let reject = payload_checksum(&self.payload) != self.checksum;
        if reject {
            tracing::warn!(msg_type = %self.msg_type, "checksum mismatch, dropping message");
        }
        let message = ReceivedMessage {
            msg_type: std::mem::take(&mut self.msg_type),
            payload: std::mem::take(&mut self.payload),
            reject,
            disconnect: false,
        };
        self.reset();
        Ok(message)
    }
}
