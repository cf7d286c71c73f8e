//! Shroud message transport.
//!
//! Two interchangeable serializer/deserializer pairs over a reliable
//! byte stream:
//!
//! - **V1**: the legacy plaintext framing (`magic || command || length ||
//!   checksum || payload`).
//! - **V2**: BIP324 encrypted packets, fed by the EllSwift handshake in
//!   [`V2Transport`].
//!
//! Everything here is a synchronous state transformer: the caller owns
//! the socket, pushes received bytes through [`TransportDeserializer::read`]
//! and writes out whatever [`TransportSerializer::prepare_for_transport`]
//! returns. Nothing blocks and nothing retries; protocol failures are
//! terminal for the connection.

pub mod config;
pub mod error;
pub mod message;
pub mod v1;
pub mod v2;

pub use config::{TransportConfig, MAINNET_MAGIC};
pub use error::ShroudTransportError;
pub use message::{ReceivedMessage, SerializedMessage, MAX_MSG_TYPE_SIZE};
pub use v1::{V1TransportDeserializer, V1TransportSerializer};
pub use v2::{V2Transport, V2TransportDeserializer, V2TransportSerializer};

/// Turns one outbound message into wire bytes.
pub trait TransportSerializer {
    /// Produce the header bytes for `msg` and rewrite `msg.payload` into
    /// its on-the-wire form (V2 encrypts it in place; V1 leaves it
    /// alone). The caller transmits the returned header followed by the
    /// payload.
    fn prepare_for_transport(
        &mut self,
        msg: &mut SerializedMessage,
    ) -> Result<Vec<u8>, ShroudTransportError>;
}

/// Reassembles inbound wire bytes into messages.
pub trait TransportDeserializer {
    /// Consume bytes from the stream. Returns how many were used; the
    /// caller re-offers the remainder once [`complete`](Self::complete)
    /// has been observed and the message collected.
    fn read(&mut self, bytes: &[u8]) -> Result<usize, ShroudTransportError>;

    /// Whether a full message is buffered.
    fn complete(&self) -> bool;

    /// Hand out the buffered message and reset for the next one. The
    /// `reject` flag marks messages the caller must drop without
    /// processing; `disconnect` marks the connection as unusable.
    fn get_message(&mut self) -> Result<ReceivedMessage, ShroudTransportError>;
}
