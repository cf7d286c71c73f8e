//! Encrypted V2 framing over the BIP324 cipher suite.
//!
//! Each message becomes one packet whose contents are
//! `type_len(1) || type || payload`. The 3-byte length field travels
//! separately encrypted (FSChaCha20), so a passive observer learns
//! neither message boundaries nor sizes.
//!
//! The first message handed out by a fresh deserializer is always marked
//! rejected: that slot is reserved as a transport-version placeholder
//! and carries no application message.

use shroud_crypto::{
    derive_session, timingsafe_bcmp, v2_ecdh, Bip324CipherSuite, EllSwiftPubKey, HeaderFlags,
    EXPANSION, HEADER_LEN, LENGTH_FIELD_LEN, MIN_PACKET_LEN,
};

use crate::config::TransportConfig;
use crate::error::ShroudTransportError;
use crate::message::{is_valid_msg_type, HexDisplay, ReceivedMessage, SerializedMessage};
use crate::{TransportDeserializer, TransportSerializer};

/// Longest accepted garbage prefix before the terminator.
pub const MAX_GARBAGE_LEN: usize = 4095;

const GARBAGE_TERMINATOR_LEN: usize = 16;

#[derive(Debug)]
pub struct V2TransportSerializer {
    suite: Bip324CipherSuite,
}

impl V2TransportSerializer {
    pub fn new(key_l: [u8; 32], key_p: [u8; 32]) -> Self {
        Self {
            suite: Bip324CipherSuite::new(key_l, key_p),
        }
    }

    pub fn with_rekey_interval(key_l: [u8; 32], key_p: [u8; 32], rekey_interval: u32) -> Self {
        Self {
            suite: Bip324CipherSuite::with_rekey_interval(key_l, key_p, rekey_interval),
        }
    }

    /// Produce a decoy packet of `len` arbitrary contents bytes. The
    /// receiver discards it without processing.
    pub fn prepare_decoy(&mut self, len: usize) -> Result<Vec<u8>, ShroudTransportError> {
        let contents = vec![0u8; len];
        let mut packet = vec![0u8; MIN_PACKET_LEN + len];
        self.suite
            .encrypt(&[], &contents, HeaderFlags::IGNORE, &mut packet)?;
        Ok(packet)
    }
}

impl TransportSerializer for V2TransportSerializer {
    fn prepare_for_transport(
        &mut self,
        msg: &mut SerializedMessage,
    ) -> Result<Vec<u8>, ShroudTransportError> {
        if !is_valid_msg_type(&msg.msg_type) {
            return Err(ShroudTransportError::InvalidMessageType(
                msg.msg_type.clone(),
            ));
        }
        let mut contents =
            Vec::with_capacity(1 + msg.msg_type.len() + msg.payload.len());
        contents.push(msg.msg_type.len() as u8);
        contents.extend_from_slice(msg.msg_type.as_bytes());
        contents.extend_from_slice(&msg.payload);

        let mut packet = vec![0u8; MIN_PACKET_LEN + contents.len()];
        self.suite
            .encrypt(&[], &contents, HeaderFlags::NONE, &mut packet)?;

        // The encrypted length field is the header; the rest rides in
        // the payload slot.
        let header = packet[..LENGTH_FIELD_LEN].to_vec();
        msg.payload = packet[LENGTH_FIELD_LEN..].to_vec();
        Ok(header)
    }
}

#[derive(Debug)]
enum ReadState {
    /// Discarding the peer's garbage prefix, watching for its terminator.
    Garbage,
    /// Collecting the 3-byte encrypted length.
    Length,
    /// Collecting `1 + contents_len + 16` packet body bytes.
    Contents { body_len: usize },
}

#[derive(Debug)]
pub struct V2TransportDeserializer {
    suite: Bip324CipherSuite,
    state: ReadState,
    buf: Vec<u8>,
    max_message_size: usize,
    recv_garbage_terminator: [u8; GARBAGE_TERMINATOR_LEN],
    /// Messages handed out so far; slot 0 is the version placeholder.
    messages: u64,
}

impl V2TransportDeserializer {
    pub fn new(key_l: [u8; 32], key_p: [u8; 32]) -> Self {
        Self::build(Bip324CipherSuite::new(key_l, key_p), None, 4_000_000)
    }

    pub fn with_rekey_interval(key_l: [u8; 32], key_p: [u8; 32], rekey_interval: u32) -> Self {
        Self::build(
            Bip324CipherSuite::with_rekey_interval(key_l, key_p, rekey_interval),
            None,
            4_000_000,
        )
    }

    /// A deserializer that first discards the peer's garbage prefix, up
    /// to and including the given terminator.
    pub fn with_garbage_terminator(
        suite: Bip324CipherSuite,
        terminator: [u8; GARBAGE_TERMINATOR_LEN],
        max_message_size: usize,
    ) -> Self {
        Self::build(suite, Some(terminator), max_message_size)
    }

    fn build(
        suite: Bip324CipherSuite,
        terminator: Option<[u8; GARBAGE_TERMINATOR_LEN]>,
        max_message_size: usize,
    ) -> Self {
        Self {
            suite,
            state: match terminator {
                Some(_) => ReadState::Garbage,
                None => ReadState::Length,
            },
            buf: Vec::new(),
            max_message_size,
            recv_garbage_terminator: terminator.unwrap_or([0u8; GARBAGE_TERMINATOR_LEN]),
            messages: 0,
        }
    }

    fn on_length_complete(&mut self) -> Result<(), ShroudTransportError> {
        let encrypted: [u8; LENGTH_FIELD_LEN] =
            self.buf[..].try_into().expect("length field is buffered");
        let contents_len = self.suite.decrypt_length(&encrypted) as usize;
        if contents_len > self.max_message_size {
            return Err(ShroudTransportError::MessageTooLarge {
                size: contents_len,
                max: self.max_message_size,
            });
        }
        self.buf.clear();
        self.buf.reserve_exact(HEADER_LEN + contents_len + EXPANSION);
        self.state = ReadState::Contents {
            body_len: HEADER_LEN + contents_len + EXPANSION,
        };
        Ok(())
    }
}

impl TransportDeserializer for V2TransportDeserializer {
    fn read(&mut self, bytes: &[u8]) -> Result<usize, ShroudTransportError> {
        let mut consumed = 0;
        while consumed < bytes.len() {
            match self.state {
                ReadState::Garbage => {
                    // One byte at a time, matching the last 16 buffered
                    // bytes against the terminator.
                    self.buf.push(bytes[consumed]);
                    consumed += 1;
                    let len = self.buf.len();
                    if len >= GARBAGE_TERMINATOR_LEN
                        && timingsafe_bcmp(
                            &self.buf[len - GARBAGE_TERMINATOR_LEN..],
                            &self.recv_garbage_terminator,
                        )
                    {
                        self.buf.clear();
                        self.state = ReadState::Length;
                    } else if len > MAX_GARBAGE_LEN + GARBAGE_TERMINATOR_LEN {
                        return Err(ShroudTransportError::GarbageTerminatorNotFound(
                            MAX_GARBAGE_LEN,
                        ));
                    }
                }
                ReadState::Length => {
                    let want = LENGTH_FIELD_LEN - self.buf.len();
                    let take = want.min(bytes.len() - consumed);
                    self.buf.extend_from_slice(&bytes[consumed..consumed + take]);
                    consumed += take;
                    if self.buf.len() == LENGTH_FIELD_LEN {
                        self.on_length_complete()?;
                    }
                }
                ReadState::Contents { body_len } => {
                    if self.buf.len() == body_len {
                        // A full packet is waiting to be collected.
                        break;
                    }
                    let want = body_len - self.buf.len();
                    let take = want.min(bytes.len() - consumed);
                    self.buf.extend_from_slice(&bytes[consumed..consumed + take]);
                    consumed += take;
                }
            }
        }
        Ok(consumed)
    }

    fn complete(&self) -> bool {
        matches!(self.state, ReadState::Contents { body_len } if self.buf.len() == body_len)
    }

    fn get_message(&mut self) -> Result<ReceivedMessage, ShroudTransportError> {
        if !self.complete() {
            return Err(ShroudTransportError::Incomplete);
        }
        let mut contents = vec![0u8; self.buf.len() - HEADER_LEN - EXPANSION];
        // An authentication failure is terminal: the packet counters can
        // never resynchronize with the peer.
        let flags = self
            .suite
            .decrypt(&[], &self.buf, &mut contents)
            .map_err(|err| {
                tracing::warn!("packet authentication failed, dropping connection");
                ShroudTransportError::from(err)
            })?;

        self.buf = Vec::new();
        self.state = ReadState::Length;
        let index = self.messages;
        self.messages += 1;

        let rejected = |reason: &str| {
            tracing::warn!(index, reason, "rejecting v2 message");
            ReceivedMessage {
                msg_type: String::new(),
                payload: Vec::new(),
                reject: true,
                disconnect: false,
            }
        };

        // Slot 0 is reserved for transport-version negotiation.
        if index == 0 {
            return Ok(ReceivedMessage {
                msg_type: String::new(),
                payload: Vec::new(),
                reject: true,
                disconnect: false,
            });
        }
        if flags.ignore() {
            return Ok(rejected("decoy packet"));
        }
        let Some((&type_len, rest)) = contents.split_first() else {
            return Ok(rejected("empty contents"));
        };
        let type_len = usize::from(type_len);
        if type_len > rest.len() {
            return Ok(rejected("truncated message type"));
        }
        let (type_bytes, payload) = rest.split_at(type_len);
        let Some(msg_type) = std::str::from_utf8(type_bytes)
            .ok()
            .filter(|t| is_valid_msg_type(t))
        else {
            return Ok(rejected("malformed message type"));
        };

        Ok(ReceivedMessage {
            msg_type: msg_type.to_string(),
            payload: payload.to_vec(),
            reject: false,
            disconnect: false,
        })
    }
}

/// A fully keyed V2 transport for one connection: serializer for our
/// direction, deserializer for the peer's, derived from the EllSwift
/// handshake.
#[derive(Debug)]
pub struct V2Transport {
    pub serializer: V2TransportSerializer,
    pub deserializer: V2TransportDeserializer,
    session_id: [u8; 32],
    send_garbage_terminator: [u8; GARBAGE_TERMINATOR_LEN],
}

impl V2Transport {
    /// Key both directions from the handshake transcript: our private
    /// key and the two EllSwift encodings exchanged on the wire.
    pub fn new(
        seckey: &[u8; 32],
        ours: &EllSwiftPubKey,
        theirs: &EllSwiftPubKey,
        initiating: bool,
        config: &TransportConfig,
    ) -> Result<Self, ShroudTransportError> {
        let secret = v2_ecdh(seckey, theirs, ours, initiating)?;
        let session = derive_session(&secret, config.magic());

        let (send_l, send_p, recv_l, recv_p, send_term, recv_term) = if initiating {
            (
                session.initiator_l,
                session.initiator_p,
                session.responder_l,
                session.responder_p,
                session.initiator_garbage_terminator,
                session.responder_garbage_terminator,
            )
        } else {
            (
                session.responder_l,
                session.responder_p,
                session.initiator_l,
                session.initiator_p,
                session.responder_garbage_terminator,
                session.initiator_garbage_terminator,
            )
        };

        tracing::debug!(
            session_id = %HexDisplay(&session.session_id),
            initiating,
            "established v2 session",
        );

        Ok(Self {
            serializer: V2TransportSerializer {
                suite: Bip324CipherSuite::with_rekey_interval(
                    send_l,
                    send_p,
                    config.rekey_interval,
                ),
            },
            deserializer: V2TransportDeserializer::with_garbage_terminator(
                Bip324CipherSuite::with_rekey_interval(recv_l, recv_p, config.rekey_interval),
                recv_term,
                config.max_message_size,
            ),
            session_id: session.session_id,
            send_garbage_terminator: send_term,
        })
    }

    /// Stable session identifier, safe to show to users for out-of-band
    /// comparison.
    pub fn session_id(&self) -> [u8; 32] {
        self.session_id
    }

    /// The terminator we must send after our own garbage prefix.
    pub fn send_garbage_terminator(&self) -> [u8; GARBAGE_TERMINATOR_LEN] {
        self.send_garbage_terminator
    }
}
