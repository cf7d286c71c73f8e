//! BIP324 packet cipher suite.
//!
//! One instance encrypts (or decrypts) one direction of one connection:
//! a 3-byte length field under FSChaCha20, then the 1-byte header and
//! contents under RFC 8439 ChaCha20-Poly1305. A monotonic packet counter
//! feeds the AEAD nonce and the rekey schedule.
//!
//! Packet layout:
//! ```text
//! [ 3-byte encrypted length | 1-byte encrypted header | contents | 16-byte tag ]
//! ```

use chacha20poly1305::aead::AeadInPlace;
use chacha20poly1305::{ChaCha20Poly1305, KeyInit, Nonce, Tag};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, Zeroizing};

use crate::error::ShroudCryptoError;
use crate::fschacha20::FsChaCha20;

/// Encrypted length field size.
pub const LENGTH_FIELD_LEN: usize = 3;
/// Header (flag byte) size.
pub const HEADER_LEN: usize = 1;
/// Poly1305 tag size added by the AEAD.
pub const EXPANSION: usize = 16;
/// Smallest possible packet: empty contents.
pub const MIN_PACKET_LEN: usize = LENGTH_FIELD_LEN + HEADER_LEN + EXPANSION;
/// Packets between rekeys of the packet key. Must match on both sides.
pub const DEFAULT_REKEY_INTERVAL: u32 = 224;
/// Largest contents length representable in the 3-byte field.
pub const MAX_CONTENTS_LEN: usize = (1 << 24) - 1;

/// Domain separator for the packet-key rekey hash.
const REKEY_TAG: &[u8] = b"BIP324_rekey";

/// The packet header byte. Only one flag is currently defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeaderFlags(u8);

impl HeaderFlags {
    pub const NONE: Self = Self(0);
    /// Decoy packet; the receiver must discard the contents.
    pub const IGNORE: Self = Self(0x80);

    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn ignore(self) -> bool {
        self.0 & Self::IGNORE.0 != 0
    }
}

/// Per-direction cipher state. See the module docs for the packet layout.
///
/// Strictly single-threaded and strictly ordered: packet N+1 cannot be
/// processed before packet N because both the length stream and the nonce
/// advance with the packet counter. All key material is zeroized on drop.
pub struct Bip324CipherSuite {
    fsc20: FsChaCha20,
    key_p: Zeroizing<[u8; 32]>,
    /// SHA-256 midstate preloaded with the rekey tag; cloned per rekey.
    rekey_hasher: Sha256,
    packet_counter: u64,
    nonce: [u8; 12],
    rekey_interval: u64,
}

impl std::fmt::Debug for Bip324CipherSuite {
    /// Key material is deliberately absent.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bip324CipherSuite")
            .field("packet_counter", &self.packet_counter)
            .field("rekey_interval", &self.rekey_interval)
            .finish_non_exhaustive()
    }
}

impl Bip324CipherSuite {
    pub fn new(key_l: [u8; 32], key_p: [u8; 32]) -> Self {
        Self::with_rekey_interval(key_l, key_p, DEFAULT_REKEY_INTERVAL)
    }

    pub fn with_rekey_interval(key_l: [u8; 32], key_p: [u8; 32], rekey_interval: u32) -> Self {
        let mut rekey_hasher = Sha256::new();
        rekey_hasher.update(REKEY_TAG);
        let mut suite = Self {
            fsc20: FsChaCha20::new(key_l, rekey_interval),
            key_p: Zeroizing::new(key_p),
            rekey_hasher,
            packet_counter: 0,
            nonce: [0u8; 12],
            rekey_interval: u64::from(rekey_interval),
        };
        suite.set_nonce();
        suite
    }

    /// Number of packets processed so far.
    pub fn packet_counter(&self) -> u64 {
        self.packet_counter
    }

    /// Ratchet the keys forward, optionally mixing `data` into the packet
    /// key. Used by the rekey schedule (with empty `data`) and by
    /// handshake steps that commit both sides to transcript bytes.
    pub fn commit_to_keys(&mut self, data: &[u8], commit_to_l: bool, commit_to_p: bool) {
        if commit_to_l {
            self.fsc20.rekey();
        }
        if commit_to_p {
            let mut hasher = self.rekey_hasher.clone();
            hasher.update(data);
            hasher.update(&*self.key_p);
            let mut new_key: [u8; 32] = hasher.finalize().into();
            self.key_p.copy_from_slice(&new_key);
            new_key.zeroize();
        }
        self.set_nonce();
    }

    /// Encrypt one packet into `output`.
    ///
    /// `output` must hold `LENGTH_FIELD_LEN + HEADER_LEN + contents.len()
    /// + EXPANSION` bytes. Advances the packet counter and rekeys on
    /// schedule.
    pub fn encrypt(
        &mut self,
        aad: &[u8],
        contents: &[u8],
        flags: HeaderFlags,
        output: &mut [u8],
    ) -> Result<(), ShroudCryptoError> {
        if contents.len() > MAX_CONTENTS_LEN {
            return Err(ShroudCryptoError::LengthTooLarge(contents.len()));
        }
        let needed = LENGTH_FIELD_LEN + HEADER_LEN + contents.len() + EXPANSION;
        if output.len() < needed {
            return Err(ShroudCryptoError::BufferTooSmall {
                needed,
                available: output.len(),
            });
        }

        let length = (contents.len() as u32).to_le_bytes();
        self.fsc20
            .crypt(&length[..LENGTH_FIELD_LEN], &mut output[..LENGTH_FIELD_LEN]);

        let body_len = HEADER_LEN + contents.len();
        output[LENGTH_FIELD_LEN] = flags.bits();
        output[LENGTH_FIELD_LEN + HEADER_LEN..LENGTH_FIELD_LEN + body_len]
            .copy_from_slice(contents);
        let cipher = ChaCha20Poly1305::new((&*self.key_p).into());
        let tag = cipher
            .encrypt_in_place_detached(
                Nonce::from_slice(&self.nonce),
                aad,
                &mut output[LENGTH_FIELD_LEN..LENGTH_FIELD_LEN + body_len],
            )
            .expect("in-memory AEAD encryption is infallible");
        output[LENGTH_FIELD_LEN + body_len..needed].copy_from_slice(&tag);

        self.advance();
        Ok(())
    }

    /// Decrypt the 3-byte length field. Must be called exactly once per
    /// packet, before [`decrypt`](Self::decrypt), so the caller knows how
    /// many further bytes to read.
    pub fn decrypt_length(&mut self, encrypted_length: &[u8; LENGTH_FIELD_LEN]) -> u32 {
        let mut length = [0u8; LENGTH_FIELD_LEN];
        self.fsc20.crypt(encrypted_length, &mut length);
        u32::from(length[0]) | u32::from(length[1]) << 8 | u32::from(length[2]) << 16
    }

    /// Authenticate and decrypt one packet body (everything after the
    /// length field). Returns the header flags; the contents land in
    /// `output`.
    ///
    /// On authentication failure the packet counter is left untouched and
    /// the connection must be abandoned; the streams cannot resynchronize.
    pub fn decrypt(
        &mut self,
        aad: &[u8],
        input: &[u8],
        output: &mut [u8],
    ) -> Result<HeaderFlags, ShroudCryptoError> {
        if input.len() < HEADER_LEN + EXPANSION {
            return Err(ShroudCryptoError::BufferTooSmall {
                needed: HEADER_LEN + EXPANSION,
                available: input.len(),
            });
        }
        let contents_len = input.len() - HEADER_LEN - EXPANSION;
        if output.len() < contents_len {
            return Err(ShroudCryptoError::BufferTooSmall {
                needed: contents_len,
                available: output.len(),
            });
        }

        let (body, tag) = input.split_at(input.len() - EXPANSION);
        let mut buffer = body.to_vec();
        let cipher = ChaCha20Poly1305::new((&*self.key_p).into());
        cipher
            .decrypt_in_place_detached(
                Nonce::from_slice(&self.nonce),
                aad,
                &mut buffer,
                Tag::from_slice(tag),
            )
            .map_err(|_| ShroudCryptoError::AeadAuthFail)?;

        let flags = HeaderFlags::from_bits(buffer[0]);
        output[..contents_len].copy_from_slice(&buffer[HEADER_LEN..]);
        buffer.zeroize();

        self.advance();
        Ok(flags)
    }

    fn advance(&mut self) {
        self.packet_counter += 1;
        if self.packet_counter % self.rekey_interval == 0 {
            // The length key ratchets itself inside FsChaCha20; only the
            // packet key needs committing here.
            tracing::debug!(packet_counter = self.packet_counter, "rekeying packet key");
            self.commit_to_keys(&[], false, true);
        }
        self.set_nonce();
    }

    /// Nonce = LE32(low counter half) || LE64(high counter half), matching
    /// the RFC 8439 state layout.
    fn set_nonce(&mut self) {
        self.nonce[..4].copy_from_slice(&(self.packet_counter as u32).to_le_bytes());
        self.nonce[4..].copy_from_slice(&(self.packet_counter >> 32).to_le_bytes());
    }
}
