//! v2 session key derivation.
//!
//! The ECDH secret is bound to both EllSwift encodings through a tagged
//! hash, then expanded with HKDF-SHA256 (salted by the network magic)
//! into the per-direction cipher keys, the garbage terminators and the
//! session id.

use hkdf::Hkdf;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::ellswift::{ellswift_xdh, EllSwiftPubKey};
use crate::error::ShroudCryptoError;

/// Tag for the ECDH secret hash. Fixed by the wire protocol.
const ECDH_HASH_TAG: &[u8] = b"bip324_ellswift_xonly_ecdh";

/// HKDF salt prefix, followed by the 4-byte network magic. Fixed by the
/// wire protocol.
const SESSION_SALT_PREFIX: &[u8] = b"bitcoin_v2_shared_secret";

/// A derived ECDH secret. Zeroized when dropped.
pub type EcdhSecret = Zeroizing<[u8; 32]>;

/// The full output of session derivation. Both peers derive bit-identical
/// values from the same pair of EllSwift encodings and network magic.
///
/// `session_id` is not secret and may be shown to users for out-of-band
/// comparison; everything else is key material.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SessionKeys {
    /// FSChaCha20 length-field key for initiator-to-responder packets.
    pub initiator_l: [u8; 32],
    /// AEAD packet key for initiator-to-responder packets.
    pub initiator_p: [u8; 32],
    /// FSChaCha20 length-field key for responder-to-initiator packets.
    pub responder_l: [u8; 32],
    /// AEAD packet key for responder-to-initiator packets.
    pub responder_p: [u8; 32],
    /// Stable identifier of this session.
    pub session_id: [u8; 32],
    /// Marks the end of the initiator's garbage prefix.
    pub initiator_garbage_terminator: [u8; 16],
    /// Marks the end of the responder's garbage prefix.
    pub responder_garbage_terminator: [u8; 16],
}

impl std::fmt::Debug for SessionKeys {
    /// Only the public session id; the keys stay out of logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

/// SHA256(SHA256(tag) || SHA256(tag) || parts...)
fn tagged_hash(tag: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    let tag_hash = Sha256::digest(tag);
    let mut hasher = Sha256::new();
    hasher.update(tag_hash);
    hasher.update(tag_hash);
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Compute the v2 ECDH secret for this connection.
///
/// The secret is the tagged hash of the two EllSwift encodings in
/// initiator/responder order followed by the shared X coordinate, so both
/// peers call this with their own role in `initiating` and obtain the
/// same value.
pub fn v2_ecdh(
    seckey: &[u8; 32],
    theirs: &EllSwiftPubKey,
    ours: &EllSwiftPubKey,
    initiating: bool,
) -> Result<EcdhSecret, ShroudCryptoError> {
    let secret = ellswift_xdh(seckey, theirs, ours, |x32, ours, theirs| {
        let (initiator, responder) = if initiating {
            (ours, theirs)
        } else {
            (theirs, ours)
        };
        tagged_hash(
            ECDH_HASH_TAG,
            &[initiator.as_bytes(), responder.as_bytes(), x32],
        )
    })?;
    Ok(Zeroizing::new(secret))
}

/// Expand an ECDH secret into the session keys.
///
/// One HKDF-SHA256 extract (salt = `"bitcoin_v2_shared_secret"` || magic)
/// followed by one expand per output; the two garbage terminators are the
/// halves of a single 32-byte expand.
pub fn derive_session(ecdh_secret: &EcdhSecret, magic: [u8; 4]) -> SessionKeys {
    let mut salt = [0u8; SESSION_SALT_PREFIX.len() + 4];
    salt[..SESSION_SALT_PREFIX.len()].copy_from_slice(SESSION_SALT_PREFIX);
    salt[SESSION_SALT_PREFIX.len()..].copy_from_slice(&magic);
    let hkdf = Hkdf::<Sha256>::new(Some(&salt[..]), &ecdh_secret[..]);

    let mut keys = SessionKeys {
        initiator_l: [0u8; 32],
        initiator_p: [0u8; 32],
        responder_l: [0u8; 32],
        responder_p: [0u8; 32],
        session_id: [0u8; 32],
        initiator_garbage_terminator: [0u8; 16],
        responder_garbage_terminator: [0u8; 16],
    };
    let expand32 = |info: &[u8], out: &mut [u8; 32]| {
        hkdf.expand(info, out)
            .expect("HKDF-SHA256 expand to 32 bytes always succeeds");
    };
    expand32(b"initiator_L", &mut keys.initiator_l);
    expand32(b"initiator_P", &mut keys.initiator_p);
    expand32(b"responder_L", &mut keys.responder_l);
    expand32(b"responder_P", &mut keys.responder_p);
    expand32(b"session_id", &mut keys.session_id);

    let mut terminators = [0u8; 32];
    expand32(b"garbage_terminators", &mut terminators);
    keys.initiator_garbage_terminator
        .copy_from_slice(&terminators[..16]);
    keys.responder_garbage_terminator
        .copy_from_slice(&terminators[16..]);
    terminators.zeroize();

    keys
}
