//! Shroud cryptographic core.
//!
//! Implements the primitives behind the v2 encrypted peer-to-peer
//! transport: the ElligatorSwift (EllSwift) 64-byte public-key encoding,
//! X-only ECDH plus HKDF session derivation, the forward-secure
//! FSChaCha20 stream cipher, and the BIP324 packet cipher suite
//! (ChaCha20-Poly1305 with an encrypted length field).
//!
//! Curve arithmetic: secp256k1 via `k256`.
//! AEAD: RFC 8439 via `chacha20poly1305`.
//!
//! Every struct holding key material zeroizes it on drop.

pub mod cmp;
pub mod ellswift;
pub mod error;
pub mod fschacha20;
pub mod session;
pub mod suite;

pub use cmp::timingsafe_bcmp;
pub use ellswift::{ellswift_create, ellswift_xdh, EllSwiftPubKey, ELLSWIFT_ENCODED_SIZE};
pub use error::{ErrorKind, ShroudCryptoError};
pub use fschacha20::FsChaCha20;
pub use session::{derive_session, v2_ecdh, EcdhSecret, SessionKeys};
pub use suite::{
    Bip324CipherSuite, HeaderFlags, DEFAULT_REKEY_INTERVAL, EXPANSION, HEADER_LEN,
    LENGTH_FIELD_LEN, MIN_PACKET_LEN,
};
