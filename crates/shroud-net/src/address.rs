//! Network addresses and their BIP155 wire encoding.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use data_encoding::BASE32_NOPAD;
use sha2::{Digest, Sha256};
use sha3::Sha3_256;

use crate::error::ShroudNetError;

/// Largest allowed BIP155 address payload.
pub const MAX_ADDRV2_SIZE: u64 = 512;

/// Upper bound accepted when reading a compact size (matches the
/// serialization layer's global sanity limit, not the address limit).
const MAX_COMPACT_SIZE: u64 = 0x0200_0000;

const ADDR_IPV4_SIZE: usize = 4;
const ADDR_IPV6_SIZE: usize = 16;
const ADDR_TORV2_SIZE: usize = 10;
const ADDR_TORV3_SIZE: usize = 32;
const ADDR_I2P_SIZE: usize = 32;
const ADDR_CJDNS_SIZE: usize = 16;
const ADDR_INTERNAL_SIZE: usize = 10;

/// `0xFD` + first five bytes of SHA256("bitcoin"): marks an internal
/// placeholder name embedded in the IPv6 space.
const INTERNAL_IN_IPV6_PREFIX: [u8; 6] = [0xfd, 0x6b, 0x88, 0xc0, 0x87, 0x24];
/// Prefix of IPv4-mapped IPv6 addresses (::ffff:0:0/96).
const IPV4_IN_IPV6_PREFIX: [u8; 12] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xff, 0xff];
/// Prefix once used to embed TORv2 onions in the IPv6 space.
const TORV2_IN_IPV6_PREFIX: [u8; 6] = [0xfd, 0x87, 0xd8, 0x7e, 0xeb, 0x43];

/// SHA3-256 tag for the TORv3 onion checksum.
const ONION_CHECKSUM_TAG: &[u8] = b".onion checksum";
/// TORv3 address version.
const ONION_VERSION: u8 = 3;

/// BIP155 network identifiers.
const BIP155_IPV4: u8 = 1;
const BIP155_IPV6: u8 = 2;
const BIP155_TORV2: u8 = 3;
const BIP155_TORV3: u8 = 4;
const BIP155_I2P: u8 = 5;
const BIP155_CJDNS: u8 = 6;

/// The networks an address can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Network {
    /// Unknown or unsupported; never valid, never relayed.
    Unroutable,
    Ipv4,
    Ipv6,
    /// TORv3 hidden service (32-byte ed25519 pubkey).
    Onion,
    /// I2P (32-byte SHA-256 of the destination).
    I2p,
    /// CJDNS (IPv6-shaped, always inside fc00::/8).
    Cjdns,
    /// Internal placeholder for names that never resolved.
    Internal,
}

/// A network address without a port.
///
/// Variable-size payload depending on the network; see the BIP155 table
/// in the module tests for the exact wire sizes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NetAddress {
    net: Network,
    addr: Vec<u8>,
}

impl Default for NetAddress {
    /// The all-zero IPv6 address, like an unset peer slot.
    fn default() -> Self {
        Self {
            net: Network::Ipv6,
            addr: vec![0u8; ADDR_IPV6_SIZE],
        }
    }
}

impl NetAddress {
    pub fn ipv4(addr: Ipv4Addr) -> Self {
        Self {
            net: Network::Ipv4,
            addr: addr.octets().to_vec(),
        }
    }

    pub fn ipv6(addr: Ipv6Addr) -> Self {
        Self {
            net: Network::Ipv6,
            addr: addr.octets().to_vec(),
        }
    }

    /// A TORv3 hidden-service address from its 32-byte public key.
    pub fn onion(pubkey: [u8; ADDR_TORV3_SIZE]) -> Self {
        Self {
            net: Network::Onion,
            addr: pubkey.to_vec(),
        }
    }

    pub fn i2p(hash: [u8; ADDR_I2P_SIZE]) -> Self {
        Self {
            net: Network::I2p,
            addr: hash.to_vec(),
        }
    }

    pub fn cjdns(addr: Ipv6Addr) -> Self {
        Self {
            net: Network::Cjdns,
            addr: addr.octets().to_vec(),
        }
    }

    /// An internal placeholder address derived from a name that could not
    /// be resolved. Never valid, but serializable in both formats so it
    /// can occupy address slots.
    pub fn internal(name: &str) -> Self {
        let hash = Sha256::digest(name.as_bytes());
        Self {
            net: Network::Internal,
            addr: hash[..ADDR_INTERNAL_SIZE].to_vec(),
        }
    }

    pub fn network(&self) -> Network {
        self.net
    }

    pub fn as_addr_bytes(&self) -> &[u8] {
        &self.addr
    }

    pub fn is_ipv4(&self) -> bool {
        self.net == Network::Ipv4
    }

    pub fn is_ipv6(&self) -> bool {
        self.net == Network::Ipv6
    }

    pub fn is_tor(&self) -> bool {
        self.net == Network::Onion
    }

    pub fn is_i2p(&self) -> bool {
        self.net == Network::I2p
    }

    pub fn is_cjdns(&self) -> bool {
        self.net == Network::Cjdns
    }

    pub fn is_internal(&self) -> bool {
        self.net == Network::Internal
    }

    /// Whether this is an "any" bind address (0.0.0.0 or ::).
    pub fn is_bind_any(&self) -> bool {
        match self.net {
            Network::Ipv4 | Network::Ipv6 => self.addr.iter().all(|b| *b == 0),
            _ => false,
        }
    }

    /// Whether the address can appear in the fixed 16-byte V1 format.
    pub fn is_addr_v1_compatible(&self) -> bool {
        matches!(self.net, Network::Ipv4 | Network::Ipv6 | Network::Internal)
    }

    /// Whether this is a well-formed address of its network. Internal and
    /// unknown addresses are never valid; IPv6 slots carrying embedded
    /// IPv4 or legacy-onion prefixes are rejected.
    pub fn is_valid(&self) -> bool {
        match self.net {
            Network::Unroutable | Network::Internal => false,
            Network::Ipv4 => {
                self.addr != [0, 0, 0, 0] && self.addr != [255, 255, 255, 255]
            }
            Network::Ipv6 => {
                !self.addr.iter().all(|b| *b == 0)
                    && !self.addr.starts_with(&IPV4_IN_IPV6_PREFIX)
                    && !self.addr.starts_with(&TORV2_IN_IPV6_PREFIX)
                    && !self.addr.starts_with(&INTERNAL_IN_IPV6_PREFIX)
            }
            Network::Onion | Network::I2p => true,
            Network::Cjdns => self.addr.first() == Some(&0xfc),
        }
    }

    /// Whether the address is publicly routable. Private, loopback and
    /// link-local ranges are excluded.
    pub fn is_routable(&self) -> bool {
        if !self.is_valid() {
            return false;
        }
        match self.net {
            Network::Ipv4 => {
                let a = self.addr[0];
                let b = self.addr[1];
                // 0/8, 10/8, 127/8, 169.254/16, 172.16/12, 192.168/16
                !(a == 0
                    || a == 10
                    || a == 127
                    || (a == 169 && b == 254)
                    || (a == 172 && (16..32).contains(&b))
                    || (a == 192 && b == 168))
            }
            Network::Ipv6 => {
                let loopback = self.addr[..15].iter().all(|b| *b == 0) && self.addr[15] == 1;
                let link_local = self.addr[0] == 0xfe && self.addr[1] & 0xc0 == 0x80;
                let unique_local = self.addr[0] & 0xfe == 0xfc;
                !(loopback || link_local || unique_local)
            }
            _ => true,
        }
    }

    /// Serialize in BIP155 format: `network_id || compact_size || bytes`.
    pub fn consensus_encode_v2(&self, out: &mut Vec<u8>) {
        let id = match self.net {
            Network::Ipv4 => BIP155_IPV4,
            Network::Ipv6 => BIP155_IPV6,
            Network::Onion => BIP155_TORV3,
            Network::I2p => BIP155_I2P,
            Network::Cjdns => BIP155_CJDNS,
            // Internal and unknown addresses travel in the IPv6 slot.
            Network::Internal | Network::Unroutable => BIP155_IPV6,
        };
        out.push(id);
        match self.net {
            Network::Internal => {
                write_compact_size(out, ADDR_IPV6_SIZE as u64);
                out.extend_from_slice(&INTERNAL_IN_IPV6_PREFIX);
                out.extend_from_slice(&self.addr);
            }
            Network::Unroutable => {
                write_compact_size(out, ADDR_IPV6_SIZE as u64);
                out.extend_from_slice(&[0u8; ADDR_IPV6_SIZE]);
            }
            _ => {
                write_compact_size(out, self.addr.len() as u64);
                out.extend_from_slice(&self.addr);
            }
        }
    }

    /// Decode a BIP155 address. Returns the address and the number of
    /// bytes consumed; on error nothing is considered consumed.
    ///
    /// Unknown network identifiers decode to an invalid address rather
    /// than an error, so new networks can be introduced without splitting
    /// older peers off the address relay.
    pub fn consensus_decode_v2(buf: &[u8]) -> Result<(Self, usize), ShroudNetError> {
        let mut offset = 0;
        let id = *buf.get(offset).ok_or(ShroudNetError::EndOfData)?;
        offset += 1;

        let (length, consumed) = read_compact_size(&buf[offset..])?;
        offset += consumed;
        if length > MAX_ADDRV2_SIZE {
            return Err(ShroudNetError::AddressTooLong(length));
        }

        let expected = match id {
            BIP155_IPV4 => Some(("IPv4", ADDR_IPV4_SIZE)),
            BIP155_IPV6 => Some(("IPv6", ADDR_IPV6_SIZE)),
            BIP155_TORV2 => Some(("TORv2", ADDR_TORV2_SIZE)),
            BIP155_TORV3 => Some(("TORv3", ADDR_TORV3_SIZE)),
            BIP155_I2P => Some(("I2P", ADDR_I2P_SIZE)),
            BIP155_CJDNS => Some(("CJDNS", ADDR_CJDNS_SIZE)),
            _ => None,
        };
        if let Some((network, size)) = expected {
            if length as usize != size {
                return Err(ShroudNetError::InvalidBip155Length {
                    network,
                    length,
                    expected: size,
                });
            }
        }

        let end = offset
            .checked_add(length as usize)
            .ok_or(ShroudNetError::EndOfData)?;
        let bytes = buf.get(offset..end).ok_or(ShroudNetError::EndOfData)?;

        let address = match id {
            BIP155_IPV4 => Self {
                net: Network::Ipv4,
                addr: bytes.to_vec(),
            },
            BIP155_IPV6 => {
                if bytes.starts_with(&INTERNAL_IN_IPV6_PREFIX) {
                    Self {
                        net: Network::Internal,
                        addr: bytes[INTERNAL_IN_IPV6_PREFIX.len()..].to_vec(),
                    }
                } else {
                    // Embedded IPv4 / legacy onion stay IPv6 and fail
                    // is_valid(), mirroring the relay rules.
                    Self {
                        net: Network::Ipv6,
                        addr: bytes.to_vec(),
                    }
                }
            }
            BIP155_TORV3 => Self {
                net: Network::Onion,
                addr: bytes.to_vec(),
            },
            BIP155_I2P => Self {
                net: Network::I2p,
                addr: bytes.to_vec(),
            },
            BIP155_CJDNS => Self {
                net: Network::Cjdns,
                addr: bytes.to_vec(),
            },
            // TORv2 is gone; unknown ids may be from the future. Both
            // decode as unroutable placeholders.
            _ => {
                tracing::debug!(id, length, "skipping unroutable BIP155 address");
                Self {
                    net: Network::Unroutable,
                    addr: Vec::new(),
                }
            }
        };
        Ok((address, end))
    }

    /// The fixed 16-byte legacy (V1) form: IPv4 maps into ::ffff:0:0/96,
    /// internal names keep their prefix, everything else serializes as
    /// all zeros.
    pub fn to_v1_bytes(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        match self.net {
            Network::Ipv4 => {
                out[..12].copy_from_slice(&IPV4_IN_IPV6_PREFIX);
                out[12..].copy_from_slice(&self.addr);
            }
            Network::Ipv6 => out.copy_from_slice(&self.addr),
            Network::Internal => {
                out[..6].copy_from_slice(&INTERNAL_IN_IPV6_PREFIX);
                out[6..].copy_from_slice(&self.addr);
            }
            Network::Onion | Network::I2p | Network::Cjdns | Network::Unroutable => {}
        }
        out
    }

    /// Interpret a fixed 16-byte legacy form.
    pub fn from_v1_bytes(bytes: [u8; 16]) -> Self {
        if bytes.starts_with(&IPV4_IN_IPV6_PREFIX) {
            Self {
                net: Network::Ipv4,
                addr: bytes[12..].to_vec(),
            }
        } else if bytes.starts_with(&INTERNAL_IN_IPV6_PREFIX) {
            Self {
                net: Network::Internal,
                addr: bytes[6..].to_vec(),
            }
        } else {
            Self {
                net: Network::Ipv6,
                addr: bytes.to_vec(),
            }
        }
    }
}

fn onion_checksum(pubkey: &[u8]) -> [u8; 2] {
    let mut hasher = Sha3_256::new();
    hasher.update(ONION_CHECKSUM_TAG);
    hasher.update(pubkey);
    hasher.update([ONION_VERSION]);
    let digest = hasher.finalize();
    [digest[0], digest[1]]
}

fn base32_lower(bytes: &[u8]) -> String {
    BASE32_NOPAD.encode(bytes).to_ascii_lowercase()
}

fn base32_decode(text: &str) -> Option<Vec<u8>> {
    BASE32_NOPAD.decode(text.to_ascii_uppercase().as_bytes()).ok()
}

impl fmt::Display for NetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.net {
            Network::Ipv4 => {
                let octets: [u8; 4] = self.addr[..].try_into().expect("ipv4 payload is 4 bytes");
                write!(f, "{}", Ipv4Addr::from(octets))
            }
            Network::Ipv6 | Network::Cjdns => {
                let octets: [u8; 16] =
                    self.addr[..].try_into().expect("ipv6 payload is 16 bytes");
                // std's Display follows RFC 5952: longest zero run
                // compressed, leftmost on ties, lowercase hex.
                write!(f, "{}", Ipv6Addr::from(octets))
            }
            Network::Onion => {
                let mut data = self.addr.clone();
                data.extend_from_slice(&onion_checksum(&self.addr));
                data.push(ONION_VERSION);
                write!(f, "{}.onion", base32_lower(&data))
            }
            Network::I2p => write!(f, "{}.b32.i2p", base32_lower(&self.addr)),
            Network::Internal => write!(f, "{}.internal", base32_lower(&self.addr)),
            Network::Unroutable => write!(f, "unroutable"),
        }
    }
}

impl FromStr for NetAddress {
    type Err = ShroudNetError;

    /// Parse a textual address: dotted-quad IPv4, RFC 4291 IPv6, TORv3
    /// `.onion` or I2P `.b32.i2p`. No name resolution happens here.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(v4) = s.parse::<Ipv4Addr>() {
            return Ok(Self::ipv4(v4));
        }
        if let Ok(v6) = s.parse::<Ipv6Addr>() {
            return Ok(Self::ipv6(v6));
        }
        let lower = s.to_ascii_lowercase();
        let invalid = || ShroudNetError::InvalidAddressString(s.to_string());

        if let Some(body) = lower.strip_suffix(".onion") {
            let data = base32_decode(body).ok_or_else(invalid)?;
            // pubkey(32) + checksum(2) + version(1); TORv2 is 10 bytes
            // and anything else is malformed.
            if data.len() != ADDR_TORV3_SIZE + 3 {
                return Err(invalid());
            }
            let (pubkey, tail) = data.split_at(ADDR_TORV3_SIZE);
            if tail[2] != ONION_VERSION || tail[..2] != onion_checksum(pubkey) {
                return Err(invalid());
            }
            return Ok(Self {
                net: Network::Onion,
                addr: pubkey.to_vec(),
            });
        }
        if let Some(body) = lower.strip_suffix(".b32.i2p") {
            let data = base32_decode(body).ok_or_else(invalid)?;
            if data.len() != ADDR_I2P_SIZE {
                return Err(invalid());
            }
            return Ok(Self {
                net: Network::I2p,
                addr: data,
            });
        }
        Err(invalid())
    }
}

/// A network address plus port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Service {
    pub addr: NetAddress,
    pub port: u16,
}

impl Service {
    pub fn new(addr: NetAddress, port: u16) -> Self {
        Self { addr, port }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.addr.network() {
            Network::Ipv6 | Network::Cjdns => write!(f, "[{}]:{}", self.addr, self.port),
            _ => write!(f, "{}:{}", self.addr, self.port),
        }
    }
}

pub(crate) fn write_compact_size(out: &mut Vec<u8>, n: u64) {
    if n < 253 {
        out.push(n as u8);
    } else if n <= 0xffff {
        out.push(0xfd);
        out.extend_from_slice(&(n as u16).to_le_bytes());
    } else if n <= 0xffff_ffff {
        out.push(0xfe);
        out.extend_from_slice(&(n as u32).to_le_bytes());
    } else {
        out.push(0xff);
        out.extend_from_slice(&n.to_le_bytes());
    }
}

pub(crate) fn read_compact_size(buf: &[u8]) -> Result<(u64, usize), ShroudNetError> {
    let first = *buf.first().ok_or(ShroudNetError::EndOfData)?;
    let (value, consumed) = match first {
        0..=252 => (u64::from(first), 1),
        0xfd => {
            let bytes: [u8; 2] = buf
                .get(1..3)
                .ok_or(ShroudNetError::EndOfData)?
                .try_into()
                .expect("slice is 2 bytes");
            let value = u64::from(u16::from_le_bytes(bytes));
            if value < 253 {
                return Err(ShroudNetError::NonCanonicalCompactSize);
            }
            (value, 3)
        }
        0xfe => {
            let bytes: [u8; 4] = buf
                .get(1..5)
                .ok_or(ShroudNetError::EndOfData)?
                .try_into()
                .expect("slice is 4 bytes");
            let value = u64::from(u32::from_le_bytes(bytes));
            if value <= 0xffff {
                return Err(ShroudNetError::NonCanonicalCompactSize);
            }
            (value, 5)
        }
        0xff => {
            let bytes: [u8; 8] = buf
                .get(1..9)
                .ok_or(ShroudNetError::EndOfData)?
                .try_into()
                .expect("slice is 8 bytes");
            let value = u64::from_le_bytes(bytes);
            if value <= 0xffff_ffff {
                return Err(ShroudNetError::NonCanonicalCompactSize);
            }
            (value, 9)
        }
    };
    if value > MAX_COMPACT_SIZE {
        return Err(ShroudNetError::CompactSizeTooLarge(value));
    }
    Ok((value, consumed))
}
