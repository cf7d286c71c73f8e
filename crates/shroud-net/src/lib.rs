//! Shroud network-address model.
//!
//! BIP155-style address encoding (IPv4, IPv6, TORv3, I2P, CJDNS plus
//! internal placeholder names), canonical text rendering, and the
//! process-wide reachability and local-address tables.

pub mod address;
pub mod error;
pub mod reachability;

pub use address::{NetAddress, Network, Service, MAX_ADDRV2_SIZE};
pub use error::ShroudNetError;
pub use reachability::{
    add_local, is_local, is_reachable, is_reachable_net, remove_local, set_reachable,
    LocalServiceInfo,
};
