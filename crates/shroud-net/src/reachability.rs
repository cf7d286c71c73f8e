//! Process-wide reachability and local-address tables.
//!
//! Both tables are shared across every connection thread and guarded by
//! a single mutex each; callers only ever hold a lock for the duration
//! of one lookup or update.

use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};

use crate::address::{NetAddress, Network, Service};

/// Networks the node is willing to connect through, indexed by
/// [`Network`]. Everything starts reachable.
static REACHABLE: Mutex<[bool; 7]> = Mutex::new([true; 7]);

/// Addresses of our own node, as learned from binds and peers.
static LOCAL_ADDRESSES: LazyLock<Mutex<HashMap<NetAddress, LocalServiceInfo>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Score and port of one of our own addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalServiceInfo {
    pub score: i32,
    pub port: u16,
}

fn net_index(net: Network) -> usize {
    match net {
        Network::Unroutable => 0,
        Network::Ipv4 => 1,
        Network::Ipv6 => 2,
        Network::Onion => 3,
        Network::I2p => 4,
        Network::Cjdns => 5,
        Network::Internal => 6,
    }
}

/// Mark a network as reachable or not. Requests for the unroutable and
/// internal pseudo-networks are ignored; they are always "reachable" so
/// their bookkeeping never blocks anything.
pub fn set_reachable(net: Network, reachable: bool) {
    if matches!(net, Network::Unroutable | Network::Internal) {
        return;
    }
    let mut table = REACHABLE.lock().expect("reachability table poisoned");
    table[net_index(net)] = reachable;
}

pub fn is_reachable_net(net: Network) -> bool {
    let table = REACHABLE.lock().expect("reachability table poisoned");
    table[net_index(net)]
}

pub fn is_reachable(addr: &NetAddress) -> bool {
    is_reachable_net(addr.network())
}

/// Register one of our own addresses. Returns whether it was accepted;
/// unroutable or unreachable addresses are refused.
pub fn add_local(service: &Service, score: i32) -> bool {
    if !service.addr.is_routable() {
        return false;
    }
    if !is_reachable(&service.addr) {
        return false;
    }
    tracing::debug!(%service, score, "learned local address");
    let mut map = LOCAL_ADDRESSES.lock().expect("local address map poisoned");
    let entry = map
        .entry(service.addr.clone())
        .or_insert(LocalServiceInfo { score, port: service.port });
    // A repeated address keeps the best score seen.
    if score >= entry.score {
        entry.score = score;
        entry.port = service.port;
    }
    true
}

pub fn remove_local(service: &Service) {
    let mut map = LOCAL_ADDRESSES.lock().expect("local address map poisoned");
    map.remove(&service.addr);
}

pub fn is_local(service: &Service) -> bool {
    let map = LOCAL_ADDRESSES.lock().expect("local address map poisoned");
    map.contains_key(&service.addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    /// The tables are process-wide; serialize the tests that mutate them.
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn reachability_toggles_per_network() {
        let _guard = TEST_LOCK.lock().unwrap();
        let networks = [
            Network::Ipv4,
            Network::Ipv6,
            Network::Onion,
            Network::I2p,
            Network::Cjdns,
        ];
        for net in networks {
            assert!(is_reachable_net(net));
        }
        for net in networks {
            set_reachable(net, false);
        }
        for net in networks {
            assert!(!is_reachable_net(net));
        }
        for net in networks {
            set_reachable(net, true);
        }
        for net in networks {
            assert!(is_reachable_net(net));
        }
    }

    #[test]
    fn unroutable_and_internal_stay_reachable() {
        let _guard = TEST_LOCK.lock().unwrap();
        assert!(is_reachable_net(Network::Unroutable));
        assert!(is_reachable_net(Network::Internal));

        set_reachable(Network::Unroutable, false);
        set_reachable(Network::Internal, false);

        assert!(is_reachable_net(Network::Unroutable));
        assert!(is_reachable_net(Network::Internal));
    }

    #[test]
    fn reachability_by_address() {
        let _guard = TEST_LOCK.lock().unwrap();
        let addr = NetAddress::ipv4(Ipv4Addr::new(1, 1, 1, 1));

        set_reachable(Network::Ipv4, true);
        assert!(is_reachable(&addr));

        set_reachable(Network::Ipv4, false);
        assert!(!is_reachable(&addr));

        set_reachable(Network::Ipv4, true);
    }

    #[test]
    fn local_address_lifecycle() {
        let _guard = TEST_LOCK.lock().unwrap();
        set_reachable(Network::Ipv4, true);
        let service = Service::new(NetAddress::ipv4(Ipv4Addr::new(2, 1, 1, 1)), 1000);

        assert!(!is_local(&service));
        assert!(add_local(&service, 1000));
        assert!(is_local(&service));

        remove_local(&service);
        assert!(!is_local(&service));
    }

    #[test]
    fn unroutable_local_addresses_are_refused() {
        let _guard = TEST_LOCK.lock().unwrap();
        set_reachable(Network::Ipv4, true);
        let service = Service::new(NetAddress::ipv4(Ipv4Addr::new(127, 0, 0, 1)), 1000);
        assert!(!add_local(&service, 1000));
        assert!(!is_local(&service));
    }
}
