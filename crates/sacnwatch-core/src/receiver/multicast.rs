use std::io;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::ops::RangeInclusive;

use tracing::{info, warn};

/// Multicast group carrying a universe: `239.255.<high>.<low>`.
///
/// # Examples
/// ```
/// use std::net::Ipv4Addr;
///
/// use sacnwatch_core::multicast_group;
///
/// assert_eq!(multicast_group(1), Ipv4Addr::new(239, 255, 0, 1));
/// assert_eq!(multicast_group(63999), Ipv4Addr::new(239, 255, 249, 255));
/// ```
pub fn multicast_group(universe: u16) -> Ipv4Addr {
    let [high, low] = universe.to_be_bytes();
    Ipv4Addr::new(239, 255, high, low)
}

/// IPv4 addresses of non-loopback interfaces, deduplicated.
pub fn multicast_interfaces() -> io::Result<Vec<Ipv4Addr>> {
    let mut addrs: Vec<Ipv4Addr> = if_addrs::get_if_addrs()?
        .into_iter()
        .filter(|iface| !iface.is_loopback())
        .filter_map(|iface| match iface.ip() {
            IpAddr::V4(addr) => Some(addr),
            IpAddr::V6(_) => None,
        })
        .collect();
    addrs.sort_unstable();
    addrs.dedup();
    Ok(addrs)
}

/// Join the group of every universe in `universes` on every candidate
/// interface. Individual failures are expected (down links, interfaces
/// without multicast) and skipped. Returns the number of memberships joined.
pub(crate) fn join_groups(socket: &UdpSocket, universes: RangeInclusive<u16>) -> usize {
    if universes.is_empty() {
        return 0;
    }
    let interfaces = match multicast_interfaces() {
        Ok(interfaces) => interfaces,
        Err(err) => {
            warn!(error = %err, "could not enumerate network interfaces; multicast disabled");
            return 0;
        }
    };

    let mut joined = 0;
    let mut attempted = 0;
    for universe in universes {
        let group = multicast_group(universe);
        for iface in &interfaces {
            attempted += 1;
            if socket.join_multicast_v4(&group, iface).is_ok() {
                joined += 1;
            }
        }
    }
    info!(
        joined,
        attempted,
        interfaces = interfaces.len(),
        "joined sACN multicast groups"
    );
    joined
}
