//! Address advertised to the user once the server is up.

use std::net::{IpAddr, Ipv4Addr};

use tracing::{debug, warn};

/// First non-loopback IPv4 address on any interface, if there is one.
pub fn local_ipv4() -> Option<Ipv4Addr> {
    let interfaces = match if_addrs::get_if_addrs() {
        Ok(interfaces) => interfaces,
        Err(err) => {
            warn!("Unable to list network interfaces: {}", err);
            return None;
        }
    };

    first_lan_ipv4(interfaces.iter().map(|iface| {
        debug!("Interface {} has {}", iface.name, iface.ip());
        iface.ip()
    }))
}

fn first_lan_ipv4(addrs: impl IntoIterator<Item = IpAddr>) -> Option<Ipv4Addr> {
    addrs.into_iter().find_map(|addr| match addr {
        IpAddr::V4(v4) if !v4.is_loopback() => Some(v4),
        _ => None,
    })
}

/// URL users on the network should open. The host part is empty when no
/// LAN address was found.
pub fn server_url(ip: Option<Ipv4Addr>, port: u16) -> String {
    let host = ip.map(|ip| ip.to_string()).unwrap_or_default();
    format!("http://{}:{}/", host, port)
}
