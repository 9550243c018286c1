use pnet_datalink::NetworkInterface;
use std::net::IpAddr;

fn first_ipv4(iface: &NetworkInterface) -> Option<IpAddr> {
    iface.ips.iter().map(|n| n.ip()).find(|ip| ip.is_ipv4())
}

/// IPv4 address bound to `name`, or of the first active non-loopback interface.
pub fn interface_address(name: Option<&str>) -> Option<IpAddr> {
    let interfaces = pnet_datalink::interfaces();
    match name {
        Some(name) => interfaces
            .iter()
            .find(|i| i.name == name)
            .and_then(first_ipv4),
        None => interfaces
            .iter()
            .filter(|i| i.is_up() && !i.is_loopback())
            .find_map(first_ipv4),
    }
}

#[test]
fn test_missing_interface() {
    assert!(interface_address(Some("pac-no-such-iface0")).is_none());
}
