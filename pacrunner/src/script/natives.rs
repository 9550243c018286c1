use crate::network::NameResolver;
use std::fmt::{Debug, Formatter};
use std::net::Ipv4Addr;
use std::sync::Arc;

/// Hosts containing any of these are never handed to the resolver.
const DNS_REJECT_CHARS: &str = " \t\r\n,;/\\?#@\"'";
pub const FALLBACK_ADDRESS: &str = "127.0.0.1";

/// Host functions exposed to PAC scripts as `myIpAddress()` and `dnsResolve(host)`.
#[derive(Clone)]
pub struct PacNatives {
    interface: Option<String>,
    resolver: Arc<dyn NameResolver>,
}

impl PacNatives {
    pub fn new(interface: Option<String>, resolver: Arc<dyn NameResolver>) -> Self {
        Self {
            interface,
            resolver,
        }
    }

    pub fn my_ip_address(&self) -> String {
        self.resolver
            .local_address(self.interface.as_deref())
            .map_or_else(|| FALLBACK_ADDRESS.to_string(), |ip| ip.to_string())
    }

    pub fn dns_resolve(&self, host: &str) -> Option<String> {
        if host.is_empty() || host.contains(|c| DNS_REJECT_CHARS.contains(c)) {
            tracing::debug!("Refused to resolve {:?}", host);
            return None;
        }
        self.resolver.resolve(host).map(|ip| ip.to_string())
    }
}

impl Debug for PacNatives {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacNatives")
            .field("interface", &self.interface)
            .finish()
    }
}

/// IPv4 containment: `ip & mask == network & mask`.
pub fn is_in_net(ip: &str, network: &str, mask: &str) -> bool {
    let (Ok(ip), Ok(network), Ok(mask)) = (
        ip.parse::<Ipv4Addr>(),
        network.parse::<Ipv4Addr>(),
        mask.parse::<Ipv4Addr>(),
    ) else {
        return false;
    };
    let mask = u32::from(mask);
    u32::from(ip) & mask == u32::from(network) & mask
}
