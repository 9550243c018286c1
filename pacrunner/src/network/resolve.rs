use crate::network::iface::interface_address;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::Resolver;
use std::io;
use std::net::IpAddr;
use std::time::Duration;

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Name resolution collaborator used by the PAC natives.
///
/// Both methods block; they are only called from script engine threads.
pub trait NameResolver: Send + Sync {
    fn resolve(&self, host: &str) -> Option<IpAddr>;

    fn local_address(&self, interface: Option<&str>) -> Option<IpAddr> {
        interface_address(interface)
    }
}

pub struct Dns {
    resolver: Resolver,
}

impl Dns {
    /// Resolver from the system configuration, or the library defaults when none is readable.
    pub fn from_system_conf() -> io::Result<Self> {
        let (config, mut opts) = match hickory_resolver::system_conf::read_system_conf() {
            Ok(conf) => conf,
            Err(e) => {
                tracing::warn!("Failed to read system DNS configuration: {}", e);
                (ResolverConfig::default(), ResolverOpts::default())
            }
        };
        opts.timeout = LOOKUP_TIMEOUT;
        Self::with_config(config, opts)
    }

    pub fn with_config(config: ResolverConfig, opts: ResolverOpts) -> io::Result<Self> {
        Ok(Self {
            resolver: Resolver::new(config, opts)?,
        })
    }
}

impl NameResolver for Dns {
    fn resolve(&self, host: &str) -> Option<IpAddr> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Some(ip);
        }
        match self.resolver.lookup_ip(host) {
            Ok(result) => result
                .iter()
                .find(|ip| ip.is_ipv4())
                .or_else(|| result.iter().next()),
            Err(e) => {
                tracing::debug!("DNS lookup for {} failed: {}", host, e);
                None
            }
        }
    }
}
