use crate::common::{HostMatcher, HostMatcherBuilder};
use crate::config::ValidationError;
use ipnet::IpNet;
use std::fmt::{Debug, Formatter};
use std::net::IpAddr;
use std::str::FromStr;

const BROWSER_SCHEMES: [&str; 5] = ["http://", "https://", "ftp://", "nntp://", "nntps://"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainRule {
    Suffix(String),
    Network(IpNet),
}

impl DomainRule {
    pub fn parse(rule: &str) -> Result<Self, ValidationError> {
        let rule = rule.trim();
        let invalid = || ValidationError::Domain(rule.to_string());
        if rule.contains('/') {
            return IpNet::from_str(rule)
                .map(|net| Self::Network(net.trunc()))
                .map_err(|_| invalid());
        }
        let bare = rule.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = bare.parse::<IpAddr>() {
            let prefix = if ip.is_ipv4() { 32 } else { 128 };
            return IpNet::new(ip, prefix)
                .map(Self::Network)
                .map_err(|_| invalid());
        }
        let suffix = rule.trim_start_matches('.').to_ascii_lowercase();
        if suffix.is_empty() || suffix.contains(char::is_whitespace) {
            return Err(invalid());
        }
        Ok(Self::Suffix(suffix))
    }
}

/// The host of a lookup, classified once per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestHost {
    Addr(IpAddr),
    Name(String),
}

impl RequestHost {
    pub fn classify(host: &str) -> Self {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Self::Addr(ip);
        }
        // [v6] or [v6]:port
        if let Some(rest) = host.strip_prefix('[') {
            if let Some(ip) = rest
                .split_once(']')
                .and_then(|(addr, _)| addr.parse::<IpAddr>().ok())
            {
                return Self::Addr(ip);
            }
        }
        Self::Name(host.trim_end_matches('.').to_ascii_lowercase())
    }
}

pub fn is_browser_url(url: &str) -> bool {
    BROWSER_SCHEMES.iter().any(|scheme| {
        url.get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}

/// Domain scoping of one configuration. An empty scope is a catch-all.
#[derive(Clone)]
pub struct DomainScope {
    rules: Vec<DomainRule>,
    suffixes: HostMatcher,
    networks: Vec<IpNet>,
}

impl DomainScope {
    /// Invalid entries are skipped.
    pub fn new<S: AsRef<str>>(domains: &[S]) -> Self {
        let mut rules = Vec::new();
        let mut builder = HostMatcherBuilder::new();
        let mut networks = Vec::new();
        for domain in domains {
            match DomainRule::parse(domain.as_ref()) {
                Ok(rule) => {
                    match &rule {
                        DomainRule::Suffix(s) => builder.add_suffix(s),
                        DomainRule::Network(net) => networks.push(*net),
                    }
                    rules.push(rule);
                }
                Err(e) => tracing::warn!("Skipped domain rule: {}", e),
            }
        }
        Self {
            rules,
            suffixes: builder.build(),
            networks,
        }
    }

    pub fn rules(&self) -> &[DomainRule] {
        self.rules.as_slice()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn matches(&self, host: &RequestHost) -> bool {
        match host {
            RequestHost::Addr(ip) => self.networks.iter().any(|net| net.contains(ip)),
            RequestHost::Name(name) => self.suffixes.matches(name),
        }
    }
}

impl Default for DomainScope {
    fn default() -> Self {
        Self::new::<&str>(&[])
    }
}

impl Debug for DomainScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.rules.iter()).finish()
    }
}
