use crate::config::ValidationError;
use crate::manual::parse::{parse_uri, Appliance, Protocol};

fn protocol_of(scheme: Option<&str>) -> Result<Protocol, ValidationError> {
    match scheme {
        None => Ok(Protocol::All),
        Some(s) => {
            Protocol::from_scheme(s).ok_or_else(|| ValidationError::UnknownProtocol(s.to_string()))
        }
    }
}

/// Per-protocol list of `"<DIRECTIVE> host[:port]"` entries in configuration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerTable {
    servers: [Vec<String>; Protocol::COUNT],
}

impl ServerTable {
    pub fn build<S: AsRef<str>>(uris: &[S]) -> Result<Self, ValidationError> {
        let mut table = Self::default();
        for uri in uris {
            let uri = uri.as_ref();
            let parsed = match parse_uri(uri, false, false) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!("Skipped proxy server: {}", e);
                    continue;
                }
            };
            let protocol = protocol_of(parsed.scheme)?;
            // a SOCKS server answers SOCKS4 and SOCKS5 requests as well
            for p in protocol.family() {
                table.servers[p.index()].push(format!("{} {}", p.directive(), parsed.authority));
            }
        }
        Ok(table)
    }

    pub fn get(&self, protocol: Protocol) -> &[String] {
        self.servers[protocol.index()].as_slice()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.iter().all(|s| s.is_empty())
    }

    /// Servers dedicated to `protocol` come first, then every other server in table order.
    pub fn proxy_string(&self, protocol: Protocol) -> Option<String> {
        let primary = protocol.family();
        let ordered = primary.iter().copied().chain(
            Protocol::TABLE_ORDER
                .into_iter()
                .filter(|p| !primary.contains(p)),
        );
        let mut emitted: Vec<&str> = Vec::new();
        for p in ordered {
            for entry in self.get(p) {
                if !emitted.contains(&entry.as_str()) {
                    emitted.push(entry.as_str());
                }
            }
        }
        (!emitted.is_empty()).then(|| emitted.join("; "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludeRule {
    pub host: String,
    pub appliance: Appliance,
}

impl ExcludeRule {
    pub fn matches(&self, host: &str) -> bool {
        match self.appliance {
            Appliance::Suffix => host.ends_with(self.host.as_str()),
            Appliance::Prefix => host.starts_with(self.host.as_str()),
            Appliance::Any => self.host.is_empty() || host.contains(self.host.as_str()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExcludeTable {
    rules: [Vec<ExcludeRule>; Protocol::COUNT],
}

impl ExcludeTable {
    pub fn build<S: AsRef<str>>(uris: &[S]) -> Result<Self, ValidationError> {
        let mut table = Self::default();
        for uri in uris {
            let uri = uri.as_ref();
            let parsed = match parse_uri(uri, false, true) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!("Skipped exclusion: {}", e);
                    continue;
                }
            };
            let protocol = protocol_of(parsed.scheme)?;
            table.rules[protocol.index()].push(ExcludeRule {
                host: parsed.host.to_ascii_lowercase(),
                appliance: parsed.appliance,
            });
        }
        Ok(table)
    }

    pub fn get(&self, protocol: Protocol) -> &[ExcludeRule] {
        self.rules[protocol.index()].as_slice()
    }

    /// `host` is expected in lowercase; rules are stored that way.
    pub fn is_excluded(&self, host: &str, protocol: Protocol) -> bool {
        self.get(Protocol::All).iter().any(|r| r.matches(host))
            || (protocol != Protocol::All && self.get(protocol).iter().any(|r| r.matches(host)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_table() {
        let table = ServerTable::build(&[
            "http://web-proxy:8080",
            "proxy.example.com:3128",
            "socks://gw:1080",
            "https://bad host:443",
        ])
        .unwrap();
        assert_eq!(table.get(Protocol::Http), ["PROXY web-proxy:8080"]);
        assert_eq!(table.get(Protocol::All), ["PROXY proxy.example.com:3128"]);
        assert_eq!(table.get(Protocol::Socks), ["SOCKS gw:1080"]);
        assert_eq!(table.get(Protocol::Socks4), ["SOCKS4 gw:1080"]);
        assert_eq!(table.get(Protocol::Socks5), ["SOCKS5 gw:1080"]);
        assert!(table.get(Protocol::Https).is_empty());

        assert!(matches!(
            ServerTable::build(&["http://a:1", "gopher://b:70"]),
            Err(ValidationError::UnknownProtocol(p)) if p == "gopher"
        ));
        assert!(ServerTable::build::<&str>(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_proxy_string_order() {
        let table = ServerTable::build(&[
            "proxy.example.com:3128",
            "https://secure:443",
            "http://web:80",
            "socks5://s5:1080",
        ])
        .unwrap();
        assert_eq!(
            table.proxy_string(Protocol::Http).unwrap(),
            "PROXY web:80; PROXY proxy.example.com:3128; PROXY secure:443; SOCKS5 s5:1080"
        );
        assert_eq!(
            table.proxy_string(Protocol::Https).unwrap(),
            "PROXY secure:443; PROXY proxy.example.com:3128; PROXY web:80; SOCKS5 s5:1080"
        );
        assert_eq!(
            table.proxy_string(Protocol::Socks).unwrap(),
            "SOCKS5 s5:1080; PROXY proxy.example.com:3128; PROXY web:80; PROXY secure:443"
        );
        assert_eq!(ServerTable::default().proxy_string(Protocol::Http), None);
    }

    #[test]
    fn test_proxy_string_dedup() {
        let table = ServerTable::build(&["p:80", "http://p:80", "socks://s:1080"]).unwrap();
        assert_eq!(
            table.proxy_string(Protocol::Socks4).unwrap(),
            "SOCKS4 s:1080; PROXY p:80; SOCKS s:1080; SOCKS5 s:1080"
        );
        assert_eq!(
            table.proxy_string(Protocol::Http).unwrap(),
            "PROXY p:80; SOCKS s:1080; SOCKS4 s:1080; SOCKS5 s:1080"
        );
    }

    #[test]
    fn test_exclusions() {
        let table = ExcludeTable::build(&[
            "*.corp.example",
            "10.*",
            "*intranet*",
            "ftp://",
            "https://secure.example",
            "bad:22",
        ])
        .unwrap();
        assert!(table.is_excluded("wiki.corp.example", Protocol::Http));
        assert!(table.is_excluded("corp.example", Protocol::Http));
        assert!(!table.is_excluded("corp.example.org", Protocol::Http));
        assert!(table.is_excluded("10.1.2.3", Protocol::All));
        assert!(!table.is_excluded("110.1.2.3", Protocol::All));
        assert!(table.is_excluded("my-intranet-host", Protocol::Socks));
        assert!(table.is_excluded("anything", Protocol::Ftp));
        assert!(!table.is_excluded("anything", Protocol::Http));
        assert!(table.is_excluded("www.secure.example", Protocol::Https));
        assert!(!table.is_excluded("www.secure.example", Protocol::Http));
        assert!(table.get(Protocol::All).iter().all(|r| r.host != "bad"));

        assert!(ExcludeTable::build(&["nntp://news"]).is_err());

        let mixed = ExcludeTable::build(&["*.Corp.Example"]).unwrap();
        assert_eq!(mixed.get(Protocol::All)[0].host, "corp.example");
        assert!(mixed.is_excluded("wiki.corp.example", Protocol::Http));
    }

    #[test]
    fn test_suffix_is_not_contains() {
        let rule = ExcludeRule {
            host: "example.com".to_string(),
            appliance: Appliance::Suffix,
        };
        assert!(rule.matches("www.example.com"));
        assert!(!rule.matches("example.com.evil.org"));
        let rule = ExcludeRule {
            host: "example".to_string(),
            appliance: Appliance::Prefix,
        };
        assert!(rule.matches("example.org"));
        assert!(!rule.matches("www.example.org"));
    }
}
