use crate::config::ValidationError;
use std::fmt::{Display, Formatter};

const MAX_HOST_LEN: usize = 255;
const FORBIDDEN_CHARS: &str = "%?!,;@\\'*|<>{}[]()+=$&~#\" ";
// bracketed IPv6 literals
const FORBIDDEN_CHARS_V6: &str = "%?!,;@\\'*|<>{}()+=$&~#\" ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    All,
    Http,
    Https,
    Ftp,
    Socks,
    Socks4,
    Socks5,
}

impl Protocol {
    pub const COUNT: usize = 7;
    pub const TABLE_ORDER: [Protocol; Protocol::COUNT] = [
        Protocol::All,
        Protocol::Http,
        Protocol::Https,
        Protocol::Ftp,
        Protocol::Socks,
        Protocol::Socks4,
        Protocol::Socks5,
    ];

    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            "ftp" => Some(Self::Ftp),
            "socks" => Some(Self::Socks),
            "socks4" => Some(Self::Socks4),
            "socks5" => Some(Self::Socks5),
            _ => None,
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// Keyword used in front of `host:port` in a PAC directive.
    pub fn directive(self) -> &'static str {
        match self {
            Protocol::All | Protocol::Http | Protocol::Https | Protocol::Ftp => "PROXY",
            Protocol::Socks => "SOCKS",
            Protocol::Socks4 => "SOCKS4",
            Protocol::Socks5 => "SOCKS5",
        }
    }

    /// The protocol itself plus its specializations.
    pub fn family(self) -> &'static [Protocol] {
        match self {
            Protocol::All => &[Protocol::All],
            Protocol::Http => &[Protocol::Http],
            Protocol::Https => &[Protocol::Https],
            Protocol::Ftp => &[Protocol::Ftp],
            Protocol::Socks => &[Protocol::Socks, Protocol::Socks4, Protocol::Socks5],
            Protocol::Socks4 => &[Protocol::Socks4],
            Protocol::Socks5 => &[Protocol::Socks5],
        }
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Protocol::All => "all",
            Protocol::Http => "http",
            Protocol::Https => "https",
            Protocol::Ftp => "ftp",
            Protocol::Socks => "socks",
            Protocol::Socks4 => "socks4",
            Protocol::Socks5 => "socks5",
        })
    }
}

/// How an exclusion host pattern is compared with the requested host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Appliance {
    /// Pattern must end the host.
    Suffix,
    /// Pattern must start the host.
    Prefix,
    /// Pattern may occur anywhere; an empty pattern matches everything.
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUri<'a> {
    pub scheme: Option<&'a str>,
    /// Host used for matching, without brackets, port or wildcards.
    pub host: &'a str,
    pub port: Option<u16>,
    /// `host[:port]` sliced verbatim from the input.
    pub authority: &'a str,
    pub appliance: Appliance,
}

/// Split a server, exclusion or lookup URI into its parts.
///
/// `allow_path` is set for lookups: anything after the authority is ignored. Otherwise only a
/// trailing `/` is tolerated. `exclusion` forbids credentials and ports, and turns leading and
/// trailing runs of `*`/`.` into the [`Appliance`] of the rule.
pub fn parse_uri(
    uri: &str,
    allow_path: bool,
    exclusion: bool,
) -> Result<ParsedUri<'_>, ValidationError> {
    let (scheme, mut rest) = match uri.find("://") {
        Some(idx) => (Some(&uri[..idx]), &uri[idx + 3..]),
        None => (None, uri),
    };

    if allow_path {
        if let Some(idx) = rest.find(&['/', '?', '#'][..]) {
            rest = &rest[..idx];
        }
    } else if let Some(idx) = rest.find('/') {
        if idx + 1 < rest.len() {
            return Err(ValidationError::Path(uri.to_string()));
        }
        rest = &rest[..idx];
    }

    if let Some(idx) = rest.rfind('@') {
        if exclusion {
            return Err(ValidationError::Credentials(uri.to_string()));
        }
        rest = &rest[idx + 1..];
    }
    let authority = rest;

    let (host_text, port_text, bracketed) = if let Some(inner) = rest.strip_prefix('[') {
        let close = inner
            .find(']')
            .ok_or_else(|| ValidationError::Ipv6Literal(uri.to_string()))?;
        let after = &inner[close + 1..];
        let port_text = if after.is_empty() {
            None
        } else {
            Some(
                after
                    .strip_prefix(':')
                    .ok_or_else(|| ValidationError::InvalidPort(uri.to_string()))?,
            )
        };
        (&inner[..close], port_text, true)
    } else {
        match rest.rfind(':') {
            Some(idx) => (&rest[..idx], Some(&rest[idx + 1..]), false),
            None => (rest, None, false),
        }
    };

    let port = match port_text {
        None => None,
        Some(_) if exclusion => return Err(ValidationError::PortInExclusion(uri.to_string())),
        Some(text) => Some(
            parse_port(text).ok_or_else(|| ValidationError::InvalidPort(uri.to_string()))?,
        ),
    };

    let (host, appliance) = if exclusion {
        let head = host_text.trim_start_matches(&['*', '.'][..]);
        let body = head.trim_end_matches(&['*', '.'][..]);
        let leading = head.len() != host_text.len();
        let trailing = body.len() != head.len();
        let appliance = match (leading, trailing) {
            (true, true) => Appliance::Any,
            (false, true) => Appliance::Prefix,
            (_, false) => Appliance::Suffix,
        };
        (body, appliance)
    } else {
        (host_text, Appliance::Suffix)
    };

    if host.is_empty() {
        // "http://" excludes every http request
        if exclusion && scheme.is_some() {
            return Ok(ParsedUri {
                scheme,
                host,
                port,
                authority,
                appliance: Appliance::Any,
            });
        }
        return Err(ValidationError::EmptyHost(uri.to_string()));
    }
    validate_host(uri, host, bracketed)?;

    Ok(ParsedUri {
        scheme,
        host,
        port,
        authority,
        appliance,
    })
}

fn parse_port(text: &str) -> Option<u16> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse::<u16>().ok().filter(|p| *p > 0)
}

fn validate_host(uri: &str, host: &str, ipv6: bool) -> Result<(), ValidationError> {
    if host.len() > MAX_HOST_LEN {
        return Err(ValidationError::HostTooLong(uri.to_string()));
    }
    if host.starts_with('-') || host.ends_with('-') {
        return Err(ValidationError::Hyphen(uri.to_string()));
    }
    let forbidden = if ipv6 {
        FORBIDDEN_CHARS_V6
    } else {
        FORBIDDEN_CHARS
    };
    if let Some(c) = host.chars().find(|c| forbidden.contains(*c)) {
        return Err(ValidationError::ForbiddenChar(uri.to_string(), c));
    }
    Ok(())
}
