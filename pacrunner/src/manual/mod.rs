mod parse;
mod table;

pub use parse::*;
pub use table::*;

/// Resolve a request against static rules. `None` means DIRECT.
pub fn execute(
    url: Option<&str>,
    host: &str,
    servers: &ServerTable,
    excludes: &ExcludeTable,
) -> Option<String> {
    let target = url.filter(|u| !u.is_empty()).unwrap_or(host);
    let parsed = match parse_uri(target, true, false) {
        Ok(p) => p,
        Err(e) => {
            tracing::debug!("Manual lookup falls back to DIRECT: {}", e);
            return None;
        }
    };
    let protocol = parsed
        .scheme
        .and_then(Protocol::from_scheme)
        .unwrap_or(Protocol::All);
    let host = parsed.host.to_ascii_lowercase();
    if excludes.is_excluded(&host, protocol) {
        tracing::debug!("{} excluded for {}", parsed.host, protocol);
        return None;
    }
    servers.proxy_string(protocol)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> (ServerTable, ExcludeTable) {
        let servers = ServerTable::build(&[
            "http://http-proxy.corp:8080",
            "https://tls-proxy.corp:8443",
            "fallback.corp:3128",
        ])
        .unwrap();
        let excludes = ExcludeTable::build(&["*.local", "https://bank.example"]).unwrap();
        (servers, excludes)
    }

    #[test]
    fn test_execute() {
        let (servers, excludes) = tables();
        assert_eq!(
            execute(Some("http://www.example.org/index.html"), "www.example.org", &servers, &excludes)
                .unwrap(),
            "PROXY http-proxy.corp:8080; PROXY fallback.corp:3128; PROXY tls-proxy.corp:8443"
        );
        assert_eq!(
            execute(Some("https://www.example.org:443/"), "www.example.org", &servers, &excludes)
                .unwrap(),
            "PROXY tls-proxy.corp:8443; PROXY fallback.corp:3128; PROXY http-proxy.corp:8080"
        );
        // unknown scheme behaves like a protocol-less request
        assert_eq!(
            execute(Some("gopher://hole.example/"), "hole.example", &servers, &excludes).unwrap(),
            "PROXY fallback.corp:3128; PROXY http-proxy.corp:8080; PROXY tls-proxy.corp:8443"
        );
        // host fallback when no url is given
        assert!(execute(None, "printer.local", &servers, &excludes).is_none());
        assert!(execute(Some(""), "www.example.org", &servers, &excludes).is_some());
    }

    #[test]
    fn test_execute_direct() {
        let (servers, excludes) = tables();
        assert!(execute(Some("http://nas.local/"), "nas.local", &servers, &excludes).is_none());
        assert!(
            execute(Some("https://www.bank.example/"), "www.bank.example", &servers, &excludes)
                .is_none()
        );
        assert!(
            execute(Some("http://www.bank.example/"), "www.bank.example", &servers, &excludes)
                .is_some()
        );
        // unparsable request
        assert!(execute(Some("http://bad host/"), "bad host", &servers, &excludes).is_none());
        assert!(execute(
            Some("http://a.example/"),
            "a.example",
            &ServerTable::default(),
            &excludes
        )
        .is_none());
    }

    #[test]
    fn test_exclusion_ignores_case() {
        let servers = ServerTable::build(&["p:3128"]).unwrap();
        let excludes = ExcludeTable::build(&["Bank.Example", "*.LOCAL"]).unwrap();
        for (url, host) in [
            ("http://WWW.Bank.Example/", "WWW.Bank.Example"),
            ("https://www.bank.example/", "www.bank.example"),
            ("http://Printer.Local/", "Printer.Local"),
        ] {
            assert!(execute(Some(url), host, &servers, &excludes).is_none(), "{}", url);
        }
        assert!(execute(Some("http://www.bank.org/"), "www.bank.org", &servers, &excludes).is_some());
    }

    #[test]
    fn test_execute_is_pure() {
        let (servers, excludes) = tables();
        let first = execute(Some("ftp://files.example/x"), "files.example", &servers, &excludes);
        let second = execute(Some("ftp://files.example/x"), "files.example", &servers, &excludes);
        assert_eq!(first, second);
        assert!(first.is_some());
    }
}
