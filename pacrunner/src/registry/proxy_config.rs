use crate::manual::{self, ExcludeTable, ServerTable};
use crate::registry::DomainScope;
use crate::script::Sandbox;
use pacapi::ProxyMethod;
use std::sync::Arc;

/// Mode-specific state. Switching mode replaces the whole value.
#[derive(Debug, Clone, Default)]
pub enum ProxyMode {
    #[default]
    Unknown,
    Direct,
    Manual {
        servers: ServerTable,
        excludes: ExcludeTable,
    },
    Auto {
        script_url: Option<String>,
        script: Option<String>,
        sandbox: Option<Arc<Sandbox>>,
    },
}

impl ProxyMode {
    pub fn method(&self) -> Option<ProxyMethod> {
        match self {
            ProxyMode::Unknown => None,
            ProxyMode::Direct => Some(ProxyMethod::Direct),
            ProxyMode::Manual { .. } => Some(ProxyMethod::Manual),
            ProxyMode::Auto { .. } => Some(ProxyMethod::Auto),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProxyConfig {
    interface: Option<String>,
    scope: DomainScope,
    browser_only: bool,
    mode: ProxyMode,
}

impl ProxyConfig {
    pub fn new(interface: Option<String>) -> Self {
        Self {
            interface,
            ..Default::default()
        }
    }

    pub fn interface(&self) -> Option<&str> {
        self.interface.as_deref()
    }

    pub fn scope(&self) -> &DomainScope {
        &self.scope
    }

    pub fn browser_only(&self) -> bool {
        self.browser_only
    }

    pub fn mode(&self) -> &ProxyMode {
        &self.mode
    }

    pub fn set_scope(&mut self, scope: DomainScope, browser_only: bool) {
        self.scope = scope;
        self.browser_only = browser_only;
    }

    pub fn set_mode(&mut self, mode: ProxyMode) {
        self.mode = mode;
    }

    /// Script url of an auto configuration still waiting for its script.
    pub fn pending_url(&self) -> Option<&str> {
        match &self.mode {
            ProxyMode::Auto {
                script_url: Some(url),
                script: None,
                ..
            } => Some(url),
            _ => None,
        }
    }

    pub fn sandbox(&self) -> Option<&Arc<Sandbox>> {
        match &self.mode {
            ProxyMode::Auto { sandbox, .. } => sandbox.as_ref(),
            _ => None,
        }
    }

    /// Copy of this configuration with `sandbox` attached. Non-auto modes are returned unchanged.
    pub fn with_sandbox(&self, sandbox: Sandbox) -> Self {
        let mut config = self.clone();
        if let ProxyMode::Auto { sandbox: slot, .. } = &mut config.mode {
            *slot = Some(Arc::new(sandbox));
        }
        config
    }

    /// `None` means DIRECT.
    pub fn execute(&self, url: &str, host: &str) -> Option<String> {
        match &self.mode {
            ProxyMode::Unknown | ProxyMode::Direct => None,
            ProxyMode::Manual { servers, excludes } => {
                manual::execute(Some(url), host, servers, excludes)
            }
            ProxyMode::Auto {
                sandbox: Some(sandbox),
                ..
            } => match sandbox.execute(url, host) {
                Ok(proxy) => Some(proxy),
                Err(e) => {
                    tracing::warn!("Script failed for {}: {}", url, e);
                    None
                }
            },
            ProxyMode::Auto { sandbox: None, .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{test_natives, FakeDriver, ScriptDriver};

    #[test]
    fn test_execute_by_mode() {
        let mut config = ProxyConfig::new(None);
        assert!(config.mode().method().is_none());
        assert_eq!(config.execute("http://a/", "a"), None);

        config.set_mode(ProxyMode::Direct);
        assert_eq!(config.execute("http://a/", "a"), None);

        config.set_mode(ProxyMode::Manual {
            servers: ServerTable::build(&["http://p:8080"]).unwrap(),
            excludes: ExcludeTable::build(&["a.local"]).unwrap(),
        });
        assert_eq!(config.mode().method(), Some(ProxyMethod::Manual));
        assert_eq!(config.execute("http://a/", "a").as_deref(), Some("PROXY p:8080"));
        assert_eq!(config.execute("http://a.local/", "a.local"), None);
    }

    #[test]
    fn test_auto_sandbox() {
        let driver = FakeDriver::new("fake", 1, "SOCKS s:1080");
        let mut config = ProxyConfig::new(Some("eth0".to_string()));
        config.set_mode(ProxyMode::Auto {
            script_url: Some("http://wpad/wpad.dat".to_string()),
            script: None,
            sandbox: None,
        });
        assert_eq!(config.pending_url(), Some("http://wpad/wpad.dat"));
        assert_eq!(config.execute("http://a/", "a"), None);

        config.set_mode(ProxyMode::Auto {
            script_url: None,
            script: Some("function FindProxyForURL() {}".to_string()),
            sandbox: None,
        });
        assert_eq!(config.pending_url(), None);
        let handle = driver.create_sandbox("", test_natives()).unwrap();
        let live = config.with_sandbox(Sandbox::new(driver.clone(), handle));
        assert!(config.sandbox().is_none());
        assert_eq!(live.execute("http://a/", "a").as_deref(), Some("SOCKS s:1080"));

        // the sandbox lives as long as the last configuration holding it
        let mut switched = live.clone();
        switched.set_mode(ProxyMode::Direct);
        assert!(switched.sandbox().is_none());
        assert_eq!(driver.live.lock().unwrap().len(), 1);
        drop(live);
        assert!(driver.live.lock().unwrap().is_empty());
    }
}
