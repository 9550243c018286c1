use crate::config::FileError;
use pacapi::ProxyConfigSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_STARTUP_GRACE: Duration = Duration::from_secs(5);

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct RawRootCfg {
    #[serde(default)]
    pub startup_grace_ms: Option<u64>,
    /// Script download timeout; the fetcher default when absent.
    #[serde(default)]
    pub fetch_timeout_ms: Option<u64>,
    /// Script engines to register; all compiled-in engines when absent.
    #[serde(default)]
    pub drivers: Option<Vec<String>>,
    #[serde(default)]
    pub configurations: Vec<ProxyConfigSchema>,
}

impl RawRootCfg {
    pub fn load(path: &Path) -> Result<Self, FileError> {
        let name = path.to_string_lossy().to_string();
        let content = std::fs::read_to_string(path).map_err(|e| FileError::Io(name.clone(), e))?;
        Self::from_yaml(&name, &content)
    }

    pub fn from_yaml(name: &str, content: &str) -> Result<Self, FileError> {
        serde_yaml::from_str(content).map_err(|e| FileError::Serde(name.to_string(), e))
    }

    pub fn startup_grace(&self) -> Duration {
        self.startup_grace_ms
            .map_or(DEFAULT_STARTUP_GRACE, Duration::from_millis)
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_ms.map(Duration::from_millis)
    }

    pub fn driver_enabled(&self, name: &str) -> bool {
        self.drivers
            .as_ref()
            .map_or(true, |list| list.iter().any(|d| d.eq_ignore_ascii_case(name)))
    }
}

#[test]
fn test_root_config() {
    let raw = "\
startup-grace-ms: 200
fetch-timeout-ms: 1500
drivers: [QuickJS]
configurations:
  - method: direct
    domains: [intranet.example]
  - method: auto
    script: |
      function FindProxyForURL(url, host) { return 'DIRECT'; }
";
    let cfg = RawRootCfg::from_yaml("test", raw).unwrap();
    assert_eq!(cfg.startup_grace(), Duration::from_millis(200));
    assert_eq!(cfg.fetch_timeout(), Some(Duration::from_millis(1500)));
    assert!(cfg.driver_enabled("quickjs"));
    assert!(!cfg.driver_enabled("boa"));
    assert_eq!(cfg.configurations.len(), 2);
    assert!(cfg.configurations[1].script.is_some());

    let empty = RawRootCfg::from_yaml("empty", "{}").unwrap();
    assert_eq!(empty.startup_grace(), DEFAULT_STARTUP_GRACE);
    assert!(empty.fetch_timeout().is_none());
    assert!(empty.driver_enabled("boa"));
    assert!(RawRootCfg::from_yaml("bad", "grace: 1").is_err());
}
