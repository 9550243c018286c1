use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Arguments of a proxy configuration request.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct ProxyConfigSchema {
    pub method: Option<String>,
    #[serde(default)]
    pub interface: Option<String>,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub browser_only: bool,
    #[serde(default)]
    pub servers: Option<Vec<String>>,
    #[serde(default)]
    pub excludes: Option<Vec<String>>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub script: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProxyMethod {
    Direct,
    Manual,
    Auto,
}

impl FromStr for ProxyMethod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct" => Ok(Self::Direct),
            "manual" => Ok(Self::Manual),
            "auto" => Ok(Self::Auto),
            _ => Err(()),
        }
    }
}

impl Display for ProxyMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ProxyMethod::Direct => "direct",
            ProxyMethod::Manual => "manual",
            ProxyMethod::Auto => "auto",
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct LookupReqSchema {
    pub url: String,
    pub host: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct LookupRespSchema {
    /// `None` stands for DIRECT.
    pub proxy: Option<String>,
}

impl LookupRespSchema {
    pub fn directive(&self) -> &str {
        self.proxy.as_deref().unwrap_or("DIRECT")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_method() {
        assert_eq!("Manual".parse::<ProxyMethod>(), Ok(ProxyMethod::Manual));
        assert_eq!("AUTO".parse::<ProxyMethod>(), Ok(ProxyMethod::Auto));
        assert!("pac".parse::<ProxyMethod>().is_err());
        assert_eq!(ProxyMethod::Direct.to_string(), "direct");
    }

    #[test]
    fn test_deserialize_config() {
        let raw = "\
method: manual
interface: eth0
domains: [corp.com, 10.0.0.0/8]
browser-only: true
servers: ['http://proxy.corp.com:8080']
excludes: ['*.local']
";
        let cfg: ProxyConfigSchema = serde_yaml::from_str(raw).unwrap();
        assert_eq!(cfg.method.as_deref(), Some("manual"));
        assert_eq!(cfg.interface.as_deref(), Some("eth0"));
        assert_eq!(cfg.domains.len(), 2);
        assert!(cfg.browser_only);
        assert_eq!(cfg.servers.unwrap()[0], "http://proxy.corp.com:8080");
        assert!(cfg.script.is_none());

        let minimal: ProxyConfigSchema = serde_yaml::from_str("method: direct").unwrap();
        assert!(!minimal.browser_only);
        assert!(minimal.domains.is_empty());
        assert!(serde_yaml::from_str::<ProxyConfigSchema>("mode: direct").is_err());
    }

    #[test]
    fn test_lookup_directive() {
        let resp = LookupRespSchema { proxy: None };
        assert_eq!(resp.directive(), "DIRECT");
        let resp = LookupRespSchema {
            proxy: Some("PROXY p:3128".to_string()),
        };
        assert_eq!(resp.directive(), "PROXY p:3128");
    }
}
