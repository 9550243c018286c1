use pacapi::{LookupReqSchema, LookupRespSchema};
use pacrunner::config::{RawRootCfg, ScriptError};
use pacrunner::manual::parse_uri;
use pacrunner::network::Dns;
use pacrunner::registry::{ConfigHandle, ConfigRegistry, HttpFetcher};
use pacrunner::script::ScriptDriverRegistry;
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

pub struct App {
    runtime: tokio::runtime::Runtime,
    registry: ConfigRegistry,
    handles: Vec<ConfigHandle>,
    rejected: usize,
}

impl App {
    /// Build the registry and install every configuration of `config`.
    pub fn create(config: &RawRootCfg) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Runtime::new()?;
        let drivers = Arc::new(register_drivers(config)?);
        let resolver = Arc::new(Dns::from_system_conf()?);
        let mut fetcher = HttpFetcher::new(runtime.handle().clone());
        if let Some(timeout) = config.fetch_timeout() {
            fetcher = fetcher.with_timeout(timeout);
        }
        let fetcher = Arc::new(fetcher);
        let registry = ConfigRegistry::new(drivers, resolver, fetcher, config.startup_grace());

        let mut handles = Vec::new();
        let mut rejected = 0;
        for (idx, schema) in config.configurations.iter().enumerate() {
            match registry.create_config(schema) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    tracing::warn!("Configuration {} rejected: {}", idx, e);
                    rejected += 1;
                }
            }
        }
        Ok(Self {
            runtime,
            registry,
            handles,
            rejected,
        })
    }

    pub fn lookup(&self, url: &str, host: Option<&str>) -> LookupRespSchema {
        let host = match host {
            Some(host) => host.to_string(),
            None => parse_uri(url, true, false)
                .map(|parsed| parsed.host.to_string())
                .unwrap_or_default(),
        };
        LookupRespSchema {
            proxy: self.registry.lookup(url, &host),
        }
    }

    pub fn serve_batch(&self, input: impl BufRead, mut output: impl Write) -> anyhow::Result<()> {
        for line in input.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let resp = match serde_yaml::from_str::<LookupReqSchema>(&line) {
                Ok(req) => self.lookup(&req.url, Some(&req.host)),
                Err(e) => {
                    tracing::warn!("Bad lookup request {:?}: {}", line, e);
                    LookupRespSchema { proxy: None }
                }
            };
            writeln!(output, "{}", resp.directive())?;
        }
        Ok(())
    }

    /// Wait for pending script downloads, giving up after `timeout`.
    pub fn settle(&self, timeout: Duration) {
        if !self.registry.wait_fetches(timeout) {
            tracing::warn!(
                "{} script fetch(es) still pending after {:?}",
                self.registry.pending_fetches(),
                timeout
            );
        }
    }

    pub fn report(&self) -> String {
        format!(
            "{} configuration(s) installed, {} enabled, {} rejected, {} fetch(es) pending; drivers: [{}]",
            self.handles.len(),
            self.registry.active_count(),
            self.rejected,
            self.registry.pending_fetches(),
            self.registry.drivers().names().join(", ")
        )
    }

    pub fn shutdown(self) {
        for handle in self.handles {
            self.registry.destroy_config(handle);
        }
        tracing::info!("Exiting...");
        self.runtime.shutdown_timeout(Duration::from_millis(300));
    }
}

fn register_drivers(config: &RawRootCfg) -> Result<ScriptDriverRegistry, ScriptError> {
    let drivers = ScriptDriverRegistry::new();
    #[cfg(feature = "quickjs")]
    if config.driver_enabled("quickjs") {
        drivers.register(Arc::new(pacrunner::script::QuickJs::driver()?));
    }
    #[cfg(feature = "boa")]
    if config.driver_enabled("boa") {
        drivers.register(Arc::new(pacrunner::script::Boa::driver()?));
    }
    if drivers.is_empty() {
        tracing::warn!("No script driver enabled for {:?}", config.drivers);
    }
    Ok(drivers)
}
