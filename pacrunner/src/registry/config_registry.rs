use crate::config::{ConfigError, ValidationError};
use crate::manual::{ExcludeTable, ServerTable};
use crate::network::NameResolver;
use crate::registry::{
    is_browser_url, DomainScope, FetchDone, ProxyConfig, ProxyMode, RequestHost, ScriptFetcher,
};
use crate::script::{PacNatives, ScriptDriverRegistry};
use linked_hash_map::LinkedHashMap;
use pacapi::{ProxyConfigSchema, ProxyMethod};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigHandle(u64);

impl ConfigHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl Display for ConfigHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Entry {
    /// Settings without a sandbox; the live copy sits in `State::active`.
    config: ProxyConfig,
    /// Bumped on every mode change, so that a fetch can tell it is stale.
    generation: u64,
    fetching: bool,
}

struct State {
    ready: bool,
    configs: HashMap<ConfigHandle, Entry>,
    /// Enabled configurations in enable order.
    active: LinkedHashMap<ConfigHandle, Arc<ProxyConfig>>,
    next_id: u64,
    pending_fetches: usize,
}

impl State {
    fn entry_mut(&mut self, handle: ConfigHandle) -> Result<&mut Entry, ConfigError> {
        self.configs
            .get_mut(&handle)
            .ok_or(ConfigError::UnknownConfig(handle.0))
    }
}

enum FetchOutcome {
    Discard,
    Install(ProxyConfig),
    Refetch(u64, Option<String>, String),
}

struct Shared {
    state: Mutex<State>,
    ready: Condvar,
    /// Signalled when the last pending fetch completes.
    fetched: Condvar,
    /// Serializes reconfiguration. Lookups never take it.
    control: Mutex<()>,
    drivers: Arc<ScriptDriverRegistry>,
    resolver: Arc<dyn NameResolver>,
    fetcher: Arc<dyn ScriptFetcher>,
    started: Instant,
    grace: Duration,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_control(&self) -> MutexGuard<'_, ()> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mark_ready(&self, state: &mut State) {
        if !state.ready {
            tracing::info!("Configuration registry is ready");
            state.ready = true;
            self.ready.notify_all();
        }
    }

    /// Ends the startup grace period once it has run out. Returns whether the registry is ready.
    fn expire_grace(&self, state: &mut State) -> bool {
        if !state.ready && self.started.elapsed() >= self.grace {
            tracing::info!("No configuration after {:?}, answering DIRECT", self.grace);
            state.ready = true;
            self.ready.notify_all();
        }
        state.ready
    }

    /// Blocks until the first configuration is installed or the startup grace period is over.
    fn wait_ready(&self) -> MutexGuard<'_, State> {
        let mut state = self.lock_state();
        if self.expire_grace(&mut state) {
            return state;
        }
        let remaining = self.grace.saturating_sub(self.started.elapsed());
        let (mut state, _) = self
            .ready
            .wait_timeout_while(state, remaining, |s| !s.ready)
            .unwrap_or_else(PoisonError::into_inner);
        self.expire_grace(&mut state);
        state
    }

    fn fetch_done(&self) {
        let mut state = self.lock_state();
        state.pending_fetches = state.pending_fetches.saturating_sub(1);
        if state.pending_fetches == 0 {
            self.fetched.notify_all();
        }
    }

    /// Live copy of `settings`, with a fresh sandbox for auto configurations.
    fn activate(&self, settings: &ProxyConfig) -> Result<Arc<ProxyConfig>, ConfigError> {
        match settings.mode() {
            ProxyMode::Auto {
                script: Some(script),
                ..
            } => {
                let natives = PacNatives::new(
                    settings.interface().map(str::to_string),
                    self.resolver.clone(),
                );
                let sandbox = self.drivers.create_sandbox(script, natives)?;
                Ok(Arc::new(settings.with_sandbox(sandbox)))
            }
            ProxyMode::Auto { script: None, .. } => Err(ConfigError::MissingScript),
            _ => Ok(Arc::new(settings.clone())),
        }
    }

    /// Replace the mode of `handle` and enable it, keeping its position when already enabled.
    fn install(&self, handle: ConfigHandle, mode: ProxyMode) -> Result<(), ConfigError> {
        let _control = self.lock_control();
        let settings = {
            let mut state = self.lock_state();
            let entry = state.entry_mut(handle)?;
            entry.generation += 1;
            entry.config.set_mode(mode);
            entry.config.clone()
        };
        let live = self.activate(&settings);
        let mut state = self.lock_state();
        match live {
            Ok(live) => {
                if let Some(slot) = state.active.get_mut(&handle) {
                    *slot = live;
                } else {
                    state.active.insert(handle, live);
                }
                self.mark_ready(&mut state);
                Ok(())
            }
            Err(e) => {
                let stale = state.active.remove(&handle);
                drop(state);
                drop(stale);
                Err(e)
            }
        }
    }

    fn start_fetch(
        self: &Arc<Self>,
        handle: ConfigHandle,
        generation: u64,
        interface: Option<String>,
        url: String,
    ) {
        self.lock_state().pending_fetches += 1;
        tracing::info!("Fetching script for configuration {} from {}", handle, url);
        let weak = Arc::downgrade(self);
        let done: FetchDone = Box::new(move |content| {
            if let Some(shared) = weak.upgrade() {
                shared.finish_fetch(handle, generation, content);
            }
        });
        self.fetcher.fetch(interface.as_deref(), &url, done);
    }

    fn finish_fetch(self: &Arc<Self>, handle: ConfigHandle, generation: u64, content: Option<String>) {
        let control = self.lock_control();
        let outcome = {
            let mut state = self.lock_state();
            match state.configs.get_mut(&handle) {
                None => FetchOutcome::Discard,
                Some(entry) if entry.generation != generation => {
                    match entry.config.pending_url() {
                        Some(url) => FetchOutcome::Refetch(
                            entry.generation,
                            entry.config.interface().map(str::to_string),
                            url.to_string(),
                        ),
                        None => {
                            entry.fetching = false;
                            FetchOutcome::Discard
                        }
                    }
                }
                Some(entry) => {
                    entry.fetching = false;
                    let url = entry.config.pending_url().map(str::to_string);
                    match (content, url) {
                        (Some(script), Some(url)) => {
                            entry.config.set_mode(ProxyMode::Auto {
                                script_url: Some(url),
                                script: Some(script),
                                sandbox: None,
                            });
                            FetchOutcome::Install(entry.config.clone())
                        }
                        (None, _) => {
                            tracing::warn!("Configuration {} stays disabled", handle);
                            FetchOutcome::Discard
                        }
                        (Some(_), None) => FetchOutcome::Discard,
                    }
                }
            }
        };
        match outcome {
            FetchOutcome::Discard => drop(control),
            FetchOutcome::Install(settings) => {
                match self.activate(&settings) {
                    Ok(live) => {
                        let mut state = self.lock_state();
                        state.active.insert(handle, live);
                        self.mark_ready(&mut state);
                        tracing::info!("Enabled configuration {} with fetched script", handle);
                    }
                    Err(e) => tracing::warn!("Configuration {} stays disabled: {}", handle, e),
                }
                drop(control);
            }
            FetchOutcome::Refetch(generation, interface, url) => {
                drop(control);
                self.start_fetch(handle, generation, interface, url);
            }
        }
        self.fetch_done();
    }
}

/// Owns every proxy configuration and answers lookups against the enabled ones.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct ConfigRegistry {
    shared: Arc<Shared>,
}

impl ConfigRegistry {
    pub fn new(
        drivers: Arc<ScriptDriverRegistry>,
        resolver: Arc<dyn NameResolver>,
        fetcher: Arc<dyn ScriptFetcher>,
        grace: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    ready: false,
                    configs: HashMap::new(),
                    active: LinkedHashMap::new(),
                    next_id: 1,
                    pending_fetches: 0,
                }),
                ready: Condvar::new(),
                fetched: Condvar::new(),
                control: Mutex::new(()),
                drivers,
                resolver,
                fetcher,
                started: Instant::now(),
                grace,
            }),
        }
    }

    pub fn drivers(&self) -> &ScriptDriverRegistry {
        &self.shared.drivers
    }

    /// Create and configure a configuration in one step. Nothing is kept on failure.
    pub fn create_config(&self, schema: &ProxyConfigSchema) -> Result<ConfigHandle, ConfigError> {
        let method = schema.method.as_deref().ok_or(ConfigError::NoMethod)?;
        let method = method
            .parse::<ProxyMethod>()
            .map_err(|_| ConfigError::InvalidMethod(method.to_string()))?;
        let handle = {
            let mut state = self.shared.lock_state();
            let handle = ConfigHandle(state.next_id);
            state.next_id += 1;
            state.configs.insert(
                handle,
                Entry {
                    config: ProxyConfig::new(schema.interface.clone()),
                    generation: 0,
                    fetching: false,
                },
            );
            handle
        };
        let result = self
            .set_domains(handle, &schema.domains, schema.browser_only)
            .and_then(|_| match method {
                ProxyMethod::Direct => self.set_direct(handle),
                ProxyMethod::Manual => self.set_manual(
                    handle,
                    schema
                        .servers
                        .as_deref()
                        .ok_or(ValidationError::MissingServers)?,
                    schema.excludes.as_deref().unwrap_or_default(),
                ),
                ProxyMethod::Auto => {
                    self.set_auto(handle, schema.url.as_deref(), schema.script.as_deref())
                }
            });
        match result {
            Ok(()) => {
                tracing::info!("Created {} configuration {}", method, handle);
                Ok(handle)
            }
            Err(e) => {
                self.destroy_config(handle);
                tracing::warn!("Failed to create {} configuration: {}", method, e);
                Err(e)
            }
        }
    }

    /// Returns false for an unknown handle. The sandbox goes away once in-flight lookups finish.
    pub fn destroy_config(&self, handle: ConfigHandle) -> bool {
        let _control = self.shared.lock_control();
        let (entry, live) = {
            let mut state = self.shared.lock_state();
            (state.configs.remove(&handle), state.active.remove(&handle))
        };
        if entry.is_some() {
            tracing::debug!("Destroyed configuration {}", handle);
        }
        drop(live);
        entry.is_some()
    }

    pub fn set_domains<S: AsRef<str>>(
        &self,
        handle: ConfigHandle,
        domains: &[S],
        browser_only: bool,
    ) -> Result<(), ConfigError> {
        let _control = self.shared.lock_control();
        let scope = DomainScope::new(domains);
        let mut guard = self.shared.lock_state();
        let state = &mut *guard;
        state
            .entry_mut(handle)?
            .config
            .set_scope(scope.clone(), browser_only);
        if let Some(live) = state.active.get_mut(&handle) {
            let mut updated = ProxyConfig::clone(live);
            updated.set_scope(scope, browser_only);
            *live = Arc::new(updated);
        }
        Ok(())
    }

    pub fn set_direct(&self, handle: ConfigHandle) -> Result<(), ConfigError> {
        self.shared.install(handle, ProxyMode::Direct)
    }

    /// An unknown protocol in either list rejects the call; malformed entries are skipped.
    pub fn set_manual<S: AsRef<str>>(
        &self,
        handle: ConfigHandle,
        servers: &[S],
        excludes: &[S],
    ) -> Result<(), ConfigError> {
        let servers = ServerTable::build(servers)?;
        let excludes = ExcludeTable::build(excludes)?;
        self.shared
            .install(handle, ProxyMode::Manual { servers, excludes })
    }

    /// An inline script wins over `url`. With only a url the configuration is disabled until
    /// the script arrives.
    pub fn set_auto(
        &self,
        handle: ConfigHandle,
        url: Option<&str>,
        script: Option<&str>,
    ) -> Result<(), ConfigError> {
        if let Some(script) = script {
            return self.shared.install(
                handle,
                ProxyMode::Auto {
                    script_url: url.map(str::to_string),
                    script: Some(script.to_string()),
                    sandbox: None,
                },
            );
        }
        let url = url.ok_or(ConfigError::MissingScript)?;
        let control = self.shared.lock_control();
        let (start, generation, interface, disabled) = {
            let mut guard = self.shared.lock_state();
            let state = &mut *guard;
            let entry = state.entry_mut(handle)?;
            entry.generation += 1;
            entry.config.set_mode(ProxyMode::Auto {
                script_url: Some(url.to_string()),
                script: None,
                sandbox: None,
            });
            // a running fetch restarts with this url once it completes
            let start = !entry.fetching;
            entry.fetching = true;
            let generation = entry.generation;
            let interface = entry.config.interface().map(str::to_string);
            (start, generation, interface, state.active.remove(&handle))
        };
        drop(control);
        drop(disabled);
        if start {
            self.shared
                .start_fetch(handle, generation, interface, url.to_string());
        }
        Ok(())
    }

    pub fn enable(&self, handle: ConfigHandle) -> Result<(), ConfigError> {
        let _control = self.shared.lock_control();
        let settings = {
            let state = self.shared.lock_state();
            if state.active.contains_key(&handle) {
                return Err(ConfigError::AlreadyEnabled(handle.0));
            }
            state
                .configs
                .get(&handle)
                .ok_or(ConfigError::UnknownConfig(handle.0))?
                .config
                .clone()
        };
        let live = self.shared.activate(&settings)?;
        let mut state = self.shared.lock_state();
        state.active.insert(handle, live);
        self.shared.mark_ready(&mut state);
        Ok(())
    }

    /// Returns whether the configuration was enabled.
    pub fn disable(&self, handle: ConfigHandle) -> Result<bool, ConfigError> {
        let _control = self.shared.lock_control();
        let live = {
            let mut state = self.shared.lock_state();
            if !state.configs.contains_key(&handle) {
                return Err(ConfigError::UnknownConfig(handle.0));
            }
            state.active.remove(&handle)
        };
        Ok(live.is_some())
    }

    /// Proxy directive for a request, `None` for DIRECT.
    ///
    /// Blocks until the registry is ready. Scripts run without holding the registry lock.
    pub fn lookup(&self, url: &str, host: &str) -> Option<String> {
        let selected = {
            let state = self.shared.wait_ready();
            select_config(state.active.values(), url, host).cloned()
        };
        let Some(config) = selected else {
            tracing::debug!("No configuration for {}, DIRECT", url);
            return None;
        };
        let proxy = config.execute(url, host);
        tracing::debug!(
            "{} => {}",
            url,
            proxy.as_deref().unwrap_or("DIRECT")
        );
        proxy
    }

    pub fn pending_fetches(&self) -> usize {
        self.shared.lock_state().pending_fetches
    }

    /// Blocks until no script download is pending or `timeout` runs out.
    /// Returns whether every download completed.
    pub fn wait_fetches(&self, timeout: Duration) -> bool {
        let state = self.shared.lock_state();
        let (state, _) = self
            .shared
            .fetched
            .wait_timeout_while(state, timeout, |s| s.pending_fetches > 0)
            .unwrap_or_else(PoisonError::into_inner);
        state.pending_fetches == 0
    }

    pub fn active_count(&self) -> usize {
        self.shared.lock_state().active.len()
    }

    pub fn is_enabled(&self, handle: ConfigHandle) -> bool {
        self.shared.lock_state().active.contains_key(&handle)
    }

    /// True once a configuration was installed or the startup grace period is over.
    pub fn is_ready(&self) -> bool {
        self.shared.expire_grace(&mut self.shared.lock_state())
    }
}

/// Pick the configuration answering a request.
///
/// A domain match whose browser-only flag agrees with the request wins at once. Otherwise a
/// browser request takes the first all-protocol domain match, then the first browser-only
/// catch-all, then the first all-protocol catch-all. A non-browser request matched by a
/// browser-only domain rule gets DIRECT, else the first all-protocol catch-all.
fn select_config<'a, I>(configs: I, url: &str, host: &str) -> Option<&'a Arc<ProxyConfig>>
where
    I: IntoIterator<Item = &'a Arc<ProxyConfig>>,
{
    let request = RequestHost::classify(host);
    let browser = is_browser_url(url);
    let mut domain_browser_only = None;
    let mut domain_all_protocols = None;
    let mut catchall_browser_only = None;
    let mut catchall_all_protocols = None;
    for config in configs {
        let slot = if config.scope().is_empty() {
            if config.browser_only() {
                &mut catchall_browser_only
            } else {
                &mut catchall_all_protocols
            }
        } else if !config.scope().matches(&request) {
            continue;
        } else if config.browser_only() == browser {
            return Some(config);
        } else if config.browser_only() {
            &mut domain_browser_only
        } else {
            &mut domain_all_protocols
        };
        if slot.is_none() {
            *slot = Some(config);
        }
    }
    if browser {
        domain_all_protocols
            .or(catchall_browser_only)
            .or(catchall_all_protocols)
    } else if domain_browser_only.is_some() {
        None
    } else {
        catchall_all_protocols
    }
}
