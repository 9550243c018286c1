use crate::config::ScriptError;
use crate::script::{PacNatives, Sandbox, ScriptDriver};
use arc_swap::ArcSwap;
use std::sync::Arc;

/// Drivers ordered by descending priority. Readers take a snapshot and never block writers.
pub struct ScriptDriverRegistry {
    drivers: ArcSwap<Vec<Arc<dyn ScriptDriver>>>,
}

impl Default for ScriptDriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptDriverRegistry {
    pub fn new() -> Self {
        Self {
            drivers: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Drivers of equal priority keep their registration order.
    pub fn register(&self, driver: Arc<dyn ScriptDriver>) {
        tracing::info!(
            "Registered script driver {} (priority {})",
            driver.name(),
            driver.priority()
        );
        self.drivers.rcu(|list| {
            let mut list = Vec::clone(list);
            let pos = list
                .iter()
                .position(|d| d.priority() < driver.priority())
                .unwrap_or(list.len());
            list.insert(pos, driver.clone());
            list
        });
    }

    /// Existing sandboxes keep their driver alive until they are dropped.
    pub fn unregister(&self, name: &str) -> bool {
        let previous = self.drivers.rcu(|list| {
            list.iter()
                .filter(|d| d.name() != name)
                .cloned()
                .collect::<Vec<_>>()
        });
        let removed = previous.iter().any(|d| d.name() == name);
        if removed {
            tracing::info!("Unregistered script driver {}", name);
        }
        removed
    }

    pub fn select(&self) -> Option<Arc<dyn ScriptDriver>> {
        self.drivers.load().first().cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.drivers
            .load()
            .iter()
            .map(|d| d.name().to_string())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.load().is_empty()
    }

    pub fn create_sandbox(&self, script: &str, natives: PacNatives) -> Result<Sandbox, ScriptError> {
        let driver = self.select().ok_or(ScriptError::NoDriver)?;
        let handle = driver.create_sandbox(script, natives)?;
        tracing::debug!("Created sandbox {:?} on {}", handle, driver.name());
        Ok(Sandbox::new(driver, handle))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::script::natives::tests::StaticResolver;
    use crate::script::SandboxHandle;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    /// Driver that answers every lookup with a fixed directive and tracks live sandboxes.
    /// An empty directive makes every execution throw.
    pub(crate) struct FakeDriver {
        pub name: &'static str,
        pub priority: i32,
        pub answer: String,
        pub next: AtomicU64,
        pub live: Mutex<Vec<u64>>,
    }

    impl FakeDriver {
        pub(crate) fn new(name: &'static str, priority: i32, answer: &str) -> Arc<Self> {
            Arc::new(Self {
                name,
                priority,
                answer: answer.to_string(),
                next: AtomicU64::new(0),
                live: Mutex::new(vec![]),
            })
        }
    }

    impl ScriptDriver for FakeDriver {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn create_sandbox(
            &self,
            script: &str,
            _natives: PacNatives,
        ) -> Result<SandboxHandle, ScriptError> {
            if script.contains("syntax error") {
                return Err(ScriptError::Compile(script.to_string()));
            }
            let id = self.next.fetch_add(1, Ordering::Relaxed);
            self.live.lock().unwrap().push(id);
            Ok(SandboxHandle(id))
        }

        fn destroy_sandbox(&self, handle: SandboxHandle) {
            self.live.lock().unwrap().retain(|id| *id != handle.0);
        }

        fn execute(
            &self,
            handle: SandboxHandle,
            _url: &str,
            _host: &str,
        ) -> Result<String, ScriptError> {
            if !self.live.lock().unwrap().contains(&handle.0) {
                Err(ScriptError::UnknownSandbox(handle.0))
            } else if self.answer.is_empty() {
                Err(ScriptError::Exception("no answer".to_string()))
            } else {
                Ok(self.answer.clone())
            }
        }
    }

    pub(crate) fn natives() -> PacNatives {
        PacNatives::new(None, Arc::new(StaticResolver::default()))
    }

    #[test]
    fn test_priority_order() {
        let registry = ScriptDriverRegistry::new();
        assert!(registry.select().is_none());
        assert!(matches!(
            registry.create_sandbox("", natives()),
            Err(ScriptError::NoDriver)
        ));

        registry.register(FakeDriver::new("low", 10, "DIRECT"));
        registry.register(FakeDriver::new("high", 100, "PROXY a:1"));
        registry.register(FakeDriver::new("mid", 50, "PROXY b:1"));
        registry.register(FakeDriver::new("high2", 100, "PROXY c:1"));
        assert_eq!(registry.names(), ["high", "high2", "mid", "low"]);
        assert_eq!(registry.select().unwrap().name(), "high");

        assert!(registry.unregister("high"));
        assert!(!registry.unregister("high"));
        assert_eq!(registry.select().unwrap().name(), "high2");
    }

    #[test]
    fn test_sandbox_lifecycle() {
        let registry = ScriptDriverRegistry::new();
        let driver = FakeDriver::new("fake", 1, "PROXY p:8080");
        registry.register(driver.clone());

        let sandbox = registry
            .create_sandbox("function FindProxyForURL(u, h) {}", natives())
            .unwrap();
        assert_eq!(sandbox.driver_name(), "fake");
        assert_eq!(sandbox.execute("http://a/", "a").unwrap(), "PROXY p:8080");
        assert_eq!(driver.live.lock().unwrap().len(), 1);

        // unregistering does not invalidate existing sandboxes
        registry.unregister("fake");
        assert!(registry.is_empty());
        assert!(sandbox.execute("http://a/", "a").is_ok());

        drop(sandbox);
        assert!(driver.live.lock().unwrap().is_empty());

        registry.register(driver.clone());
        assert!(matches!(
            registry.create_sandbox("syntax error", natives()),
            Err(ScriptError::Compile(_))
        ));
        assert!(driver.live.lock().unwrap().is_empty());
    }
}
