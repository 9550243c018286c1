use crate::config::ScriptError;
use crate::script::PacNatives;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SandboxHandle(pub u64);

/// A JavaScript engine able to host isolated PAC sandboxes.
pub trait ScriptDriver: Send + Sync {
    fn name(&self) -> &str;

    /// Higher wins when the registry selects a driver.
    fn priority(&self) -> i32;

    /// Compile `script` with the PAC helpers and `natives` installed.
    fn create_sandbox(
        &self,
        script: &str,
        natives: PacNatives,
    ) -> Result<SandboxHandle, ScriptError>;

    fn destroy_sandbox(&self, handle: SandboxHandle);

    /// Call `FindProxyForURL(url, host)` inside the sandbox.
    fn execute(&self, handle: SandboxHandle, url: &str, host: &str)
        -> Result<String, ScriptError>;
}

/// A compiled script bound to the driver that owns it. Dropping it destroys the sandbox.
pub struct Sandbox {
    driver: Arc<dyn ScriptDriver>,
    handle: SandboxHandle,
}

impl Sandbox {
    pub(crate) fn new(driver: Arc<dyn ScriptDriver>, handle: SandboxHandle) -> Self {
        Self { driver, handle }
    }

    pub fn driver_name(&self) -> &str {
        self.driver.name()
    }

    pub fn execute(&self, url: &str, host: &str) -> Result<String, ScriptError> {
        self.driver.execute(self.handle, url, host)
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        self.driver.destroy_sandbox(self.handle);
    }
}

impl Debug for Sandbox {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sandbox")
            .field("driver", &self.driver.name())
            .field("handle", &self.handle)
            .finish()
    }
}
