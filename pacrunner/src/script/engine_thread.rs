use crate::common::spawn_worker;
use crate::config::ScriptError;
use crate::script::{PacNatives, SandboxHandle, ScriptDriver};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// A single-threaded JavaScript engine. It is created on, and never leaves, its worker thread.
pub(crate) trait JsEngine {
    type Sandbox;

    fn create(&mut self, script: &str, natives: PacNatives) -> Result<Self::Sandbox, ScriptError>;

    fn execute(
        &mut self,
        sandbox: &mut Self::Sandbox,
        url: &str,
        host: &str,
    ) -> Result<String, ScriptError>;
}

enum Command {
    Create {
        id: u64,
        script: String,
        natives: PacNatives,
        reply: flume::Sender<Result<(), ScriptError>>,
    },
    Destroy {
        id: u64,
    },
    Execute {
        id: u64,
        url: String,
        host: String,
        reply: flume::Sender<Result<String, ScriptError>>,
    },
}

/// Driver that forwards every call to an engine running on its own thread.
///
/// The thread exits once the driver and every sandbox created from it are dropped.
pub struct ThreadedDriver {
    name: &'static str,
    priority: i32,
    commands: flume::Sender<Command>,
    next_id: AtomicU64,
}

impl ThreadedDriver {
    pub(crate) fn spawn<E, F>(name: &'static str, priority: i32, init: F) -> Result<Self, ScriptError>
    where
        E: JsEngine + 'static,
        F: FnOnce() -> Result<E, ScriptError> + Send + 'static,
    {
        let (tx, rx) = flume::unbounded();
        let (ready_tx, ready_rx) = flume::bounded(1);
        spawn_worker(name, move || {
            let mut engine = match init() {
                Ok(engine) => {
                    let _ = ready_tx.send(Ok(()));
                    engine
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            run_engine(name, &mut engine, rx);
        })
        .ok_or_else(|| ScriptError::Init(name, "failed to spawn engine thread".to_string()))?;
        ready_rx
            .recv()
            .map_err(|_| ScriptError::EngineGone(name))??;
        Ok(Self {
            name,
            priority,
            commands: tx,
            next_id: AtomicU64::new(1),
        })
    }

    fn request<T>(
        &self,
        build: impl FnOnce(flume::Sender<Result<T, ScriptError>>) -> Command,
    ) -> Result<T, ScriptError> {
        let (reply_tx, reply_rx) = flume::bounded(1);
        self.commands
            .send(build(reply_tx))
            .map_err(|_| ScriptError::EngineGone(self.name))?;
        reply_rx
            .recv()
            .map_err(|_| ScriptError::EngineGone(self.name))?
    }
}

fn run_engine<E: JsEngine>(name: &str, engine: &mut E, commands: flume::Receiver<Command>) {
    let mut sandboxes: HashMap<u64, E::Sandbox> = HashMap::new();
    while let Ok(cmd) = commands.recv() {
        match cmd {
            Command::Create {
                id,
                script,
                natives,
                reply,
            } => {
                let result = engine.create(&script, natives).map(|sandbox| {
                    sandboxes.insert(id, sandbox);
                });
                let _ = reply.send(result);
            }
            Command::Destroy { id } => {
                sandboxes.remove(&id);
            }
            Command::Execute {
                id,
                url,
                host,
                reply,
            } => {
                let result = match sandboxes.get_mut(&id) {
                    Some(sandbox) => engine.execute(sandbox, &url, &host),
                    None => Err(ScriptError::UnknownSandbox(id)),
                };
                let _ = reply.send(result);
            }
        }
    }
    tracing::debug!("Script engine {} stopped", name);
}

impl ScriptDriver for ThreadedDriver {
    fn name(&self) -> &str {
        self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn create_sandbox(
        &self,
        script: &str,
        natives: PacNatives,
    ) -> Result<SandboxHandle, ScriptError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.request(|reply| Command::Create {
            id,
            script: script.to_string(),
            natives,
            reply,
        })?;
        Ok(SandboxHandle(id))
    }

    fn destroy_sandbox(&self, handle: SandboxHandle) {
        let _ = self.commands.send(Command::Destroy { id: handle.0 });
    }

    fn execute(
        &self,
        handle: SandboxHandle,
        url: &str,
        host: &str,
    ) -> Result<String, ScriptError> {
        self.request(|reply| Command::Execute {
            id: handle.0,
            url: url.to_string(),
            host: host.to_string(),
            reply,
        })
    }
}
