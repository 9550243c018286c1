use std::thread::JoinHandle;

/// Run `work` on a dedicated named OS thread.
pub fn spawn_worker<F>(name: &str, work: F) -> Option<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    std::thread::Builder::new()
        .name(format!("pac-{}", name))
        .spawn(work)
        .inspect_err(|e| {
            tracing::error!("Failed to spawn thread: {} for {}", e, name);
        })
        .ok()
}
