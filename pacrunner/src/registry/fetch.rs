use crate::config::FetchError;
use crate::network::interface_address;
use std::time::Duration;
use tokio::runtime::Handle;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub type FetchDone = Box<dyn FnOnce(Option<String>) + Send + 'static>;

/// Downloads PAC scripts. `done` runs exactly once, with `None` on failure.
pub trait ScriptFetcher: Send + Sync {
    fn fetch(&self, interface: Option<&str>, url: &str, done: FetchDone);
}

pub struct HttpFetcher {
    runtime: Handle,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            timeout: FETCH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn download(
        interface: Option<String>,
        url: &str,
        timeout: Duration,
    ) -> Result<String, FetchError> {
        if let Some(path) = url.strip_prefix("file://") {
            return Ok(tokio::fs::read_to_string(path).await?);
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(FetchError::UnsupportedUrl(url.to_string()));
        }
        // never fetch the script through a proxy
        let mut builder = reqwest::Client::builder().timeout(timeout).no_proxy();
        if interface.is_some() {
            match interface_address(interface.as_deref()) {
                Some(addr) => builder = builder.local_address(addr),
                None => tracing::warn!("No address on interface {:?}", interface),
            }
        }
        let resp = builder.build()?.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16(), url.to_string()));
        }
        Ok(resp.text().await?)
    }
}

impl ScriptFetcher for HttpFetcher {
    fn fetch(&self, interface: Option<&str>, url: &str, done: FetchDone) {
        let interface = interface.map(str::to_string);
        let url = url.to_string();
        let timeout = self.timeout;
        self.runtime.spawn(async move {
            let content = match Self::download(interface, &url, timeout).await {
                Ok(content) => {
                    tracing::debug!("Fetched {} bytes from {}", content.len(), url);
                    Some(content)
                }
                Err(e) => {
                    tracing::warn!("Failed to fetch script {}: {}", url, e);
                    None
                }
            };
            // completion compiles the script on an engine thread
            if let Err(e) = tokio::task::spawn_blocking(move || done(content)).await {
                tracing::error!("Script fetch completion panicked: {}", e);
            }
        });
    }
}
