mod config_registry;
mod domain;
mod fetch;
mod proxy_config;

pub use config_registry::*;
pub use domain::*;
pub use fetch::*;
pub use proxy_config::*;
