//! Proxy auto-configuration runner.
//!
//! A [`registry::ConfigRegistry`] holds the proxy configurations pushed by a host process and
//! answers `lookup(url, host)` with a PAC directive string, using static rules from
//! [`manual`] or a PAC script evaluated by one of the [`script`] drivers.

pub mod common;
pub mod config;
pub mod external;
pub mod manual;
pub mod network;
pub mod registry;
pub mod script;
