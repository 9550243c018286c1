//! PAC script evaluation: drivers, sandboxes and the registry that selects between them.

#[cfg(feature = "boa")]
mod boa;
mod driver;
mod driver_registry;
mod engine_thread;
mod natives;
#[cfg(feature = "quickjs")]
mod quickjs;

#[cfg(feature = "boa")]
pub use boa::{Boa, BOA_PRIORITY};
pub use driver::*;
pub use driver_registry::*;
pub use engine_thread::ThreadedDriver;
pub use natives::{is_in_net, PacNatives};
#[cfg(feature = "quickjs")]
pub use quickjs::{QuickJs, QUICKJS_PRIORITY};

pub(crate) const PAC_UTILS: &str = include_str!("pac_utils.js");

#[cfg(test)]
pub(crate) use driver_registry::tests::{natives as test_natives, FakeDriver};
#[cfg(test)]
pub(crate) use natives::tests::StaticResolver;
