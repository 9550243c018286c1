mod iface;
mod resolve;

pub use iface::*;
pub use resolve::*;
