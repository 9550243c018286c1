mod host_matcher;
mod sync;

pub use host_matcher::*;
pub use sync::*;
