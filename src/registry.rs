mod filter;
mod registry;

pub use filter::*;
pub use registry::*;
