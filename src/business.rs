mod business;
mod plugin;

pub use business::*;
pub use plugin::*;
