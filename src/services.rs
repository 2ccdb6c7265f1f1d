mod func;
mod interface;
mod methods;
mod service;

pub use func::*;
pub use interface::*;
pub use methods::*;
pub use service::*;
