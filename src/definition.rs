mod definition;
mod factory;
mod parser;
mod property;
mod tag;

pub use definition::*;
pub use factory::*;
pub use parser::*;
pub use property::*;
pub use tag::*;
