mod container;
mod context;
mod lifecycle;
mod object;
mod object_factory;
mod selector;
mod task;

pub use container::*;
pub use context::*;
pub use lifecycle::*;
pub use object::*;
pub use object_factory::*;
pub use selector::*;
pub use task::*;
