//! Runtime dependency injection with lifecycle management.
//!
//! Factories are ordinary functions whose parameters are the dependencies of
//! the value they return. Registering a factory turns it into a
//! `Definition`, which records the type it produces, the names of its
//! dependencies, its scope, tags and lifecycle capabilities. When the
//! container is initialized, it becomes read-only, the dependency graph of
//! every definition is checked for cycles and missing registrations, and
//! the singletons are built.
//!
//! # Names and realizations
//!
//! Definitions are looked up by the canonical name of the type they
//! produce. Structs are named `path::*Ident`, and interfaces (trait
//! objects) are named after the trait. Several definitions may produce the
//! same type. Each of them is a realization, and when a dependency has more
//! than one, a `RealizationSelector` picks the one that gets injected. Only
//! definitions tagged as autowired take part in dependency resolution.
//!
//! # Scopes
//!
//! - Singleton: one instance is created when the container is initialized,
//!   and the same instance is injected everywhere.
//! - Prototype: a fresh instance is created each time the definition is
//!   requested.
//!
//! # Lifecycle
//!
//! Components may implement `Initializable`, `Destroyable` and `Lifecycle`.
//! Dependencies are initialized before they are injected. Singletons marked
//! for automatic startup are started dependency first when the container is
//! started, each within a timeout, and stopped in reverse order when it is
//! shut down.
//!
//! # Example
//!
//! ```
//! use runtime_container::{
//!     component, interface, options, BoxError, Container, Lifecycle, Svc,
//! };
//! use std::sync::atomic::{AtomicBool, Ordering};
//!
//! // An interface. Other services depend on it without knowing which
//! // implementation they get.
//! trait Store: Send + Sync {
//!     fn get(&self, key: &str) -> Option<String>;
//! }
//!
//! struct MemoryStore;
//! impl Store for MemoryStore {
//!     fn get(&self, key: &str) -> Option<String> {
//!         Some(format!("value of {key}"))
//!     }
//! }
//!
//! interface!(Store);
//!
//! // A service with a running lifecycle.
//! struct Api {
//!     store: Svc<dyn Store>,
//!     running: AtomicBool,
//! }
//!
//! impl Lifecycle for Api {
//!     fn start(&self) -> Result<(), BoxError> {
//!         self.running.store(true, Ordering::SeqCst);
//!         Ok(())
//!     }
//!
//!     fn stop(&self) -> Result<(), BoxError> {
//!         self.running.store(false, Ordering::SeqCst);
//!         Ok(())
//!     }
//!
//!     fn running(&self) -> bool {
//!         self.running.load(Ordering::SeqCst)
//!     }
//! }
//!
//! component!(Api: Lifecycle);
//!
//! fn store() -> Box<dyn Store> {
//!     Box::new(MemoryStore)
//! }
//!
//! fn api(store: Svc<dyn Store>) -> Api {
//!     Api {
//!         store,
//!         running: AtomicBool::new(false),
//!     }
//! }
//!
//! fn main() -> Result<(), BoxError> {
//!     let container = Container::new();
//!     container.register(store, [options::autowired()])?;
//!     container.register(api, [options::auto_startup()])?;
//!
//!     // Validates the graph and builds the singletons, then starts the
//!     // services
//!     container.start()?;
//!
//!     let api: Svc<Api> = container.get()?;
//!     assert!(api.running());
//!     assert_eq!(Some("value of user".to_owned()), api.store.get("user"));
//!
//!     container.shutdown();
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::needless_pass_by_value
)]

mod business;
mod container;
mod dag;
mod definition;
pub mod logging;
mod registry;
mod services;

pub use business::*;
pub use container::*;
pub use dag::*;
pub use definition::*;
pub use registry::*;
pub use services::*;

#[cfg(test)]
mod tests;
