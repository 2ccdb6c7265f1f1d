use crate::{
    Context, Definition, DefinitionFilter, InjectResult, Interface, LifecycleProcessor, Object,
    ObjectFactory, Property, PropertyOption, RawFactory, RealizationSelector, ServiceFactory, Svc,
};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::{env, sync::Arc, time::Duration};
use tracing::warn;

/// The environment variable overriding [`ContainerConfig::startup_timeout`],
/// in milliseconds.
pub const STARTUP_TIMEOUT_ENV: &str = "RUNTIME_CONTAINER_STARTUP_TIMEOUT_MS";

/// The default time each service is given to start or stop.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(6);

/// Settings for a [`Container`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContainerConfig {
    /// The time each service is given to start or stop.
    pub startup_timeout: Duration,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        ContainerConfig {
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }
}

impl ContainerConfig {
    /// Reads the configuration from the environment. Unset or invalid
    /// values fall back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = ContainerConfig::default();
        if let Ok(value) = env::var(STARTUP_TIMEOUT_ENV) {
            match value.trim().parse::<u64>() {
                Ok(millis) => config.startup_timeout = Duration::from_millis(millis),
                Err(error) => warn!(
                    variable = STARTUP_TIMEOUT_ENV,
                    %value,
                    %error,
                    "ignoring invalid startup timeout"
                ),
            }
        }

        config
    }
}

/// A dependency injection container. Factories are registered first, then
/// the container is initialized, which validates the definitions and
/// builds the singletons. Services can then be started, and finally the
/// container is shut down.
///
/// # Example
///
/// ```
/// use runtime_container::{component, options, Container, Svc};
///
/// struct Config {
///     port: u16,
/// }
///
/// struct Server {
///     config: Svc<Config>,
/// }
///
/// component!(Config);
/// component!(Server);
///
/// fn server(config: Svc<Config>) -> Server {
///     Server { config }
/// }
///
/// let container = Container::new();
/// container
///     .register(|| Config { port: 8080 }, [options::autowired()])
///     .unwrap();
/// container.register(server, []).unwrap();
/// container.init().unwrap();
///
/// let server: Svc<Server> = container.get().unwrap();
/// assert_eq!(8080, server.config.port);
/// container.shutdown();
/// ```
pub struct Container {
    factory: ObjectFactory,
    lifecycle: Mutex<LifecycleProcessor>,
    context: Context,
}

impl Default for Container {
    fn default() -> Self {
        Container::with_config(ContainerConfig::default())
    }
}

impl Container {
    /// Creates an empty container with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Container::default()
    }

    /// Creates an empty container.
    #[must_use]
    pub fn with_config(config: ContainerConfig) -> Self {
        Container {
            factory: ObjectFactory::new(),
            lifecycle: Mutex::new(LifecycleProcessor::new(config.startup_timeout)),
            context: Context::new(),
        }
    }

    /// Registers a factory configured by options. No other definition may
    /// produce the same type.
    #[track_caller]
    pub fn register<D, F, I>(&self, factory: F, options: I) -> InjectResult<Arc<Definition>>
    where
        F: ServiceFactory<D>,
        I: IntoIterator<Item = PropertyOption>,
    {
        let property = Property::new().with_options(options);
        self.factory.register_factory(factory, &property, true)
    }

    /// Registers a factory. If `unique` is set, no other definition may
    /// produce the same type.
    #[track_caller]
    pub fn register_factory<D, F>(
        &self,
        factory: F,
        property: &Property,
        unique: bool,
    ) -> InjectResult<Arc<Definition>>
    where
        F: ServiceFactory<D>,
    {
        self.factory.register_factory(factory, property, unique)
    }

    /// Registers a factory in its uniform shape.
    pub fn register_raw(
        &self,
        factory: RawFactory,
        property: &Property,
        unique: bool,
    ) -> InjectResult<Arc<Definition>> {
        self.factory.register_raw(factory, property, unique)
    }

    /// Replaces the realization selector.
    pub fn set_realization_selector<S>(&self, selector: S)
    where
        S: RealizationSelector + 'static,
    {
        self.factory.set_realization_selector(selector);
    }

    /// Validates the definitions and builds the singletons. Only the first
    /// call does any work.
    pub fn init(&self) -> InjectResult<()> {
        self.factory.init()
    }

    /// Initializes the container if needed and starts the services.
    pub fn start(&self) -> InjectResult<()> {
        self.init()?;
        self.lifecycle.lock().start(&self.context, &self.factory)
    }

    /// Stops the started services and destroys the singletons. A singleton
    /// still busy with a timed out start or stop is left alive.
    pub fn shutdown(&self) {
        let mut lifecycle = self.lifecycle.lock();
        lifecycle.stop(&self.context);
        self.factory.destroy_within(lifecycle.timeout());
    }

    /// Gets an instance of `I`.
    pub fn get<I: ?Sized + Interface>(&self) -> InjectResult<Svc<I>> {
        self.factory.get(&self.context)
    }

    /// Gets an instance of `I` using the filters and objects of a context.
    pub fn get_with<I: ?Sized + Interface>(&self, context: &Context) -> InjectResult<Svc<I>> {
        self.factory.get(context)
    }

    /// Gets one object per definition producing `I` that passes the
    /// filters of the context.
    pub fn get_objects<I: ?Sized + Interface>(&self, context: &Context) -> InjectResult<Vec<Object>> {
        self.factory.get_objects::<I>(context)
    }

    /// Gets one object per definition registered under `name` that passes
    /// the filters of the context.
    pub fn get_objects_by_name(&self, context: &Context, name: &str) -> InjectResult<Vec<Object>> {
        self.factory.get_objects_by_name(context, name)
    }

    /// Gets every definition passing all filters.
    #[must_use]
    pub fn definitions(&self, filters: &[DefinitionFilter]) -> Vec<Arc<Definition>> {
        self.factory.definitions(filters)
    }

    /// The object factory backing this container.
    #[must_use]
    pub fn factory(&self) -> &ObjectFactory {
        &self.factory
    }

    /// The context used by [`get`](Container::get) and by the lifecycle
    /// calls.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }
}

static DEFAULT_CONTAINER: Lazy<Arc<Container>> =
    Lazy::new(|| Arc::new(Container::with_config(ContainerConfig::from_env())));

/// The process-wide container, created on first use.
#[must_use]
pub fn default_container() -> Arc<Container> {
    DEFAULT_CONTAINER.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_to_six_seconds() {
        assert_eq!(Duration::from_secs(6), ContainerConfig::default().startup_timeout);
    }

    #[test]
    fn default_container_is_shared() {
        assert!(Arc::ptr_eq(&default_container(), &default_container()));
    }
}
