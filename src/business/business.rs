#![allow(clippy::used_underscore_binding)]

use crate::{
    default_container, Container, Context, Definition, DefinitionFilter, InjectResult, Plugin,
    Property, RawFactory, ServiceFactory, SharedError, Tag,
};
use derive_more::{Display, Error};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::{debug, info};

/// The namespace of extensions registered outside of any plugin.
pub const MAIN_NAMESPACE: &str = "main";

/// The tag key marking what business role a definition plays.
pub const TAG_BIZ_KIND: &str = "biz_kind";

/// The tag key holding the namespace of an extension.
pub const TAG_NAMESPACE: &str = "namespace";

/// Marks a definition as an extension.
pub const TAG_EXTENSION: Tag = Tag::from_static(TAG_BIZ_KIND, "extension");

/// The tag marking a definition as part of a namespace.
#[must_use]
pub fn namespace_tag(namespace: impl Into<String>) -> Tag {
    Tag::new(TAG_NAMESPACE, namespace)
}

/// An error from coordinating plugins.
#[derive(Debug, Clone, Display, Error)]
pub enum PluginError {
    /// The core was initialized more than once.
    #[display(fmt = "the business core has already been initialized")]
    AlreadyInitialized,

    /// Plugins and extensions can no longer be registered.
    #[display(fmt = "the business core is in readonly mode")]
    Readonly,

    /// A plugin with the same name was already registered.
    #[display(fmt = "plugin {} already exists", name)]
    DuplicatePlugin {
        /// The name of the plugin.
        name: String,
    },

    /// A plugin was opened while another one was being initialized.
    #[display(fmt = "cannot open plugin {}, current is {}", plugin, current)]
    PluginBusy {
        /// The plugin that was being opened.
        plugin: String,
        /// The plugin being initialized.
        current: String,
    },

    /// A plugin was closed while it was not the one being initialized.
    #[display(fmt = "cannot close plugin {}, current is {}", plugin, current)]
    PluginNotCurrent {
        /// The plugin that was being closed.
        plugin: String,
        /// The plugin being initialized, if any.
        current: String,
    },

    /// The main namespace already has an extension of the same type.
    #[display(fmt = "main extension {} already exists", name)]
    DuplicateMainExtension {
        /// The definition name of the extension.
        name: String,
    },

    /// The plugin already registered the same factory.
    #[display(fmt = "plugin extension {} already exists in {}", name, plugin)]
    DuplicatePluginExtension {
        /// The plugin registering the extension.
        plugin: String,
        /// The definition name of the extension.
        name: String,
    },

    /// An init hook of a plugin failed.
    #[display(fmt = "failed to init plugin {}: {}", plugin, source)]
    InitHookFailed {
        /// The plugin whose hook failed.
        plugin: String,
        /// The error returned by the hook.
        source: SharedError,
    },
}

/// Coordinates plugins on top of a [`Container`].
///
/// Extensions are definitions tagged with [`TAG_EXTENSION`] and a
/// namespace tag. Extensions registered while a plugin is being
/// initialized go into that plugin's namespace. All others go into
/// [`MAIN_NAMESPACE`], where each extension type may be registered once.
///
/// # Example
///
/// ```
/// use runtime_container::{component, Container, Core, Plugin, Property, Svc};
/// use std::sync::Arc;
///
/// struct Greeting(&'static str);
/// component!(Greeting);
///
/// let core = Core::new(Arc::new(Container::new()));
/// core.register_extension(|| Greeting("hello"), &Property::new())
///     .unwrap();
///
/// let plugin = Plugin::new("french").with_init(|core| {
///     core.register_extension(|| Greeting("bonjour"), &Property::new())?;
///     Ok(())
/// });
/// core.register_plugin(plugin).unwrap();
/// core.init().unwrap();
///
/// let greeting: Svc<Greeting> = core.container().get_with(&core.context("french")).unwrap();
/// assert_eq!("bonjour", greeting.0);
/// ```
pub struct Core {
    container: Arc<Container>,
    initialized: AtomicBool,
    readonly: AtomicBool,
    plugins: RwLock<IndexMap<String, Arc<Plugin>>>,
    current: Mutex<Option<Arc<Plugin>>>,
    extensions: Mutex<IndexMap<String, Arc<Definition>>>,
}

impl Core {
    /// Creates a core on top of a container.
    #[must_use]
    pub fn new(container: Arc<Container>) -> Self {
        Core {
            container,
            initialized: AtomicBool::new(false),
            readonly: AtomicBool::new(false),
            plugins: RwLock::new(IndexMap::new()),
            current: Mutex::new(None),
            extensions: Mutex::new(IndexMap::new()),
        }
    }

    /// The underlying container.
    #[must_use]
    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    /// A context restricting lookups to the extensions of a namespace.
    #[must_use]
    pub fn context(&self, namespace: &str) -> Context {
        Context::new().with_filter(DefinitionFilter::tag(namespace_tag(namespace)))
    }

    /// Registers a plugin. Plugins can only be registered before
    /// [`init`](Core::init) is called.
    pub fn register_plugin(&self, plugin: impl Into<Arc<Plugin>>) -> InjectResult<Arc<Plugin>> {
        let plugin = plugin.into();
        if self.initialized.load(Ordering::Acquire) {
            return Err(PluginError::Readonly.into());
        }

        let mut plugins = self.plugins.write();
        if plugins.contains_key(plugin.name()) {
            return Err(PluginError::DuplicatePlugin {
                name: plugin.name().to_owned(),
            }
            .into());
        }

        plugins.insert(plugin.name().to_owned(), plugin.clone());
        debug!(plugin = %plugin, "plugin registered");
        Ok(plugin)
    }

    /// The plugin registered under a name.
    #[must_use]
    pub fn plugin(&self, name: &str) -> Option<Arc<Plugin>> {
        self.plugins.read().get(name).cloned()
    }

    /// Registers an extension. While a plugin is being initialized, the
    /// extension belongs to that plugin. Otherwise it belongs to the main
    /// namespace.
    #[track_caller]
    pub fn register_extension<D, F>(
        &self,
        factory: F,
        property: &Property,
    ) -> InjectResult<Arc<Definition>>
    where
        F: ServiceFactory<D>,
    {
        self.register_extension_raw(RawFactory::from_fn(factory), property)
    }

    /// Registers an extension in its uniform shape.
    pub fn register_extension_raw(
        &self,
        factory: RawFactory,
        property: &Property,
    ) -> InjectResult<Arc<Definition>> {
        if self.readonly.load(Ordering::Acquire) {
            return Err(PluginError::Readonly.into());
        }

        let current = self.current.lock().clone();
        match current {
            Some(plugin) => self.register_plugin_extension(factory, property, &plugin),
            None => self.register_main_extension(factory, property),
        }
    }

    /// The extensions of the main namespace, in registration order.
    #[must_use]
    pub fn main_extensions(&self) -> Vec<Arc<Definition>> {
        self.extensions.lock().values().cloned().collect()
    }

    /// Initializes every plugin, locks extension registration and
    /// initializes the container.
    ///
    /// Plugins are initialized one at a time, running the hooks of each.
    /// The first failing hook fails the whole call.
    pub fn init(&self) -> InjectResult<()> {
        if self.initialized.swap(true, Ordering::AcqRel) {
            return Err(PluginError::AlreadyInitialized.into());
        }

        let plugins: Vec<Arc<Plugin>> = self.plugins.read().values().cloned().collect();
        for plugin in plugins {
            self.open_plugin(&plugin)?;
            let result = plugin.run_hooks(self);
            self.close_plugin(&plugin)?;
            result.map_err(|source| PluginError::InitHookFailed {
                plugin: plugin.name().to_owned(),
                source: Arc::from(source),
            })?;
            info!(plugin = %plugin, extensions = plugin.extensions().len(), "plugin initialized");
        }

        self.readonly.store(true, Ordering::Release);
        self.container.init()
    }

    /// Starts the services of the container.
    pub fn start(&self) -> InjectResult<()> {
        self.container.start()
    }

    /// Shuts the container down.
    pub fn shutdown(&self) {
        self.container.shutdown();
    }

    fn register_main_extension(
        &self,
        factory: RawFactory,
        property: &Property,
    ) -> InjectResult<Arc<Definition>> {
        let mut property = property.clone();
        property.set_tags([TAG_EXTENSION, namespace_tag(MAIN_NAMESPACE)]);

        let mut extensions = self.extensions.lock();
        if let Some(output) = factory.outputs().first() {
            let name = output.canonical_name();
            if extensions.contains_key(&name) {
                return Err(PluginError::DuplicateMainExtension { name }.into());
            }
        }

        let definition = self.container.register_raw(factory, &property, true)?;
        extensions.insert(definition.name().to_owned(), definition.clone());
        Ok(definition)
    }

    fn register_plugin_extension(
        &self,
        factory: RawFactory,
        property: &Property,
        plugin: &Plugin,
    ) -> InjectResult<Arc<Definition>> {
        let mut property = property.clone();
        property.set_tags([TAG_EXTENSION, namespace_tag(plugin.name())]);

        let definition = self.container.register_raw(factory, &property, false)?;
        if !plugin.add_extension(definition.clone()) {
            return Err(PluginError::DuplicatePluginExtension {
                plugin: plugin.name().to_owned(),
                name: definition.name().to_owned(),
            }
            .into());
        }

        Ok(definition)
    }

    fn open_plugin(&self, plugin: &Arc<Plugin>) -> Result<(), PluginError> {
        let mut current = self.current.lock();
        if let Some(current) = current.as_ref() {
            return Err(PluginError::PluginBusy {
                plugin: plugin.name().to_owned(),
                current: current.name().to_owned(),
            });
        }

        *current = Some(plugin.clone());
        Ok(())
    }

    fn close_plugin(&self, plugin: &Arc<Plugin>) -> Result<(), PluginError> {
        let mut current = self.current.lock();
        match current.as_ref() {
            Some(open) if Arc::ptr_eq(open, plugin) => {
                *current = None;
                Ok(())
            }
            open => Err(PluginError::PluginNotCurrent {
                plugin: plugin.name().to_owned(),
                current: open.map(|open| open.name().to_owned()).unwrap_or_default(),
            }),
        }
    }
}

static DEFAULT_CORE: Lazy<Arc<Core>> = Lazy::new(|| Arc::new(Core::new(default_container())));

/// The process-wide business core, built on [`default_container`] and
/// created on first use.
#[must_use]
pub fn default_core() -> Arc<Core> {
    DEFAULT_CORE.clone()
}
