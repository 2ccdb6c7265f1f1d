use crate::{BoxError, Core, Definition, FactoryId};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::{
    fmt::{Debug, Display, Formatter},
    sync::Arc,
};

/// A hook run while its plugin is being initialized. Extensions registered
/// from a hook belong to the plugin.
pub type InitHook = Box<dyn Fn(&Core) -> Result<(), BoxError> + Send + Sync>;

/// A named group of extensions contributed to a [`Core`].
///
/// A plugin registers its extensions from init hooks. The core runs the
/// hooks of one plugin at a time during [`Core::init`], and attributes
/// every extension registered meanwhile to that plugin's namespace.
pub struct Plugin {
    name: String,
    hooks: Mutex<Vec<InitHook>>,
    extensions: Mutex<IndexMap<FactoryId, Arc<Definition>>>,
}

impl Plugin {
    /// Creates a plugin with no hooks. Its name is also its namespace.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Plugin {
            name: name.into(),
            hooks: Mutex::new(Vec::new()),
            extensions: Mutex::new(IndexMap::new()),
        }
    }

    /// The name of the plugin.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a hook to run when the plugin is initialized. Hooks run in the
    /// order they were added.
    pub fn on_init<F>(&self, hook: F)
    where
        F: Fn(&Core) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.hooks.lock().push(Box::new(hook));
    }

    /// Adds a hook to run when the plugin is initialized.
    #[must_use]
    pub fn with_init<F>(self, hook: F) -> Self
    where
        F: Fn(&Core) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.on_init(hook);
        self
    }

    /// The extensions registered by this plugin, in registration order.
    #[must_use]
    pub fn extensions(&self) -> Vec<Arc<Definition>> {
        self.extensions.lock().values().cloned().collect()
    }

    /// Records an extension. Returns `false` if an extension with the same
    /// factory was already recorded.
    pub(crate) fn add_extension(&self, definition: Arc<Definition>) -> bool {
        let mut extensions = self.extensions.lock();
        if extensions.contains_key(definition.id()) {
            return false;
        }

        extensions.insert(definition.id().clone(), definition);
        true
    }

    /// Runs the hooks in order, stopping at the first failure.
    pub(crate) fn run_hooks(&self, core: &Core) -> Result<(), BoxError> {
        let hooks = std::mem::take(&mut *self.hooks.lock());
        hooks.iter().try_for_each(|hook| hook(core))
    }
}

impl Debug for Plugin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("hooks", &self.hooks.lock().len())
            .field("extensions", &self.extensions.lock().len())
            .finish()
    }
}

impl Display for Plugin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
