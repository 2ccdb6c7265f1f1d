use crate::Tag;
use derive_more::Display;
use indexmap::IndexMap;

/// How many instances of a definition the container creates.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Default, Display)]
pub enum Scope {
    /// One shared instance, created when the container is initialized.
    #[default]
    #[display(fmt = "Singleton")]
    Singleton,
    /// A fresh instance every time the definition is requested.
    #[display(fmt = "Prototype")]
    Prototype,
}

/// A configuration option applied to a [`Property`]. See [`options`] for
/// the built-in options.
///
/// [`options`]: crate::options
pub type PropertyOption = Box<dyn FnOnce(&mut Property) + Send + Sync>;

/// Configuration supplied together with a factory when registering it. The
/// values are copied into the resulting definition.
#[derive(Clone, Debug)]
pub struct Property {
    /// The scope of the definition.
    pub scope: Scope,
    /// A human readable description.
    pub desc: String,
    /// Whether singletons skip initialization until first requested.
    pub lazy_init: bool,
    /// Whether the lifecycle processor starts the object automatically.
    pub auto_startup: bool,
    tags: IndexMap<String, Tag>,
}

impl Default for Property {
    fn default() -> Self {
        Property {
            scope: Scope::Singleton,
            desc: String::new(),
            lazy_init: true,
            auto_startup: false,
            tags: IndexMap::new(),
        }
    }
}

impl Property {
    /// Creates a property with the default configuration: singleton scope,
    /// lazy initialization, no automatic startup and no tags.
    #[must_use]
    pub fn new() -> Self {
        Property::default()
    }

    /// Sets the scope.
    #[must_use]
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = desc.into();
        self
    }

    /// Sets whether initialization is deferred.
    #[must_use]
    pub fn with_lazy_init(mut self, lazy_init: bool) -> Self {
        self.lazy_init = lazy_init;
        self
    }

    /// Sets whether the object is started automatically.
    #[must_use]
    pub fn with_auto_startup(mut self, auto_startup: bool) -> Self {
        self.auto_startup = auto_startup;
        self
    }

    /// Adds a tag. A tag with the same key replaces the previous one.
    #[must_use]
    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.set_tags([tag]);
        self
    }

    /// Marks the definition as eligible for automatic wiring.
    #[must_use]
    pub fn autowired(self) -> Self {
        self.with_tag(crate::TAG_AUTOWIRED)
    }

    /// Applies a list of options in order.
    #[must_use]
    pub fn with_options<I>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = PropertyOption>,
    {
        for option in options {
            option(&mut self);
        }
        self
    }

    /// Adds tags. For each key, the last tag written wins.
    pub fn set_tags<I>(&mut self, tags: I)
    where
        I: IntoIterator<Item = Tag>,
    {
        for tag in tags {
            self.tags.insert(tag.key().to_owned(), tag);
        }
    }

    /// A copy of the tags, in the order their keys were first written.
    #[must_use]
    pub fn tags(&self) -> Vec<Tag> {
        self.tags.values().cloned().collect()
    }
}

/// Functional options for configuring a [`Property`].
///
/// ```
/// use runtime_container::{options, Property, Scope};
///
/// let property = Property::new().with_options([
///     options::prototype(),
///     options::desc("request handler"),
///     options::tag("env", "prod"),
/// ]);
/// assert_eq!(Scope::Prototype, property.scope);
/// ```
pub mod options {
    use super::{Property, PropertyOption, Scope};
    use crate::Tag;

    /// Sets the description.
    #[must_use]
    pub fn desc(desc: impl Into<String>) -> PropertyOption {
        let desc = desc.into();
        Box::new(move |property: &mut Property| property.desc = desc)
    }

    /// Uses the singleton scope.
    #[must_use]
    pub fn singleton() -> PropertyOption {
        Box::new(|property: &mut Property| property.scope = Scope::Singleton)
    }

    /// Uses the prototype scope.
    #[must_use]
    pub fn prototype() -> PropertyOption {
        Box::new(|property: &mut Property| property.scope = Scope::Prototype)
    }

    /// Defers initialization of singletons until they are first requested.
    #[must_use]
    pub fn lazy_init() -> PropertyOption {
        Box::new(|property: &mut Property| property.lazy_init = true)
    }

    /// Initializes singletons as soon as the container is initialized.
    #[must_use]
    pub fn eager_init() -> PropertyOption {
        Box::new(|property: &mut Property| property.lazy_init = false)
    }

    /// Starts the object automatically when the container starts.
    #[must_use]
    pub fn auto_startup() -> PropertyOption {
        Box::new(|property: &mut Property| property.auto_startup = true)
    }

    /// Makes the definition eligible for automatic wiring.
    #[must_use]
    pub fn autowired() -> PropertyOption {
        Box::new(|property: &mut Property| {
            property.set_tags([crate::TAG_AUTOWIRED]);
        })
    }

    /// Adds a tag.
    #[must_use]
    pub fn tag(key: impl Into<String>, value: impl Into<String>) -> PropertyOption {
        let tag = Tag::new(key, value);
        Box::new(move |property: &mut Property| property.set_tags([tag]))
    }
}
