use crate::{Factory, FactoryId, Interface, Methods, Scope, Tag, TypeInfo};
use std::fmt::{Display, Formatter};

/// Metadata about a registered factory: what it produces, what it depends
/// on, and how the container should manage what it produces. Definitions
/// are created by [`parse_definition`](crate::parse_definition) and never
/// change afterwards.
#[derive(Clone, Debug)]
pub struct Definition {
    pub(crate) name: String,
    pub(crate) ty: TypeInfo,
    pub(crate) factory: Factory,
    pub(crate) depends_on: Vec<String>,
    pub(crate) methods: Methods,
    pub(crate) scope: Scope,
    pub(crate) desc: String,
    pub(crate) lazy_init: bool,
    pub(crate) auto_startup: bool,
    pub(crate) tags: Vec<Tag>,
}

impl Definition {
    /// Whether the definition is complete. Every definition created by the
    /// parser is valid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty()
            && self.ty.kind().is_injectable()
            && self.depends_on.len() == self.factory.argn()
            && self.depends_on.iter().all(|name| !name.is_empty())
    }

    /// The canonical name of the produced type. Every factory producing
    /// the same declared type shares this name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The identity of the factory.
    #[must_use]
    pub fn id(&self) -> &FactoryId {
        self.factory.id()
    }

    /// The declared type produced by the factory.
    #[must_use]
    pub fn ty(&self) -> TypeInfo {
        self.ty
    }

    /// Whether this definition produces `I`.
    #[must_use]
    pub fn produces<I: ?Sized + Interface>(&self) -> bool {
        self.ty == I::info()
    }

    /// The factory of this definition.
    #[must_use]
    pub fn factory(&self) -> &Factory {
        &self.factory
    }

    /// The names of the dependencies, one per factory parameter.
    #[must_use]
    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    /// A copy of the dependency names.
    #[must_use]
    pub fn dependencies(&self) -> Vec<String> {
        self.depends_on.clone()
    }

    /// The lifecycle capabilities of the produced type.
    #[must_use]
    pub fn methods(&self) -> Methods {
        self.methods
    }

    /// The scope of the definition.
    #[must_use]
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Whether a single shared instance is created.
    #[must_use]
    pub fn is_singleton(&self) -> bool {
        self.scope == Scope::Singleton
    }

    /// The description of the definition.
    #[must_use]
    pub fn desc(&self) -> &str {
        &self.desc
    }

    /// Whether initialization is deferred until first requested.
    #[must_use]
    pub fn lazy_init(&self) -> bool {
        self.lazy_init
    }

    /// Whether the object is started automatically.
    #[must_use]
    pub fn auto_startup(&self) -> bool {
        self.auto_startup
    }

    /// The tags of the definition.
    #[must_use]
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Whether the definition has the given tag.
    #[must_use]
    pub fn has_tag(&self, tag: &Tag) -> bool {
        self.tags.contains(tag)
    }
}

impl Display for Definition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}<{} [", self.name, self.ty.kind())?;
        for (index, tag) in self.tags.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{tag}")?;
        }
        f.write_str("]>")
    }
}
