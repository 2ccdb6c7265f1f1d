#![allow(clippy::used_underscore_binding)]

use crate::{GraphError, LifecycleError, ParseError, PluginError};
use derive_more::{Display, Error};
use std::{
    any::{Any, TypeId},
    error::Error,
    sync::Arc,
};

/// A reference-counted pointer holding a service.
pub type Svc<T> = Arc<T>;

/// A reference-counted service pointer holding an instance of `dyn Any`.
pub type DynSvc = Arc<dyn Any + Send + Sync>;

/// An error returned by user code, such as a lifecycle hook.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// A shareable error returned by user code. Errors raised by hooks are
/// converted into this so that [`InjectError`] can be cloned.
pub type SharedError = Arc<dyn Error + Send + Sync + 'static>;

/// A result from attempting to inject dependencies into a service and
/// construct an instance of it.
pub type InjectResult<T> = Result<T, InjectError>;

/// Implemented automatically on types that are capable of being a service.
pub trait Service: Any + Send + Sync {}
impl<T: ?Sized + Any + Send + Sync> Service for T {}

/// The shape of a type, as far as the container cares about it. Only
/// structs and interfaces may be injected or produced by a factory.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Display)]
pub enum TypeKind {
    /// A named type (struct, enum or union).
    #[display(fmt = "struct")]
    Struct,
    /// A trait object (`dyn Trait`).
    #[display(fmt = "interface")]
    Interface,
    /// A built-in scalar type or string.
    #[display(fmt = "primitive")]
    Primitive,
    /// The unit type, which stands for "no value".
    #[display(fmt = "unit")]
    Unit,
    /// A tuple, which stands for "more than one value".
    #[display(fmt = "tuple")]
    Tuple,
    /// References, pointers, slices, arrays and function pointers.
    #[display(fmt = "other")]
    Other,
}

const PRIMITIVES: &[&str] = &[
    "bool",
    "char",
    "i8",
    "i16",
    "i32",
    "i64",
    "i128",
    "isize",
    "u8",
    "u16",
    "u32",
    "u64",
    "u128",
    "usize",
    "f32",
    "f64",
    "str",
    "alloc::string::String",
];

impl TypeKind {
    /// Classifies a type by its [`type_name`](std::any::type_name).
    #[must_use]
    pub fn classify(type_name: &str) -> Self {
        if type_name.starts_with("dyn ") {
            TypeKind::Interface
        } else if type_name == "()" {
            TypeKind::Unit
        } else if type_name.starts_with('(') {
            TypeKind::Tuple
        } else if type_name.starts_with(['&', '*', '[', '!'])
            || type_name.starts_with("fn(")
            || type_name.starts_with("unsafe ")
            || type_name.starts_with("extern ")
            || type_name.starts_with("impl ")
        {
            TypeKind::Other
        } else if PRIMITIVES.contains(&type_name) {
            TypeKind::Primitive
        } else {
            TypeKind::Struct
        }
    }

    /// Whether a value of this kind may be a dependency or a factory output.
    #[must_use]
    pub fn is_injectable(self) -> bool {
        matches!(self, TypeKind::Struct | TypeKind::Interface)
    }
}

/// Type information about a service.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
    kind: TypeKind,
}

impl TypeInfo {
    /// Creates a [`TypeInfo`] for the given type.
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + Any>() -> Self {
        let name = std::any::type_name::<T>();
        TypeInfo {
            id: TypeId::of::<T>(),
            name,
            kind: TypeKind::classify(name),
        }
    }

    /// Gets the [`TypeId`] for this type.
    #[inline]
    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Gets the type name of this type.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Gets the kind of this type.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Gets the name definitions of this type are registered under. Structs
    /// are named `path::*Type` and interfaces `path::Trait`, so every
    /// factory producing the same declared type shares one name.
    #[must_use]
    pub fn canonical_name(&self) -> String {
        canonical_name(self.name, self.kind)
    }
}

pub(crate) fn canonical_name(type_name: &str, kind: TypeKind) -> String {
    match kind {
        TypeKind::Interface => {
            let name = type_name.trim_start_matches("dyn ");
            // Auto trait bounds are not part of the interface identity
            let name = name.split(" + ").next().unwrap_or(name);
            name.to_owned()
        }
        TypeKind::Struct => {
            let (path, generics) = match type_name.find('<') {
                Some(index) => type_name.split_at(index),
                None => (type_name, ""),
            };
            match path.rsplit_once("::") {
                Some((module, ident)) => {
                    format!("{module}::*{ident}{generics}")
                }
                None => format!("*{path}{generics}"),
            }
        }
        _ => type_name.to_owned(),
    }
}

/// An error that has occurred while registering, wiring, or managing
/// services.
#[derive(Debug, Clone, Display, Error)]
#[non_exhaustive]
pub enum InjectError {
    /// The factory signature could not be turned into a definition.
    #[display(fmt = "failed to parse definition: {}", _0)]
    Parse(ParseError),

    /// The same factory was registered twice.
    #[display(fmt = "definition's factory function {} already exists", factory)]
    DuplicateFactory {
        /// The identity of the factory.
        factory: String,
    },

    /// A definition with this name already exists and uniqueness was
    /// requested.
    #[display(fmt = "object type {} does not allow duplicate definition", name)]
    DuplicateName {
        /// The canonical name of the definition.
        name: String,
    },

    /// A mutating call was made after the registry was locked.
    #[display(fmt = "the definition registry has been locked")]
    Readonly,

    /// The registry has already been initialized.
    #[display(fmt = "the definition registry has already been initialized")]
    AlreadyInitialized,

    /// The dependency graph could not be sorted.
    #[display(fmt = "DAG.Sort failed: {}", _0)]
    Graph(GraphError),

    /// No (eligible) definition is registered under a name.
    #[display(fmt = "definition not found: {}", name)]
    DefinitionNotFound {
        /// The name that was looked up.
        name: String,
    },

    /// A dependency was missing from the build context while constructing
    /// an object. This indicates a bug, since the dependency chain is
    /// resolved before anything is constructed.
    #[display(fmt = "{} dependencies not found: {}", definition, dependency)]
    DependencyNotFound {
        /// The definition being constructed.
        definition: String,
        /// The dependency that was missing.
        dependency: String,
    },

    /// A factory received or produced a value of the wrong type.
    #[display(fmt = "factory {} received or produced an instance of the wrong type (expected {})", factory, expected)]
    InvalidInstance {
        /// The factory that was invoked.
        factory: String,
        /// The type that was expected.
        expected: String,
    },

    /// A lifecycle operation failed.
    #[display(fmt = "{}", _0)]
    Lifecycle(LifecycleError),

    /// The object has already been destroyed.
    #[display(fmt = "object has already been destroyed")]
    AlreadyDestroyed,

    /// The plugin layer rejected an operation.
    #[display(fmt = "{}", _0)]
    Plugin(PluginError),

    /// An unexpected error has occurred. This is usually caused by a bug in
    /// the library itself.
    #[display(fmt = "an unexpected error occurred (please report this): {}", _0)]
    InternalError(#[error(ignore)] String),
}

impl From<ParseError> for InjectError {
    fn from(error: ParseError) -> Self {
        InjectError::Parse(error)
    }
}

impl From<GraphError> for InjectError {
    fn from(error: GraphError) -> Self {
        InjectError::Graph(error)
    }
}

impl From<LifecycleError> for InjectError {
    fn from(error: LifecycleError) -> Self {
        InjectError::Lifecycle(error)
    }
}

impl From<PluginError> for InjectError {
    fn from(error: PluginError) -> Self {
        InjectError::Plugin(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain;
    struct Generic<T>(T);
    trait Marker: Send + Sync {}

    #[test]
    fn kinds_are_classified_from_type_names() {
        assert_eq!(TypeKind::Struct, TypeInfo::of::<Plain>().kind());
        assert_eq!(TypeKind::Struct, TypeInfo::of::<Generic<i32>>().kind());
        assert_eq!(TypeKind::Interface, TypeInfo::of::<dyn Marker>().kind());
        assert_eq!(TypeKind::Primitive, TypeInfo::of::<i32>().kind());
        assert_eq!(TypeKind::Primitive, TypeInfo::of::<String>().kind());
        assert_eq!(TypeKind::Unit, TypeInfo::of::<()>().kind());
        assert_eq!(TypeKind::Tuple, TypeInfo::of::<(Plain, Plain)>().kind());
        assert_eq!(TypeKind::Other, TypeInfo::of::<&'static Plain>().kind());
        assert_eq!(TypeKind::Other, TypeInfo::of::<[u8; 4]>().kind());
    }

    #[test]
    fn structs_and_interfaces_have_canonical_names() {
        let name = TypeInfo::of::<Plain>().canonical_name();
        assert!(name.ends_with("::tests::*Plain"), "{}", name);

        let name = TypeInfo::of::<Generic<Plain>>().canonical_name();
        assert!(name.contains("::tests::*Generic<"), "{}", name);

        let name = TypeInfo::of::<dyn Marker>().canonical_name();
        assert!(name.ends_with("::tests::Marker"), "{}", name);
        assert!(!name.starts_with("dyn"), "{}", name);
    }

    #[test]
    fn errors_render_their_cause() {
        let error = InjectError::DefinitionNotFound {
            name: "a::*B".to_owned(),
        };
        assert_eq!("definition not found: a::*B", error.to_string());
    }
}
