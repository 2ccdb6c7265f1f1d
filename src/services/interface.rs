use crate::{DynSvc, Methods, Service, Svc, TypeInfo};

/// Indicates that a type can be requested as a dependency. Dependencies are
/// always requested as [`Svc<Self>`]. Sized types resolve to themselves, and
/// trait objects (`dyn Trait`) resolve to whatever implementation was
/// produced by the selected factory.
///
/// This trait should usually be implemented by the [`component!`] and
/// [`interface!`] macros.
///
/// [`component!`]: crate::component
/// [`interface!`]: crate::interface
pub trait Interface: Service {
    /// Type information about this interface. Its canonical name is the name
    /// definitions are registered and resolved under.
    fn info() -> TypeInfo;

    /// Attempts to view a constructed instance as this interface. Returns
    /// `None` if the instance was produced for a different type.
    fn downcast(instance: DynSvc) -> Option<Svc<Self>>;
}

/// Indicates that a type can be returned by a factory. A component knows
/// how to store itself inside the container, which interface it is
/// registered as, and which lifecycle capabilities it has.
///
/// This trait should usually be implemented by the [`component!`] and
/// [`interface!`] macros.
///
/// [`component!`]: crate::component
/// [`interface!`]: crate::interface
pub trait Component: Sized + 'static {
    /// The declared type produced by factories returning this component.
    type Interface: ?Sized + Interface;

    /// Converts this value into a type-erased instance.
    fn into_instance(self) -> DynSvc;

    /// The lifecycle capabilities of this component. This is resolved once
    /// when a factory is registered.
    fn methods() -> Methods;
}

/// Marks a struct as a component that can be produced by factories and
/// injected into other factories as `Svc<Type>`. The lifecycle capabilities
/// the type implements are listed after a colon, chosen from
/// `Initializable`, `Destroyable` and `Lifecycle`.
///
/// # Example
///
/// ```
/// use runtime_container::{component, BoxError, Initializable};
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// #[derive(Default)]
/// struct Cache {
///     warm: AtomicBool,
/// }
///
/// impl Initializable for Cache {
///     fn init(&self) -> Result<(), BoxError> {
///         self.warm.store(true, Ordering::SeqCst);
///         Ok(())
///     }
/// }
///
/// struct Clock;
///
/// component!(Cache: Initializable);
/// component!(Clock);
/// ```
#[macro_export]
macro_rules! component {
    ($type:ty $(: $($capability:ident),+ $(,)?)?) => {
        impl $crate::Interface for $type {
            fn info() -> $crate::TypeInfo {
                $crate::TypeInfo::of::<$type>()
            }

            fn downcast(
                instance: $crate::DynSvc,
            ) -> ::std::option::Option<$crate::Svc<Self>> {
                instance.downcast::<$type>().ok()
            }
        }

        impl $crate::Component for $type {
            type Interface = $type;

            fn into_instance(self) -> $crate::DynSvc {
                $crate::Svc::new(self)
            }

            fn methods() -> $crate::Methods {
                $crate::__capabilities!(
                    $type;
                    $crate::Methods::none();
                    $($($capability),+)?
                )
            }
        }
    };
}

/// Marks a trait as an interface. Factories produce it by returning
/// `Box<dyn Trait>`, and it is injected into other factories as
/// `Svc<dyn Trait>`. The trait must be `Send + Sync`, and must have the
/// listed lifecycle capabilities as supertraits.
///
/// # Example
///
/// ```
/// use runtime_container::{interface, Lifecycle};
///
/// trait Server: Lifecycle + Send + Sync {
///     fn port(&self) -> u16;
/// }
///
/// interface!(Server: Lifecycle);
/// ```
#[macro_export]
macro_rules! interface {
    ($trait:ident $(: $($capability:ident),+ $(,)?)?) => {
        impl $crate::Interface for dyn $trait {
            fn info() -> $crate::TypeInfo {
                $crate::TypeInfo::of::<dyn $trait>()
            }

            fn downcast(
                instance: $crate::DynSvc,
            ) -> ::std::option::Option<$crate::Svc<Self>> {
                instance
                    .downcast::<$crate::Svc<dyn $trait>>()
                    .ok()
                    .map(|service| $crate::Svc::clone(&*service))
            }
        }

        impl $crate::Component for ::std::boxed::Box<dyn $trait> {
            type Interface = dyn $trait;

            fn into_instance(self) -> $crate::DynSvc {
                let service: $crate::Svc<dyn $trait> = $crate::Svc::from(self);
                $crate::Svc::new(service)
            }

            fn methods() -> $crate::Methods {
                $crate::__capabilities!(
                    dyn $trait;
                    $crate::Methods::none();
                    $($($capability),+)?
                )
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __capabilities {
    ($type:ty; $methods:expr;) => {
        $methods
    };
    ($type:ty; $methods:expr; Initializable $(, $rest:ident)*) => {
        $crate::__capabilities!($type; $methods.initializable::<$type>(); $($rest),*)
    };
    ($type:ty; $methods:expr; Destroyable $(, $rest:ident)*) => {
        $crate::__capabilities!($type; $methods.destroyable::<$type>(); $($rest),*)
    };
    ($type:ty; $methods:expr; Lifecycle $(, $rest:ident)*) => {
        $crate::__capabilities!($type; $methods.lifecycle::<$type>(); $($rest),*)
    };
}
