use crate::{
    Component, DynSvc, InjectError, InjectResult, Methods, ServiceFactory,
    TypeInfo,
};
use std::{
    any::{type_name, TypeId},
    fmt::{Debug, Display, Formatter},
    mem::size_of,
    panic::Location,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(0);

/// The type-erased body of a factory. It receives the constructed
/// dependencies in declaration order and produces the new instance.
pub type FactoryFn =
    Arc<dyn Fn(&[DynSvc]) -> InjectResult<DynSvc> + Send + Sync>;

/// The identity of a factory. No two definitions may share a factory
/// identity, even if they produce the same type.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum FactoryId {
    /// A function item or closure. Each has its own type, so its
    /// [`TypeId`] identifies it.
    Typed {
        /// The type of the function.
        id: TypeId,
        /// The name of the function type.
        name: &'static str,
    },
    /// A function pointer or a capturing closure. Values of these types do
    /// not share an identity with each other, so each one gets its own.
    Instance {
        /// The sequence number of the factory.
        id: u64,
        /// The name of the function type.
        name: &'static str,
    },
    /// A factory assembled by hand under a caller-chosen name.
    Named(String),
}

impl FactoryId {
    /// The identity of the factory function type `F`.
    #[must_use]
    pub fn of<F: 'static>() -> Self {
        FactoryId::Typed {
            id: TypeId::of::<F>(),
            name: type_name::<F>(),
        }
    }

    /// The identity of one factory value of type `F`. Zero-sized function
    /// types (function items and closures that capture nothing) are
    /// identified by their type, and every other value gets a fresh
    /// identity.
    #[must_use]
    pub fn of_value<F: 'static>(_factory: &F) -> Self {
        if size_of::<F>() == 0 {
            return FactoryId::of::<F>();
        }

        FactoryId::Instance {
            id: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            name: type_name::<F>(),
        }
    }

    /// The printable name of the factory.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            FactoryId::Typed { name, .. } | FactoryId::Instance { name, .. } => name,
            FactoryId::Named(name) => name,
        }
    }
}

impl Display for FactoryId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A factory in its uniform shape: an identity, ordered input types,
/// output types and an optional body. This is what the definition parser
/// inspects.
///
/// Factories are usually created from functions with
/// [`RawFactory::from_fn`]. Hand-built factories can describe signatures
/// that typed functions cannot, and are validated when parsed.
#[derive(Clone)]
pub struct RawFactory {
    id: FactoryId,
    location: &'static Location<'static>,
    inputs: Vec<TypeInfo>,
    outputs: Vec<TypeInfo>,
    methods: Methods,
    body: Option<FactoryFn>,
}

impl RawFactory {
    /// Creates a factory from a function. The caller's location is
    /// recorded as the factory's source location.
    #[track_caller]
    pub fn from_fn<D, F>(factory: F) -> Self
    where
        F: ServiceFactory<D>,
    {
        let id = FactoryId::of_value(&factory);
        let body: FactoryFn = Arc::new(move |dependencies: &[DynSvc]| {
            factory.invoke(dependencies).map(Component::into_instance)
        });
        RawFactory {
            id,
            location: Location::caller(),
            inputs: F::dependencies(),
            outputs: vec![TypeInfo::of::<
                <F::Result as Component>::Interface,
            >()],
            methods: <F::Result as Component>::methods(),
            body: Some(body),
        }
    }

    /// Starts assembling a factory by hand.
    #[track_caller]
    pub fn builder(name: impl Into<String>) -> RawFactoryBuilder {
        RawFactoryBuilder {
            factory: RawFactory {
                id: FactoryId::Named(name.into()),
                location: Location::caller(),
                inputs: Vec::new(),
                outputs: Vec::new(),
                methods: Methods::none(),
                body: None,
            },
        }
    }

    /// The identity of the factory.
    #[must_use]
    pub fn id(&self) -> &FactoryId {
        &self.id
    }

    /// Where the factory was registered.
    #[must_use]
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// The types of the factory's parameters, in order.
    #[must_use]
    pub fn inputs(&self) -> &[TypeInfo] {
        &self.inputs
    }

    /// The types the factory returns.
    #[must_use]
    pub fn outputs(&self) -> &[TypeInfo] {
        &self.outputs
    }

    /// The lifecycle capabilities of the produced type.
    #[must_use]
    pub fn methods(&self) -> Methods {
        self.methods
    }

    pub(crate) fn body(&self) -> Option<&FactoryFn> {
        self.body.as_ref()
    }
}

impl Debug for RawFactory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawFactory")
            .field("id", &self.id)
            .field("location", &self.location)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("methods", &self.methods)
            .field("callable", &self.body.is_some())
            .finish()
    }
}

/// Assembles a [`RawFactory`] by hand.
pub struct RawFactoryBuilder {
    factory: RawFactory,
}

impl RawFactoryBuilder {
    /// Appends a parameter type.
    #[must_use]
    pub fn input(mut self, info: TypeInfo) -> Self {
        self.factory.inputs.push(info);
        self
    }

    /// Appends a return type.
    #[must_use]
    pub fn output(mut self, info: TypeInfo) -> Self {
        self.factory.outputs.push(info);
        self
    }

    /// Sets the lifecycle capabilities of the produced type.
    #[must_use]
    pub fn methods(mut self, methods: Methods) -> Self {
        self.factory.methods = methods;
        self
    }

    /// Sets the body of the factory.
    #[must_use]
    pub fn body<F>(mut self, body: F) -> Self
    where
        F: Fn(&[DynSvc]) -> InjectResult<DynSvc> + Send + Sync + 'static,
    {
        self.factory.body = Some(Arc::new(body));
        self
    }

    /// Finishes the factory.
    #[must_use]
    pub fn build(self) -> RawFactory {
        self.factory
    }
}

/// The callable part of a definition: the factory body together with its
/// identity, argument count and source location.
#[derive(Clone)]
pub struct Factory {
    id: FactoryId,
    location: &'static Location<'static>,
    argn: usize,
    body: FactoryFn,
}

impl Factory {
    pub(crate) fn new(
        id: FactoryId,
        location: &'static Location<'static>,
        argn: usize,
        body: FactoryFn,
    ) -> Self {
        Factory {
            id,
            location,
            argn,
            body,
        }
    }

    /// The identity of the factory.
    #[must_use]
    pub fn id(&self) -> &FactoryId {
        &self.id
    }

    /// The printable name of the factory.
    #[must_use]
    pub fn name(&self) -> &str {
        self.id.name()
    }

    /// The source file the factory was registered from.
    #[must_use]
    pub fn file(&self) -> &'static str {
        self.location.file()
    }

    /// The source line the factory was registered from.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.location.line()
    }

    /// The number of parameters of the factory.
    #[must_use]
    pub fn argn(&self) -> usize {
        self.argn
    }

    /// Invokes the factory with its dependencies.
    pub fn call(&self, args: &[DynSvc]) -> InjectResult<DynSvc> {
        if args.len() != self.argn {
            return Err(InjectError::InternalError(format!(
                "factory {} expects {} arguments but received {}",
                self.id,
                self.argn,
                args.len()
            )));
        }

        (self.body)(args)
    }
}

impl Debug for Factory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Factory")
            .field("id", &self.id)
            .field("file", &self.file())
            .field("line", &self.line())
            .field("argn", &self.argn)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{component, Svc};

    struct Engine;
    struct Car(Svc<Engine>);
    component!(Engine);
    component!(Car);

    #[test]
    fn distinct_functions_have_distinct_ids() {
        let first = RawFactory::from_fn(|| Engine);
        let second = RawFactory::from_fn(|| Engine);
        assert_ne!(first.id(), second.id());

        let car = RawFactory::from_fn(Car);
        assert_eq!(vec![TypeInfo::of::<Engine>()], car.inputs());
        assert_eq!(vec![TypeInfo::of::<Car>()], car.outputs());
    }

    fn engine() -> Engine {
        Engine
    }

    fn spare_engine() -> Engine {
        Engine
    }

    #[test]
    fn function_pointers_have_distinct_ids() {
        let first: fn() -> Engine = engine;
        let second: fn() -> Engine = spare_engine;
        assert_ne!(
            RawFactory::from_fn(first).id(),
            RawFactory::from_fn(second).id()
        );
        assert_ne!(
            RawFactory::from_fn(first).id(),
            RawFactory::from_fn(first).id()
        );

        assert_eq!(
            RawFactory::from_fn(engine).id(),
            RawFactory::from_fn(engine).id()
        );
        assert!(RawFactory::from_fn(first).id().name().starts_with("fn() -> "));
    }

    #[test]
    fn location_points_at_the_caller() {
        let line = line!() + 1;
        let factory = RawFactory::from_fn(|| Engine);
        assert_eq!(file!(), factory.location().file());
        assert_eq!(line, factory.location().line());
    }

    #[test]
    fn hand_built_factories_keep_their_name() {
        let factory = RawFactory::builder("engine")
            .output(TypeInfo::of::<Engine>())
            .body(|_| Ok(Engine.into_instance()))
            .build();
        assert_eq!(&FactoryId::Named("engine".to_owned()), factory.id());
        assert_eq!("engine", factory.id().to_string());
        assert!(factory.body().is_some());
    }
}
