use crate::{
    Context, Dag, Definition, DefinitionFilter, DefinitionRegistry, FactoryId,
    FirstRealization, DEFAULT_STARTUP_TIMEOUT, InjectError, InjectResult, Interface, Object, Property,
    RawFactory, RealizationSelector, Scope, ServiceFactory, Svc, TAG_AUTOWIRED,
};
use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Duration,
};
use tracing::{debug, error, info};

/// Builds objects from the definitions in a [`DefinitionRegistry`] and owns
/// the singleton objects.
///
/// Dependencies are resolved by name among the autowired definitions (see
/// [`TAG_AUTOWIRED`]). When a name has several candidates, the
/// [`RealizationSelector`] picks one.
///
/// Factories are invoked while the factory holds its build lock, so a
/// factory must not look up objects from the same container.
/// [`Initializable`](crate::Initializable) hooks run after the lock is
/// released and may look up other objects.
pub struct ObjectFactory {
    registry: DefinitionRegistry,
    singletons: RwLock<IndexMap<FactoryId, Object>>,
    selector: RwLock<Arc<dyn RealizationSelector>>,
    build_lock: Mutex<()>,
    init: OnceCell<InjectResult<()>>,
}

impl Default for ObjectFactory {
    fn default() -> Self {
        ObjectFactory::with_registry(DefinitionRegistry::new())
    }
}

impl ObjectFactory {
    /// Creates a factory with an empty registry.
    #[must_use]
    pub fn new() -> Self {
        ObjectFactory::default()
    }

    /// Creates a factory over an existing registry.
    #[must_use]
    pub fn with_registry(registry: DefinitionRegistry) -> Self {
        ObjectFactory {
            registry,
            singletons: RwLock::new(IndexMap::new()),
            selector: RwLock::new(Arc::new(FirstRealization)),
            build_lock: Mutex::new(()),
            init: OnceCell::new(),
        }
    }

    /// The registry holding the definitions.
    #[must_use]
    pub fn registry(&self) -> &DefinitionRegistry {
        &self.registry
    }

    /// Registers a function as a factory.
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
        self.registry.register_factory(factory, property, unique)
    }

    /// Registers a factory in its uniform shape.
    pub fn register_raw(
        &self,
        factory: RawFactory,
        property: &Property,
        unique: bool,
    ) -> InjectResult<Arc<Definition>> {
        self.registry.register_raw(factory, property, unique)
    }

    /// Replaces the realization selector.
    pub fn set_realization_selector<S>(&self, selector: S)
    where
        S: RealizationSelector + 'static,
    {
        *self.selector.write() = Arc::new(selector);
    }

    /// Locks the registry, validates it, and builds every singleton.
    /// Singletons are initialized right away unless their definition
    /// defers it.
    ///
    /// This runs once. Concurrent callers wait for the first call, and
    /// every caller observes its result.
    pub fn init(&self) -> InjectResult<()> {
        self.init.get_or_init(|| self.materialize()).clone()
    }

    /// Whether [`init`](ObjectFactory::init) has completed.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.init.get().is_some()
    }

    fn materialize(&self) -> InjectResult<()> {
        self.registry.init()?;

        let context = Context::new();
        for definition in self.definitions(&[DefinitionFilter::scope(Scope::Singleton)]) {
            let object = match self.singleton(&definition) {
                Some(object) => object,
                None => self.build(&context, &definition)?,
            };
            info!(name = %definition.name(), factory = %definition.id(), "singleton created");
            if !definition.lazy_init() && !object.initialized() {
                object.init()?;
            }
        }

        Ok(())
    }

    /// Gets every definition passing all filters. See
    /// [`DefinitionRegistry::definitions`].
    #[must_use]
    pub fn definitions(&self, filters: &[DefinitionFilter]) -> Vec<Arc<Definition>> {
        self.registry.definitions(filters)
    }

    /// Gets the object for a definition, building it if needed. The object
    /// is initialized before it is returned.
    pub fn get_object(&self, context: &Context, definition: &Arc<Definition>) -> InjectResult<Object> {
        let object = match self.singleton(definition) {
            Some(object) => object,
            None => self.build(context, definition)?,
        };
        if !object.initialized() {
            object.init()?;
        }

        Ok(object)
    }

    /// Gets one object per definition registered under `name` that passes
    /// the filters of the context. Finding no definition is not an error.
    pub fn get_objects_by_name(&self, context: &Context, name: &str) -> InjectResult<Vec<Object>> {
        self.registry
            .definitions_by_name(name, context.filters())
            .iter()
            .map(|definition| self.get_object(context, definition))
            .collect()
    }

    /// Gets one object per definition producing `I` that passes the filters
    /// of the context.
    pub fn get_objects<I: ?Sized + Interface>(&self, context: &Context) -> InjectResult<Vec<Object>> {
        self.get_objects_by_name(context, &I::info().canonical_name())
    }

    /// Gets an instance of `I`. If several definitions produce `I`, the
    /// realization selector picks one.
    pub fn get<I: ?Sized + Interface>(&self, context: &Context) -> InjectResult<Svc<I>> {
        let name = I::info().canonical_name();
        let candidates = self.registry.definitions_by_name(&name, context.filters());
        let definition = self.select(&name, &candidates)?;
        self.get_object(context, &definition)?.get::<I>()
    }

    /// The singletons built so far, in creation order.
    #[must_use]
    pub fn singletons(&self) -> Vec<Object> {
        self.singletons.read().values().cloned().collect()
    }

    /// Destroys every singleton, dependents before their dependencies.
    /// Failures are logged and do not stop the sweep.
    pub fn destroy(&self) {
        self.destroy_within(DEFAULT_STARTUP_TIMEOUT);
    }

    /// Destroys every singleton like [`destroy`](ObjectFactory::destroy).
    /// A singleton still busy with another lifecycle call after `wait` is
    /// skipped and left alive.
    pub fn destroy_within(&self, wait: Duration) {
        let singletons: Vec<Object> = self
            .singletons
            .write()
            .drain(..)
            .map(|(_, object)| object)
            .collect();

        for object in singletons.into_iter().rev() {
            let name = object.id();
            match object.try_destroy(wait) {
                Ok(()) => debug!(%name, "singleton destroyed"),
                Err(error) => error!(%name, %error, "failed to destroy singleton"),
            }
        }
    }

    fn singleton(&self, definition: &Definition) -> Option<Object> {
        if !definition.is_singleton() {
            return None;
        }

        self.singletons.read().get(definition.id()).cloned()
    }

    fn select(&self, name: &str, candidates: &[Arc<Definition>]) -> InjectResult<Arc<Definition>> {
        let not_found = || InjectError::DefinitionNotFound {
            name: name.to_owned(),
        };
        if candidates.is_empty() {
            return Err(not_found());
        }

        let selector = self.selector.read().clone();
        selector.select(name, candidates).ok_or_else(not_found)
    }

    /// Resolves every definition the given one transitively depends on and
    /// orders them so that dependencies come first. The given definition
    /// comes last. Names seeded in the context are not resolved.
    fn dependency_chain(
        &self,
        context: &Context,
        definition: &Arc<Definition>,
    ) -> InjectResult<Vec<Arc<Definition>>> {
        let autowired = [DefinitionFilter::tag(TAG_AUTOWIRED)];
        let mut dag = Dag::new();
        let mut resolved = HashMap::new();
        dag.add_node(definition.name(), definition.depends_on());
        resolved.insert(definition.name().to_owned(), definition.clone());

        let mut queue: VecDeque<String> = definition.depends_on().iter().cloned().collect();
        while let Some(name) = queue.pop_front() {
            if resolved.contains_key(&name) || context.objects().contains_key(&name) {
                continue;
            }

            let candidates = self.registry.definitions_by_name(&name, &autowired);
            let dependency = self.select(&name, &candidates)?;
            dag.add_node(name.as_str(), dependency.depends_on());
            queue.extend(dependency.depends_on().iter().cloned());
            resolved.insert(name, dependency);
        }

        Ok(dag
            .sort()?
            .into_iter()
            .filter_map(|name| resolved.remove(&name))
            .collect())
    }

    /// Builds an object and any dependency that is not built yet.
    /// Dependencies are initialized as soon as they are built, but the
    /// requested object is not.
    fn build(&self, context: &Context, definition: &Arc<Definition>) -> InjectResult<Object> {
        let chain = self.dependency_chain(context, definition)?;

        let mut cache: HashMap<String, Object> = context.objects().clone();
        let mut root = None;
        for node in chain {
            let object = self.create(&node, &cache)?;
            if Arc::ptr_eq(&node, definition) {
                root = Some(object);
            } else {
                if !object.initialized() {
                    object.init()?;
                }
                cache.insert(node.name().to_owned(), object);
            }
        }

        root.ok_or_else(|| {
            InjectError::InternalError(format!("{definition} is missing from its dependency chain"))
        })
    }

    /// Instantiates a definition under the build lock. A singleton created
    /// meanwhile by another build is returned instead.
    fn create(&self, definition: &Arc<Definition>, cache: &HashMap<String, Object>) -> InjectResult<Object> {
        let _guard = self.build_lock.lock();
        if let Some(object) = self.singleton(definition) {
            return Ok(object);
        }

        let object = self.instantiate(definition, cache)?;
        if definition.is_singleton() {
            self.singletons
                .write()
                .insert(definition.id().clone(), object.clone());
        }
        Ok(object)
    }

    /// Invokes the factory of a definition with dependencies taken from the
    /// build cache.
    fn instantiate(&self, definition: &Arc<Definition>, cache: &HashMap<String, Object>) -> InjectResult<Object> {
        let args = definition
            .depends_on()
            .iter()
            .map(|dependency| {
                cache
                    .get(dependency)
                    .and_then(Object::instance)
                    .ok_or_else(|| InjectError::DependencyNotFound {
                        definition: definition.to_string(),
                        dependency: dependency.clone(),
                    })
            })
            .collect::<InjectResult<Vec<_>>>()?;

        let instance = definition.factory().call(&args)?;
        debug!(name = %definition.name(), scope = %definition.scope(), "object created");
        Ok(Object::new(definition.clone(), instance))
    }
}
