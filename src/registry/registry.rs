use crate::{
    matches_all, parse_definition, Dag, Definition, DefinitionFilter, FactoryId,
    InjectError, InjectResult, Interface, Property, RawFactory, ServiceFactory,
};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tracing::{debug, error, info};

#[derive(Default)]
struct RegistryState {
    definitions: Vec<Arc<Definition>>,
    by_name: IndexMap<String, Vec<usize>>,
    by_factory: HashMap<FactoryId, usize>,
    sorted: Option<Vec<usize>>,
}

impl RegistryState {
    fn collect<'a, I>(&self, indices: I, filters: &[DefinitionFilter]) -> Vec<Arc<Definition>>
    where
        I: IntoIterator<Item = &'a usize>,
    {
        indices
            .into_iter()
            .map(|&index| &self.definitions[index])
            .filter(|definition| matches_all(definition, filters))
            .cloned()
            .collect()
    }
}

/// Stores definitions and validates their dependency graph.
///
/// The registry accepts registrations until [`init`] is called. After that,
/// it is read-only forever, even if validation failed.
///
/// [`init`]: DefinitionRegistry::init
#[derive(Default)]
pub struct DefinitionRegistry {
    readonly: AtomicBool,
    state: RwLock<RegistryState>,
}

impl DefinitionRegistry {
    /// Creates an empty, writable registry.
    #[must_use]
    pub fn new() -> Self {
        DefinitionRegistry::default()
    }

    /// Parses a function into a definition and registers it. If `unique`
    /// is set, no other definition may produce the same type.
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
        self.register_raw(RawFactory::from_fn(factory), property, unique)
    }

    /// Parses a factory into a definition and registers it. If `unique` is
    /// set, no other definition may produce the same type.
    pub fn register_raw(
        &self,
        factory: RawFactory,
        property: &Property,
        unique: bool,
    ) -> InjectResult<Arc<Definition>> {
        let definition = parse_definition(factory, property)?;
        self.register(definition, unique)
    }

    fn register(
        &self,
        definition: Definition,
        unique: bool,
    ) -> InjectResult<Arc<Definition>> {
        let mut state = self.state.write();
        if self.readonly.load(Ordering::Acquire) {
            return Err(InjectError::Readonly);
        }
        if unique && state.by_name.contains_key(definition.name()) {
            return Err(InjectError::DuplicateName {
                name: definition.name().to_owned(),
            });
        }
        if state.by_factory.contains_key(definition.id()) {
            return Err(InjectError::DuplicateFactory {
                factory: definition.id().to_string(),
            });
        }

        let index = state.definitions.len();
        let definition = Arc::new(definition);
        state.definitions.push(definition.clone());
        state
            .by_name
            .entry(definition.name().to_owned())
            .or_default()
            .push(index);
        state.by_factory.insert(definition.id().clone(), index);
        Ok(definition)
    }

    /// Whether the registry has been locked.
    #[must_use]
    pub fn is_readonly(&self) -> bool {
        self.readonly.load(Ordering::Acquire)
    }

    /// Locks the registry and validates the dependency graph of every
    /// definition. The registry stays locked if validation fails.
    pub fn init(&self) -> InjectResult<()> {
        let mut state = self.state.write();
        if self.readonly.swap(true, Ordering::AcqRel) {
            return Err(InjectError::AlreadyInitialized);
        }

        info!("the definition registry has been locked");
        let sorted = Self::sort_and_check(&state)?;
        state.sorted = Some(sorted);
        Ok(())
    }

    fn sort_and_check(state: &RegistryState) -> InjectResult<Vec<usize>> {
        let mut dag = Dag::new();
        for definition in &state.definitions {
            dag.add_node(definition.name(), definition.depends_on());
        }

        let names = dag.sort()?;
        let mut sorted = Vec::with_capacity(state.definitions.len());
        for name in names {
            let Some(indices) = state.by_name.get(&name) else {
                error!(%name, "validation failed: definition not found");
                return Err(InjectError::DefinitionNotFound { name });
            };

            for &index in indices {
                let definition = &state.definitions[index];
                debug!(
                    name = %definition.name(),
                    factory = %definition.id(),
                    depends_on = definition.depends_on().len(),
                    is_singleton = definition.is_singleton(),
                    desc = %definition.desc(),
                    lazy_init = definition.lazy_init(),
                    auto_startup = definition.auto_startup(),
                    tags = ?definition.tags(),
                    "validation passed"
                );
                sorted.push(index);
            }
        }

        Ok(sorted)
    }

    /// Gets every definition passing all filters. Once the registry has
    /// been initialized, definitions are returned with dependencies before
    /// their dependents. Before that, they are returned in registration
    /// order.
    #[must_use]
    pub fn definitions(&self, filters: &[DefinitionFilter]) -> Vec<Arc<Definition>> {
        let state = self.state.read();
        match &state.sorted {
            Some(sorted) => state.collect(sorted, filters),
            None => state
                .definitions
                .iter()
                .filter(|definition| matches_all(definition, filters))
                .cloned()
                .collect(),
        }
    }

    /// Gets the definitions registered under a name that pass all filters,
    /// in registration order.
    #[must_use]
    pub fn definitions_by_name(
        &self,
        name: &str,
        filters: &[DefinitionFilter],
    ) -> Vec<Arc<Definition>> {
        let state = self.state.read();
        state
            .by_name
            .get(name)
            .map(|indices| state.collect(indices, filters))
            .unwrap_or_default()
    }

    /// Gets the definitions producing `I` that pass all filters, in
    /// registration order.
    #[must_use]
    pub fn definitions_by_type<I: ?Sized + Interface>(
        &self,
        filters: &[DefinitionFilter],
    ) -> Vec<Arc<Definition>> {
        self.definitions_by_name(&I::info().canonical_name(), filters)
    }

    /// Gets the definition registered for a factory.
    #[must_use]
    pub fn definition_by_factory(&self, id: &FactoryId) -> Option<Arc<Definition>> {
        let state = self.state.read();
        state
            .by_factory
            .get(id)
            .map(|&index| state.definitions[index].clone())
    }

    /// The number of registered definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().definitions.len()
    }

    /// Whether no definition has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{component, Scope, Svc, Tag};

    struct Leaf;
    struct Middle(Svc<Leaf>);
    struct Root(Svc<Middle>);
    component!(Leaf);
    component!(Middle);
    component!(Root);

    struct Ping(Svc<Pong>);
    struct Pong(Svc<Ping>);
    component!(Ping);
    component!(Pong);

    fn leaf() -> Leaf {
        Leaf
    }

    #[test]
    fn same_factory_is_rejected_regardless_of_uniqueness() {
        let registry = DefinitionRegistry::new();
        registry.register_factory(leaf, &Property::new(), false).unwrap();

        for unique in [false, true] {
            match registry.register_factory(leaf, &Property::new(), unique) {
                Err(InjectError::DuplicateFactory { .. } | InjectError::DuplicateName { .. }) => {}
                Err(error) => Err(error).unwrap(),
                Ok(_) => unreachable!(),
            }
        }

        match registry.register_factory(leaf, &Property::new(), false) {
            Err(InjectError::DuplicateFactory { factory }) if factory.contains("leaf") => {}
            Err(error) => Err(error).unwrap(),
            Ok(_) => unreachable!(),
        }
        assert_eq!(1, registry.len());
    }

    #[test]
    fn unique_names_are_enforced() {
        let registry = DefinitionRegistry::new();
        registry.register_factory(|| Leaf, &Property::new(), false).unwrap();
        registry.register_factory(|| Leaf, &Property::new(), false).unwrap();

        match registry.register_factory(|| Leaf, &Property::new(), true) {
            Err(InjectError::DuplicateName { name }) if name.ends_with("*Leaf") => {}
            Err(error) => Err(error).unwrap(),
            Ok(_) => unreachable!(),
        }
        assert_eq!(2, registry.definitions_by_type::<Leaf>(&[]).len());
    }

    #[test]
    fn registry_is_readonly_after_init() {
        let registry = DefinitionRegistry::new();
        registry.register_factory(leaf, &Property::new(), false).unwrap();
        registry.init().unwrap();
        assert!(registry.is_readonly());

        match registry.register_factory(|| Leaf, &Property::new(), false) {
            Err(InjectError::Readonly) => {}
            Err(error) => Err(error).unwrap(),
            Ok(_) => unreachable!(),
        }
        match registry.init() {
            Err(InjectError::AlreadyInitialized) => {}
            Err(error) => Err(error).unwrap(),
            Ok(_) => unreachable!(),
        }
    }

    #[test]
    fn init_sorts_definitions_by_dependency() {
        let registry = DefinitionRegistry::new();
        registry.register_factory(Root, &Property::new(), false).unwrap();
        registry.register_factory(Middle, &Property::new(), false).unwrap();
        registry.register_factory(leaf, &Property::new(), false).unwrap();

        let before: Vec<_> = registry.definitions(&[]);
        assert!(before[0].produces::<Root>());

        registry.init().unwrap();
        let after = registry.definitions(&[]);
        assert!(after[0].produces::<Leaf>());
        assert!(after[1].produces::<Middle>());
        assert!(after[2].produces::<Root>());
    }

    #[test]
    fn missing_registrations_fail_init() {
        let registry = DefinitionRegistry::new();
        registry.register_factory(Root, &Property::new(), false).unwrap();

        match registry.init() {
            Err(InjectError::DefinitionNotFound { name }) if name.ends_with("*Middle") => {}
            Err(error) => Err(error).unwrap(),
            Ok(_) => unreachable!(),
        }
        assert!(registry.is_readonly());
    }

    #[test]
    fn cycles_fail_init() {
        let registry = DefinitionRegistry::new();
        registry.register_factory(Ping, &Property::new(), false).unwrap();
        registry.register_factory(Pong, &Property::new(), false).unwrap();

        match registry.init() {
            Err(error @ InjectError::Graph(_)) => {
                assert!(error.to_string().starts_with("DAG.Sort failed"));
            }
            Err(error) => Err(error).unwrap(),
            Ok(_) => unreachable!(),
        }
    }

    #[test]
    fn queries_apply_filters() {
        let registry = DefinitionRegistry::new();
        let prod = registry
            .register_factory(|| Leaf, &Property::new().with_tag(Tag::new("env", "prod")), false)
            .unwrap();
        registry
            .register_factory(
                || Leaf,
                &Property::new()
                    .with_tag(Tag::new("env", "dev"))
                    .with_scope(Scope::Prototype),
                false,
            )
            .unwrap();

        let found = registry.definitions_by_type::<Leaf>(&[DefinitionFilter::tag(Tag::new(
            "env", "prod",
        ))]);
        assert_eq!(1, found.len());
        assert!(Arc::ptr_eq(&prod, &found[0]));

        let found = registry.definitions(&[DefinitionFilter::scope(Scope::Prototype)]);
        assert_eq!(1, found.len());
        assert!(registry.definitions_by_name("missing", &[]).is_empty());
        assert!(registry.definition_by_factory(prod.id()).is_some());
    }
}
