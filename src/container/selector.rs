use crate::Definition;
use std::sync::Arc;

/// Chooses one definition when a dependency has several realizations, that
/// is, several autowired definitions producing the same type.
///
/// Closures taking the dependency name and the candidates are selectors
/// too.
pub trait RealizationSelector: Send + Sync {
    /// Picks one of the candidates. `candidates` is never empty and is in
    /// registration order. Returning `None` fails the lookup.
    fn select(&self, name: &str, candidates: &[Arc<Definition>]) -> Option<Arc<Definition>>;
}

impl<F> RealizationSelector for F
where
    F: Fn(&str, &[Arc<Definition>]) -> Option<Arc<Definition>> + Send + Sync,
{
    fn select(&self, name: &str, candidates: &[Arc<Definition>]) -> Option<Arc<Definition>> {
        self(name, candidates)
    }
}

/// Picks the first registered realization. This is the default.
#[derive(Clone, Copy, Debug, Default)]
pub struct FirstRealization;

impl RealizationSelector for FirstRealization {
    fn select(&self, _name: &str, candidates: &[Arc<Definition>]) -> Option<Arc<Definition>> {
        candidates.first().cloned()
    }
}

/// Picks the last registered realization.
#[derive(Clone, Copy, Debug, Default)]
pub struct LastRealization;

impl RealizationSelector for LastRealization {
    fn select(&self, _name: &str, candidates: &[Arc<Definition>]) -> Option<Arc<Definition>> {
        candidates.last().cloned()
    }
}
