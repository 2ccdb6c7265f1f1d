use crate::{Definition, Scope, Tag};
use std::{
    fmt::{Debug, Formatter},
    sync::Arc,
};

/// A predicate over definitions. Filters are combined with a logical AND,
/// and the [`pass`](DefinitionFilter::pass) filter is ignored.
#[derive(Clone, Default)]
pub struct DefinitionFilter(Option<Arc<dyn Fn(&Definition) -> bool + Send + Sync>>);

impl DefinitionFilter {
    /// Creates a filter from a predicate.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Definition) -> bool + Send + Sync + 'static,
    {
        DefinitionFilter(Some(Arc::new(predicate)))
    }

    /// A filter that matches everything.
    #[must_use]
    pub fn pass() -> Self {
        DefinitionFilter(None)
    }

    /// Matches definitions with the given scope.
    #[must_use]
    pub fn scope(scope: Scope) -> Self {
        DefinitionFilter::new(move |definition| definition.scope() == scope)
    }

    /// Matches definitions carrying at least one of the given tags. An empty
    /// list of tags matches nothing.
    pub fn tags<I>(tags: I) -> Self
    where
        I: IntoIterator<Item = Tag>,
    {
        let tags: Vec<Tag> = tags.into_iter().collect();
        DefinitionFilter::new(move |definition| {
            tags.iter().any(|tag| definition.has_tag(tag))
        })
    }

    /// Matches definitions carrying the given tag.
    #[must_use]
    pub fn tag(tag: Tag) -> Self {
        DefinitionFilter::tags([tag])
    }

    /// Whether the definition passes this filter.
    #[must_use]
    pub fn matches(&self, definition: &Definition) -> bool {
        self.0.as_ref().map_or(true, |predicate| predicate(definition))
    }
}

impl Debug for DefinitionFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(_) => f.write_str("DefinitionFilter(..)"),
            None => f.write_str("DefinitionFilter::pass"),
        }
    }
}

/// Whether the definition passes every filter.
pub(crate) fn matches_all(definition: &Definition, filters: &[DefinitionFilter]) -> bool {
    filters.iter().all(|filter| filter.matches(definition))
}
