use crate::{DefinitionFilter, Object};
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

/// The context of a lookup or lifecycle call.
///
/// A context carries the definition filters applied to lookups, objects
/// that were already built by the caller (for example request-scoped
/// objects), an optional deadline and optional cancellation signals.
/// Deriving a context with [`with_timeout`] or [`with_cancel`] leaves the
/// parent untouched.
///
/// [`with_timeout`]: Context::with_timeout
/// [`with_cancel`]: Context::with_cancel
#[derive(Clone, Debug, Default)]
pub struct Context {
    filters: Vec<DefinitionFilter>,
    objects: HashMap<String, Object>,
    deadline: Option<Instant>,
    done: Vec<Receiver<()>>,
}

/// Cancels the context it was created with. Dropping the handle cancels the
/// context as well.
#[derive(Debug)]
pub struct CancelHandle {
    _sender: Sender<()>,
}

impl CancelHandle {
    /// Cancels the context.
    pub fn cancel(self) {}
}

impl Context {
    /// Creates an empty context with no deadline.
    #[must_use]
    pub fn new() -> Self {
        Context::default()
    }

    /// Replaces the filters of this context. An empty list leaves the
    /// filters unchanged.
    pub fn set_filter<I>(&mut self, filters: I)
    where
        I: IntoIterator<Item = DefinitionFilter>,
    {
        let filters: Vec<_> = filters.into_iter().collect();
        if !filters.is_empty() {
            self.filters = filters;
        }
    }

    /// Adds a filter to this context.
    #[must_use]
    pub fn with_filter(mut self, filter: DefinitionFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// The filters applied to lookups made with this context.
    #[must_use]
    pub fn filters(&self) -> &[DefinitionFilter] {
        &self.filters
    }

    /// Seeds an already built object. It is used instead of resolving its
    /// definition when it is needed as a dependency.
    pub fn insert_object(&mut self, object: Object) {
        self.objects.insert(object.id(), object);
    }

    /// Seeds an already built object.
    #[must_use]
    pub fn with_object(mut self, object: Object) -> Self {
        self.insert_object(object);
        self
    }

    /// The seeded objects, keyed by definition name.
    #[must_use]
    pub fn objects(&self) -> &HashMap<String, Object> {
        &self.objects
    }

    /// Derives a context whose deadline is at most `timeout` from now.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        let mut child = self.clone();
        child.deadline = Some(match self.deadline {
            Some(parent) => parent.min(deadline),
            None => deadline,
        });
        child
    }

    /// Derives a context that is cancelled when the returned handle is
    /// cancelled or dropped, or when this context is cancelled.
    #[must_use]
    pub fn with_cancel(&self) -> (Self, CancelHandle) {
        let (sender, receiver) = bounded(0);
        let mut child = self.clone();
        child.done.push(receiver);
        (child, CancelHandle { _sender: sender })
    }

    /// The deadline of this context, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The time left until the deadline, if any.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Whether the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.deadline
            .map_or(false, |deadline| deadline <= Instant::now())
    }

    /// Whether this context has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.done
            .iter()
            .any(|done| matches!(done.try_recv(), Err(TryRecvError::Disconnected)))
    }

    /// Channels that disconnect when the context is cancelled.
    pub(crate) fn done(&self) -> &[Receiver<()>] {
        &self.done
    }
}
