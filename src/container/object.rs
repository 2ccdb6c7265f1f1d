#![allow(clippy::used_underscore_binding)]

use crate::{
    CallError, Definition, DynSvc, InjectError, InjectResult, Interface, Method,
    SharedError, Svc,
};
use derive_more::{Display, Error};
use parking_lot::Mutex;
use std::{
    fmt::{Debug, Display as FmtDisplay, Formatter},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

/// A lifecycle call on an object failed.
#[derive(Debug, Clone, Display, Error)]
pub enum LifecycleError {
    /// The object does not have the requested capability.
    #[display(fmt = "object.{} is not supported by {}", method, name)]
    MissingMethod {
        /// The definition name of the object.
        name: String,
        /// The method that was requested.
        method: Method,
    },

    /// The method returned an error.
    #[display(fmt = "object.{} failed for {}: {}", method, name, source)]
    CallFailed {
        /// The definition name of the object.
        name: String,
        /// The method that failed.
        method: Method,
        /// The error returned by the method.
        source: SharedError,
    },

    /// Start succeeded but the object does not report itself as running.
    #[display(fmt = "{} was started but it wasn't running", name)]
    NotRunning {
        /// The definition name of the object.
        name: String,
    },

    /// The method did not finish in time.
    #[display(fmt = "object.{} for {} timed out after {:?}", method, name, timeout)]
    Timeout {
        /// The definition name of the object.
        name: String,
        /// The method that timed out.
        method: Method,
        /// How long the call was allowed to take.
        timeout: Duration,
    },

    /// The call was cancelled before it finished.
    #[display(fmt = "object.{} for {} was cancelled", method, name)]
    Cancelled {
        /// The definition name of the object.
        name: String,
        /// The method that was cancelled.
        method: Method,
    },

    /// The method panicked.
    #[display(fmt = "object.{} panicked for {}: {}", method, name, message)]
    Panicked {
        /// The definition name of the object.
        name: String,
        /// The method that panicked.
        method: Method,
        /// The panic message.
        message: String,
    },
}

struct ObjectState {
    definition: Option<Arc<Definition>>,
    instance: Option<DynSvc>,
}

struct ObjectInner {
    name: String,
    initialized: AtomicBool,
    destroyed: AtomicBool,
    state: Mutex<ObjectState>,
}

/// One constructed instance together with the definition it was built
/// from. Cloning an object is cheap and yields a handle to the same
/// instance.
///
/// Lifecycle calls on one object are serialized by a lock owned by that
/// object. [`id`](Object::id), [`alive`](Object::alive) and
/// [`initialized`](Object::initialized) never take that lock. Once
/// [`destroy`](Object::destroy) succeeds, the object releases its instance
/// and every further lifecycle call fails.
#[derive(Clone)]
pub struct Object {
    inner: Arc<ObjectInner>,
}

impl Object {
    pub(crate) fn new(definition: Arc<Definition>, instance: DynSvc) -> Self {
        Object {
            inner: Arc::new(ObjectInner {
                name: definition.name().to_owned(),
                initialized: AtomicBool::new(false),
                destroyed: AtomicBool::new(false),
                state: Mutex::new(ObjectState {
                    definition: Some(definition),
                    instance: Some(instance),
                }),
            }),
        }
    }

    /// The definition name of the object, or an empty string once it has
    /// been destroyed.
    #[must_use]
    pub fn id(&self) -> String {
        if self.alive() {
            self.inner.name.clone()
        } else {
            String::new()
        }
    }

    /// The definition the object was built from.
    #[must_use]
    pub fn definition(&self) -> Option<Arc<Definition>> {
        self.inner.state.lock().definition.clone()
    }

    /// The type-erased instance.
    #[must_use]
    pub fn instance(&self) -> Option<DynSvc> {
        self.inner.state.lock().instance.clone()
    }

    /// The instance as `I`.
    pub fn get<I: ?Sized + Interface>(&self) -> InjectResult<Svc<I>> {
        let state = self.inner.state.lock();
        let (Some(definition), Some(instance)) = (&state.definition, &state.instance) else {
            return Err(InjectError::AlreadyDestroyed);
        };

        I::downcast(instance.clone()).ok_or_else(|| InjectError::InvalidInstance {
            factory: definition.id().to_string(),
            expected: I::info().canonical_name(),
        })
    }

    /// Whether [`init`](Object::init) has completed.
    #[must_use]
    pub fn initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::Acquire)
    }

    /// Whether the object has not been destroyed yet.
    #[must_use]
    pub fn alive(&self) -> bool {
        !self.inner.destroyed.load(Ordering::Acquire)
    }

    /// Whether two handles refer to the same object.
    #[must_use]
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Initializes the object. Does nothing if the object is already
    /// initialized or is not [`Initializable`](crate::Initializable).
    pub fn init(&self) -> InjectResult<()> {
        let state = self.inner.state.lock();
        let (definition, instance) = Self::parts(&state)?;
        if self.initialized() {
            return Ok(());
        }

        match Self::call(definition, instance, Method::Init) {
            Ok(()) | Err(CallError::Missing) => {}
            Err(error) => return Err(Self::call_error(definition, Method::Init, error)),
        }
        self.inner.initialized.store(true, Ordering::Release);
        Ok(())
    }

    /// Destroys the object and releases its instance. The object stays
    /// alive if its [`Destroyable`](crate::Destroyable) hook fails.
    pub fn destroy(&self) -> InjectResult<()> {
        let mut state = self.inner.state.lock();
        self.destroy_locked(&mut state)
    }

    /// Destroys the object like [`destroy`](Object::destroy), but gives up
    /// if another lifecycle call keeps the object busy for longer than
    /// `wait`.
    pub fn try_destroy(&self, wait: Duration) -> InjectResult<()> {
        let Some(mut state) = self.inner.state.try_lock_for(wait) else {
            return Err(LifecycleError::Timeout {
                name: self.inner.name.clone(),
                method: Method::Destroy,
                timeout: wait,
            }
            .into());
        };
        self.destroy_locked(&mut state)
    }

    fn destroy_locked(&self, state: &mut ObjectState) -> InjectResult<()> {
        let (definition, instance) = Self::parts(state)?;
        match Self::call(definition, instance, Method::Destroy) {
            Ok(()) | Err(CallError::Missing) => {}
            Err(error) => return Err(Self::call_error(definition, Method::Destroy, error)),
        }

        state.definition = None;
        state.instance = None;
        self.inner.destroyed.store(true, Ordering::Release);
        Ok(())
    }

    /// Starts the object. Fails if the object is not
    /// [`Lifecycle`](crate::Lifecycle).
    pub fn start(&self) -> InjectResult<()> {
        let state = self.inner.state.lock();
        let (definition, instance) = Self::parts(&state)?;
        Self::call(definition, instance, Method::Start)
            .map_err(|error| Self::call_error(definition, Method::Start, error))
    }

    /// Stops the object. Fails if the object is not
    /// [`Lifecycle`](crate::Lifecycle).
    pub fn stop(&self) -> InjectResult<()> {
        let state = self.inner.state.lock();
        let (definition, instance) = Self::parts(&state)?;
        Self::call(definition, instance, Method::Stop)
            .map_err(|error| Self::call_error(definition, Method::Stop, error))
    }

    /// Whether the object is running. Reports `false` if the object is
    /// destroyed or is not [`Lifecycle`](crate::Lifecycle).
    #[must_use]
    pub fn running(&self) -> bool {
        let state = self.inner.state.lock();
        match Self::parts(&state) {
            Ok((definition, instance)) => definition
                .methods()
                .call_running(instance)
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    fn parts(state: &ObjectState) -> InjectResult<(&Arc<Definition>, &DynSvc)> {
        match (&state.definition, &state.instance) {
            (Some(definition), Some(instance)) => Ok((definition, instance)),
            _ => Err(InjectError::AlreadyDestroyed),
        }
    }

    fn call(
        definition: &Definition,
        instance: &DynSvc,
        method: Method,
    ) -> Result<(), CallError> {
        definition.methods().call(method, instance)
    }

    fn call_error(definition: &Definition, method: Method, error: CallError) -> InjectError {
        let name = definition.name().to_owned();
        match error {
            CallError::Missing => LifecycleError::MissingMethod { name, method }.into(),
            CallError::WrongType => InjectError::InvalidInstance {
                factory: definition.id().to_string(),
                expected: name,
            },
            CallError::Failed(source) => LifecycleError::CallFailed {
                name,
                method,
                source: Arc::from(source),
            }
            .into(),
        }
    }
}

impl Debug for Object {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Object")
            .field("id", &self.id())
            .field("initialized", &self.initialized())
            .finish_non_exhaustive()
    }
}

impl FmtDisplay for Object {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.definition() {
            Some(definition) => write!(f, "{definition}"),
            None => f.write_str("<destroyed>"),
        }
    }
}
