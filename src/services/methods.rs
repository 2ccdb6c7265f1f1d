use crate::{BoxError, DynSvc, Interface};
use std::fmt::{Debug, Formatter};

/// A component that sets up its initial state after construction.
pub trait Initializable {
    /// Initializes the component. Called at most once per object, after
    /// all of its dependencies have been initialized.
    fn init(&self) -> Result<(), BoxError>;
}

/// A component that releases resources when the container tears it down.
pub trait Destroyable {
    /// Releases any resources held by the component.
    fn destroy(&self) -> Result<(), BoxError>;
}

/// A component with a running phase. Singletons with this capability and
/// `auto_startup` set are started by the container in dependency order and
/// stopped in reverse order.
pub trait Lifecycle {
    /// Starts the component.
    fn start(&self) -> Result<(), BoxError>;

    /// Stops the component.
    fn stop(&self) -> Result<(), BoxError>;

    /// Whether the component is currently running.
    fn running(&self) -> bool;
}

/// A lifecycle method the container may call on an object.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, derive_more::Display)]
pub enum Method {
    /// [`Initializable::init`]
    #[display(fmt = "Init")]
    Init,
    /// [`Destroyable::destroy`]
    #[display(fmt = "Destroy")]
    Destroy,
    /// [`Lifecycle::start`]
    #[display(fmt = "Start")]
    Start,
    /// [`Lifecycle::stop`]
    #[display(fmt = "Stop")]
    Stop,
    /// [`Lifecycle::running`]
    #[display(fmt = "Running")]
    Running,
}

/// Why calling a method through a [`Methods`] table failed.
#[derive(Debug)]
pub(crate) enum CallError {
    /// The table has no entry for the method.
    Missing,
    /// The instance is not of the type the table was built for.
    WrongType,
    /// The method itself returned an error.
    Failed(BoxError),
}

type Hook = fn(&DynSvc) -> Result<(), CallError>;
type Probe = fn(&DynSvc) -> Result<bool, CallError>;

/// The lifecycle capabilities of a component, resolved once when its
/// factory is registered. Each entry is a function that calls the matching
/// method on a type-erased instance.
#[derive(Clone, Copy, Default)]
pub struct Methods {
    init: Option<Hook>,
    destroy: Option<Hook>,
    start: Option<Hook>,
    stop: Option<Hook>,
    running: Option<Probe>,
}

impl Methods {
    /// A table with no capabilities.
    #[must_use]
    pub fn none() -> Self {
        Methods::default()
    }

    /// Adds the [`Initializable`] capability of `I`.
    #[must_use]
    pub fn initializable<I>(mut self) -> Self
    where
        I: ?Sized + Interface + Initializable,
    {
        self.init = Some(|instance| {
            let service = I::downcast(instance.clone()).ok_or(CallError::WrongType)?;
            service.init().map_err(CallError::Failed)
        });
        self
    }

    /// Adds the [`Destroyable`] capability of `I`.
    #[must_use]
    pub fn destroyable<I>(mut self) -> Self
    where
        I: ?Sized + Interface + Destroyable,
    {
        self.destroy = Some(|instance| {
            let service = I::downcast(instance.clone()).ok_or(CallError::WrongType)?;
            service.destroy().map_err(CallError::Failed)
        });
        self
    }

    /// Adds the [`Lifecycle`] capability of `I`.
    #[must_use]
    pub fn lifecycle<I>(mut self) -> Self
    where
        I: ?Sized + Interface + Lifecycle,
    {
        self.start = Some(|instance| {
            let service = I::downcast(instance.clone()).ok_or(CallError::WrongType)?;
            service.start().map_err(CallError::Failed)
        });
        self.stop = Some(|instance| {
            let service = I::downcast(instance.clone()).ok_or(CallError::WrongType)?;
            service.stop().map_err(CallError::Failed)
        });
        self.running = Some(|instance| {
            let service = I::downcast(instance.clone()).ok_or(CallError::WrongType)?;
            Ok(service.running())
        });
        self
    }

    /// Whether the component has the given method.
    #[must_use]
    pub fn has(&self, method: Method) -> bool {
        match method {
            Method::Init => self.init.is_some(),
            Method::Destroy => self.destroy.is_some(),
            Method::Start => self.start.is_some(),
            Method::Stop => self.stop.is_some(),
            Method::Running => self.running.is_some(),
        }
    }

    /// Whether the component has the full [`Lifecycle`] capability set.
    #[must_use]
    pub fn is_lifecycle(&self) -> bool {
        self.has(Method::Start) && self.has(Method::Stop) && self.has(Method::Running)
    }

    pub(crate) fn call(&self, method: Method, instance: &DynSvc) -> Result<(), CallError> {
        let hook = match method {
            Method::Init => self.init,
            Method::Destroy => self.destroy,
            Method::Start => self.start,
            Method::Stop => self.stop,
            Method::Running => {
                return self.call_running(instance).map(drop);
            }
        };
        hook.ok_or(CallError::Missing)?(instance)
    }

    pub(crate) fn call_running(&self, instance: &DynSvc) -> Result<bool, CallError> {
        self.running.ok_or(CallError::Missing)?(instance)
    }
}

impl Debug for Methods {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Methods")
            .field("init", &self.init.is_some())
            .field("destroy", &self.destroy.is_some())
            .field("start", &self.start.is_some())
            .field("stop", &self.stop.is_some())
            .field("running", &self.running.is_some())
            .finish()
    }
}
