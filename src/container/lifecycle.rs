use crate::{
    Context, DefinitionFilter, InjectError, InjectResult, LifecycleError, Method, Object,
    ObjectFactory, Scope, TaskError, TaskGroup,
};
use std::time::Duration;
use tracing::{error, info, warn};

const TASK_GROUP_NAME: &str = "container.lifecycle";

/// Selects the definitions whose objects are started automatically: auto
/// startup singletons with the full [`Lifecycle`](crate::Lifecycle)
/// capability set.
#[must_use]
pub fn service_filter() -> DefinitionFilter {
    DefinitionFilter::new(|definition| {
        definition.methods().is_lifecycle()
            && definition.auto_startup()
            && definition.scope() == Scope::Singleton
    })
}

/// Starts and stops services.
///
/// Services are started in the order their definitions are returned by the
/// registry, which is dependency first, and stopped in reverse. Each start
/// and stop runs on a worker thread and is given at most `timeout`.
#[derive(Debug)]
pub struct LifecycleProcessor {
    started: Vec<Object>,
    tasks: TaskGroup,
    timeout: Duration,
}

impl LifecycleProcessor {
    /// Creates a processor allowing each start and stop up to `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        LifecycleProcessor {
            started: Vec::new(),
            tasks: TaskGroup::new(TASK_GROUP_NAME),
            timeout,
        }
    }

    /// The time each start and stop is allowed to take.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The services started so far, in start order.
    #[must_use]
    pub fn started(&self) -> &[Object] {
        &self.started
    }

    /// Starts every service that is not running yet. Stops at the first
    /// failure, leaving the services started so far running.
    pub fn start(&mut self, context: &Context, factory: &ObjectFactory) -> InjectResult<()> {
        for definition in factory.definitions(&[service_filter()]) {
            let object = factory.get_object(context, &definition)?;
            let name = object.id();
            if object.running() {
                warn!(service = %name, "service has been started");
                continue;
            }

            info!(service = %name, "starting service");
            if let Err(error) = self.call(context, &name, &object, Method::Start) {
                error!(service = %name, %error, "stopped while starting service");
                return Err(error);
            }
            if !object.running() {
                let error = InjectError::from(LifecycleError::NotRunning { name: name.clone() });
                error!(service = %name, %error, "stopped while starting service");
                return Err(error);
            }

            info!(service = %name, "service started successfully");
            self.started.push(object);
        }

        self.tasks.reap();
        Ok(())
    }

    /// Stops the started services in reverse start order. Failures are
    /// logged and the remaining services are still stopped.
    pub fn stop(&mut self, context: &Context) {
        while let Some(object) = self.started.pop() {
            let name = object.id();
            info!(service = %name, "stopping service");
            if !object.running() {
                info!(service = %name, "service wasn't running");
                continue;
            }

            match self.call(context, &name, &object, Method::Stop) {
                Ok(()) => info!(service = %name, "service stopped successfully"),
                Err(error) => error!(service = %name, %error, "service wasn't stopped"),
            }
        }

        self.tasks.reap();
    }

    /// Runs a lifecycle method on a worker thread. A worker that times out
    /// or is cancelled keeps the object locked until it returns, so the
    /// object is not touched again here.
    fn call(
        &self,
        context: &Context,
        name: &str,
        object: &Object,
        method: Method,
    ) -> InjectResult<()> {
        let context = context.with_timeout(self.timeout);
        let worker = object.clone();
        let result = self.tasks.go_and_wait(&context, move || match method {
            Method::Stop => worker.stop(),
            _ => worker.start(),
        });

        let name = name.to_owned();
        match result {
            Ok(result) => result,
            Err(TaskError::Timeout { .. }) => Err(LifecycleError::Timeout {
                name,
                method,
                timeout: self.timeout,
            }
            .into()),
            Err(TaskError::Cancelled { .. }) => {
                Err(LifecycleError::Cancelled { name, method }.into())
            }
            Err(TaskError::Panicked { message, .. }) => Err(LifecycleError::Panicked {
                name,
                method,
                message,
            }
            .into()),
            Err(error @ TaskError::Spawn { .. }) => {
                Err(InjectError::InternalError(error.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{component, BoxError, Lifecycle, Property, Svc};
    use std::{
        sync::atomic::{AtomicBool, Ordering},
        time::Instant,
    };

    #[derive(Default)]
    struct Server {
        running: AtomicBool,
    }
    component!(Server: Lifecycle);

    impl Lifecycle for Server {
        fn start(&self) -> Result<(), BoxError> {
            self.running.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&self) -> Result<(), BoxError> {
            self.running.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }
    }

    struct Liar;
    component!(Liar: Lifecycle);

    impl Lifecycle for Liar {
        fn start(&self) -> Result<(), BoxError> {
            Ok(())
        }

        fn stop(&self) -> Result<(), BoxError> {
            Ok(())
        }

        fn running(&self) -> bool {
            false
        }
    }

    struct Sleeper;
    component!(Sleeper: Lifecycle);

    impl Lifecycle for Sleeper {
        fn start(&self) -> Result<(), BoxError> {
            std::thread::sleep(Duration::from_millis(200));
            Ok(())
        }

        fn stop(&self) -> Result<(), BoxError> {
            Ok(())
        }

        fn running(&self) -> bool {
            false
        }
    }

    struct Stuck;
    component!(Stuck: Lifecycle);

    impl Lifecycle for Stuck {
        fn start(&self) -> Result<(), BoxError> {
            std::thread::sleep(Duration::from_millis(1500));
            Ok(())
        }

        fn stop(&self) -> Result<(), BoxError> {
            Ok(())
        }

        fn running(&self) -> bool {
            false
        }
    }

    struct Grumpy {
        _server: Svc<Server>,
        running: AtomicBool,
    }
    component!(Grumpy: Lifecycle);

    impl Lifecycle for Grumpy {
        fn start(&self) -> Result<(), BoxError> {
            self.running.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&self) -> Result<(), BoxError> {
            Err("connections still open".into())
        }

        fn running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }
    }

    struct Edge {
        _grumpy: Svc<Grumpy>,
        running: AtomicBool,
    }
    component!(Edge: Lifecycle);

    impl Lifecycle for Edge {
        fn start(&self) -> Result<(), BoxError> {
            self.running.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&self) -> Result<(), BoxError> {
            self.running.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }
    }

    fn grumpy(server: Svc<Server>) -> Grumpy {
        Grumpy {
            _server: server,
            running: AtomicBool::new(false),
        }
    }

    fn edge(grumpy: Svc<Grumpy>) -> Edge {
        Edge {
            _grumpy: grumpy,
            running: AtomicBool::new(false),
        }
    }

    fn service() -> Property {
        Property::new().with_auto_startup(true)
    }

    #[test]
    fn only_auto_startup_singletons_are_started() {
        let factory = ObjectFactory::new();
        factory.register_factory(Server::default, &service(), false).unwrap();
        factory
            .register_factory(|| Server::default(), &Property::new(), false)
            .unwrap();
        factory
            .register_factory(
                || Server::default(),
                &service().with_scope(Scope::Prototype),
                false,
            )
            .unwrap();
        factory.init().unwrap();

        let mut processor = LifecycleProcessor::new(Duration::from_secs(5));
        processor.start(&Context::new(), &factory).unwrap();
        assert_eq!(1, processor.started().len());

        let server: Svc<Server> = processor.started()[0].get().unwrap();
        assert!(server.running());

        processor.stop(&Context::new());
        assert!(processor.started().is_empty());
        assert!(!server.running());
    }

    #[test]
    fn starting_twice_skips_running_services() {
        let factory = ObjectFactory::new();
        factory.register_factory(Server::default, &service(), false).unwrap();
        factory.init().unwrap();

        let mut processor = LifecycleProcessor::new(Duration::from_secs(5));
        processor.start(&Context::new(), &factory).unwrap();
        processor.start(&Context::new(), &factory).unwrap();
        assert_eq!(1, processor.started().len());
    }

    #[test]
    fn services_must_be_running_after_start() {
        let factory = ObjectFactory::new();
        factory.register_factory(|| Liar, &service(), false).unwrap();
        factory.init().unwrap();

        let mut processor = LifecycleProcessor::new(Duration::from_secs(5));
        match processor.start(&Context::new(), &factory) {
            Err(InjectError::Lifecycle(LifecycleError::NotRunning { name })) => {
                assert!(name.ends_with("*Liar"));
            }
            Err(error) => Err(error).unwrap(),
            Ok(_) => unreachable!(),
        }
        assert!(processor.started().is_empty());
    }

    #[test]
    fn slow_starts_time_out() {
        let factory = ObjectFactory::new();
        factory.register_factory(|| Sleeper, &service(), false).unwrap();
        factory.init().unwrap();

        let mut processor = LifecycleProcessor::new(Duration::from_millis(20));
        match processor.start(&Context::new(), &factory) {
            Err(InjectError::Lifecycle(LifecycleError::Timeout { method, .. })) => {
                assert_eq!(Method::Start, method);
            }
            Err(error) => Err(error).unwrap(),
            Ok(_) => unreachable!(),
        }
    }

    #[test]
    fn timed_out_starts_return_without_waiting() {
        let factory = ObjectFactory::new();
        factory.register_factory(|| Stuck, &service(), false).unwrap();
        factory.init().unwrap();

        let mut processor = LifecycleProcessor::new(Duration::from_millis(20));
        let begin = Instant::now();
        match processor.start(&Context::new(), &factory) {
            Err(InjectError::Lifecycle(LifecycleError::Timeout { name, .. })) => {
                assert!(name.ends_with("*Stuck"));
            }
            Err(error) => Err(error).unwrap(),
            Ok(_) => unreachable!(),
        }
        assert!(begin.elapsed() < Duration::from_millis(1000), "{:?}", begin.elapsed());

        let stuck = factory.singletons().remove(0);
        let begin = Instant::now();
        factory.destroy_within(Duration::from_millis(20));
        assert!(begin.elapsed() < Duration::from_millis(1000), "{:?}", begin.elapsed());
        assert!(stuck.alive());
        assert!(factory.singletons().is_empty());
    }

    #[test]
    fn failed_stops_do_not_stop_the_sweep() {
        let factory = ObjectFactory::new();
        factory
            .register_factory(Server::default, &service().autowired(), false)
            .unwrap();
        factory
            .register_factory(grumpy, &service().autowired(), false)
            .unwrap();
        factory.register_factory(edge, &service(), false).unwrap();
        factory.init().unwrap();

        let mut processor = LifecycleProcessor::new(Duration::from_secs(5));
        processor.start(&Context::new(), &factory).unwrap();
        assert_eq!(3, processor.started().len());

        let server: Svc<Server> = factory.get(&Context::new()).unwrap();
        let grumpy: Svc<Grumpy> = factory.get(&Context::new()).unwrap();
        let edge: Svc<Edge> = factory.get(&Context::new()).unwrap();
        assert!(server.running() && grumpy.running() && edge.running());

        processor.stop(&Context::new());
        assert!(processor.started().is_empty());
        assert!(!edge.running());
        assert!(grumpy.running());
        assert!(!server.running());
    }
}
