use crate::{
    component, interface, logging, options, BoxError, Container, ContainerConfig, Context,
    DefinitionFilter, Initializable, InjectError, InjectResult, LastRealization, Lifecycle,
    LifecycleError, Property, Scope, Svc, Tag,
};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

type Log = Arc<Mutex<Vec<String>>>;

macro_rules! service {
    ($name:ident $(, $dep:ident: $dep_type:ident)*) => {
        struct $name {
            log: Log,
            running: AtomicBool,
            $(#[allow(dead_code)] $dep: Svc<$dep_type>,)*
        }

        impl Lifecycle for $name {
            fn start(&self) -> Result<(), BoxError> {
                self.log.lock().unwrap().push(format!("start {}", stringify!($name)));
                self.running.store(true, Ordering::SeqCst);
                Ok(())
            }

            fn stop(&self) -> Result<(), BoxError> {
                self.log.lock().unwrap().push(format!("stop {}", stringify!($name)));
                self.running.store(false, Ordering::SeqCst);
                Ok(())
            }

            fn running(&self) -> bool {
                self.running.load(Ordering::SeqCst)
            }
        }

        component!($name: Lifecycle);
    };
}

service!(D);
service!(B, d: D);
service!(C, d: D);
service!(A, b: B, c: C);

#[derive(Default)]
struct Svc1 {
    inits: AtomicUsize,
}

impl Initializable for Svc1 {
    fn init(&self) -> Result<(), BoxError> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Svc2 {
    dep1: Svc<Svc1>,
    dep1_ready: bool,
}

impl Svc2 {
    fn new(dep1: Svc<Svc1>) -> Self {
        let dep1_ready = dep1.inits.load(Ordering::SeqCst) > 0;
        Svc2 { dep1, dep1_ready }
    }
}

struct Svc3 {
    dep2: Svc<Svc2>,
}

impl Svc3 {
    fn new(dep2: Svc<Svc2>) -> Self {
        Svc3 { dep2 }
    }
}

component!(Svc1: Initializable);
component!(Svc2);
component!(Svc3);

trait Greeter: Send + Sync {
    fn greet(&self) -> &'static str;
}

struct English;
impl Greeter for English {
    fn greet(&self) -> &'static str {
        "hello"
    }
}

struct French;
impl Greeter for French {
    fn greet(&self) -> &'static str {
        "bonjour"
    }
}

interface!(Greeter);

fn english() -> Box<dyn Greeter> {
    Box::new(English)
}

fn french() -> Box<dyn Greeter> {
    Box::new(French)
}

struct Greeting(Svc<dyn Greeter>);
component!(Greeting);

struct Ping(#[allow(dead_code)] Svc<Pong>);
struct Pong(#[allow(dead_code)] Svc<Ping>);
component!(Ping);
component!(Pong);

fn services(log: &Log) -> Container {
    let container = Container::new();
    // Registered dependents first so that the start order comes from the
    // dependency graph rather than from registration order
    let log_a = log.clone();
    container
        .register(
            move |b: Svc<B>, c: Svc<C>| A {
                log: log_a.clone(),
                running: AtomicBool::new(false),
                b,
                c,
            },
            [options::auto_startup(), options::autowired()],
        )
        .unwrap();
    let log_c = log.clone();
    container
        .register(
            move |d: Svc<D>| C {
                log: log_c.clone(),
                running: AtomicBool::new(false),
                d,
            },
            [options::auto_startup(), options::autowired()],
        )
        .unwrap();
    let log_b = log.clone();
    container
        .register(
            move |d: Svc<D>| B {
                log: log_b.clone(),
                running: AtomicBool::new(false),
                d,
            },
            [options::auto_startup(), options::autowired()],
        )
        .unwrap();
    let log_d = log.clone();
    container
        .register(
            move || D {
                log: log_d.clone(),
                running: AtomicBool::new(false),
            },
            [options::auto_startup(), options::autowired()],
        )
        .unwrap();
    container
}

#[test]
fn services_start_dependency_first_and_stop_in_reverse() {
    logging::init_for_tests();
    let log = Log::default();
    let container = services(&log);
    container.start().unwrap();

    let started = log.lock().unwrap().clone();
    assert_eq!(4, started.len());
    assert_eq!("start D", started[0]);
    assert_eq!("start A", started[3]);

    container.shutdown();
    let stopped: Vec<String> = log.lock().unwrap()[4..].to_vec();
    let expected: Vec<String> = started
        .iter()
        .rev()
        .map(|entry| entry.replace("start", "stop"))
        .collect();
    assert_eq!(expected, stopped);
}

#[test]
fn starting_twice_does_not_restart_services() {
    let log = Log::default();
    let container = services(&log);
    container.start().unwrap();
    container.start().unwrap();
    assert_eq!(4, log.lock().unwrap().len());
    container.shutdown();
}

#[test]
fn failed_starts_abort_startup() {
    struct Broken;
    impl Lifecycle for Broken {
        fn start(&self) -> Result<(), BoxError> {
            Err("port in use".into())
        }

        fn stop(&self) -> Result<(), BoxError> {
            Ok(())
        }

        fn running(&self) -> bool {
            false
        }
    }
    component!(Broken: Lifecycle);

    let log = Log::default();
    let container = services(&log);
    container
        .register(|_: Svc<A>| Broken, [options::auto_startup()])
        .unwrap();

    match container.start() {
        Err(InjectError::Lifecycle(LifecycleError::CallFailed { name, .. })) => {
            assert!(name.ends_with("*Broken"));
        }
        Err(error) => Err(error).unwrap(),
        Ok(_) => unreachable!(),
    }
    assert_eq!(4, log.lock().unwrap().len());

    container.shutdown();
    assert_eq!(8, log.lock().unwrap().len());
}

#[test]
fn dependencies_are_wired_and_initialized() {
    let container = Container::new();
    container
        .register(Svc1::default, [options::autowired()])
        .unwrap();
    container
        .register(Svc2::new, [options::autowired()])
        .unwrap();
    container
        .register(Svc3::new, [options::prototype()])
        .unwrap();
    container.init().unwrap();

    let svc3: Svc<Svc3> = container.get().unwrap();
    assert!(svc3.dep2.dep1_ready);
    assert_eq!(1, svc3.dep2.dep1.inits.load(Ordering::SeqCst));
}

#[test]
fn singletons_are_shared_and_prototypes_are_fresh() {
    let container = Container::new();
    container
        .register(Svc1::default, [options::autowired()])
        .unwrap();
    container
        .register(Svc2::new, [options::prototype()])
        .unwrap();
    container.init().unwrap();

    let first: Svc<Svc2> = container.get().unwrap();
    let second: Svc<Svc2> = container.get().unwrap();
    assert!(!Svc::ptr_eq(&first, &second));
    assert!(Svc::ptr_eq(&first.dep1, &second.dep1));

    let container = Arc::new(container);
    let singletons: Vec<Svc<Svc1>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| container.get::<Svc1>().unwrap()))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });
    assert!(singletons
        .iter()
        .all(|singleton| Svc::ptr_eq(singleton, &first.dep1)));
}

#[test]
fn registrations_are_checked() {
    let container = Container::new();
    container.register(Svc1::default, []).unwrap();

    match container.register_factory(Svc1::default, &Property::new(), false) {
        Err(InjectError::DuplicateFactory { .. }) => {}
        Err(error) => Err(error).unwrap(),
        Ok(_) => unreachable!(),
    }
    match container.register(|| Svc1::default(), []) {
        Err(InjectError::DuplicateName { name }) => assert!(name.ends_with("*Svc1")),
        Err(error) => Err(error).unwrap(),
        Ok(_) => unreachable!(),
    }
    container
        .register_factory(|| Svc1::default(), &Property::new(), false)
        .unwrap();
    assert_eq!(2, container.definitions(&[]).len());
}

#[test]
fn registry_stays_readonly_after_failed_init() {
    let container = Container::new();
    container.register(Ping, []).unwrap();
    container.register(Pong, []).unwrap();

    let error = container.init().unwrap_err();
    assert!(matches!(error, InjectError::Graph(_)));
    assert!(error.to_string().contains("Ping"));
    assert!(matches!(container.init(), Err(InjectError::Graph(_))));

    match container.register(Svc1::default, []) {
        Err(InjectError::Readonly) => {}
        Err(error) => Err(error).unwrap(),
        Ok(_) => unreachable!(),
    }
}

#[test]
fn missing_dependencies_fail_init() {
    let container = Container::new();
    container.register(Svc3::new, []).unwrap();

    match container.init() {
        Err(InjectError::DefinitionNotFound { name }) => assert!(name.ends_with("*Svc2")),
        Err(error) => Err(error).unwrap(),
        Ok(_) => unreachable!(),
    }
}

#[test]
fn realization_selector_chooses_implementations() {
    let container = Container::new();
    let property = Property::new().autowired();
    container.register_factory(english, &property, false).unwrap();
    container.register_factory(french, &property, false).unwrap();
    container
        .register_factory(Greeting, &Property::new().with_scope(Scope::Prototype), false)
        .unwrap();
    container.init().unwrap();

    let greeting: Svc<Greeting> = container.get().unwrap();
    assert_eq!("hello", greeting.0.greet());

    container.set_realization_selector(LastRealization);
    let greeting: Svc<Greeting> = container.get().unwrap();
    assert_eq!("bonjour", greeting.0.greet());

    let greeters = container.get_objects::<dyn Greeter>(&Context::new()).unwrap();
    assert_eq!(2, greeters.len());
}

#[test]
fn tag_filters_select_definitions() {
    let container = Container::new();
    container
        .register_factory(english, &Property::new().with_tag(Tag::new("env", "dev")), false)
        .unwrap();
    container
        .register_factory(french, &Property::new().with_tag(Tag::new("env", "prod")), false)
        .unwrap();
    container.init().unwrap();

    let prod = DefinitionFilter::tag(Tag::new("env", "prod"));
    assert_eq!(1, container.definitions(&[prod.clone()]).len());

    let context = Context::new().with_filter(prod);
    let greeter: Svc<dyn Greeter> = container.get_with(&context).unwrap();
    assert_eq!("bonjour", greeter.greet());

    let context = Context::new().with_filter(DefinitionFilter::tag(Tag::new("env", "test")));
    let missing: InjectResult<Svc<dyn Greeter>> = container.get_with(&context);
    assert!(matches!(missing, Err(InjectError::DefinitionNotFound { .. })));
}

#[test]
fn objects_follow_their_lifecycle() {
    let container = Container::new();
    container.register(Svc1::default, []).unwrap();
    container.init().unwrap();

    let objects = container.get_objects::<Svc1>(&Context::new()).unwrap();
    let object = &objects[0];
    object.init().unwrap();
    object.init().unwrap();
    assert_eq!(1, object.get::<Svc1>().unwrap().inits.load(Ordering::SeqCst));

    object.destroy().unwrap();
    assert!(!object.alive());
    assert!(!object.running());
    assert_eq!("", object.id());
    assert!(matches!(object.destroy(), Err(InjectError::AlreadyDestroyed)));
    assert!(matches!(object.start(), Err(InjectError::AlreadyDestroyed)));
    assert!(matches!(object.init(), Err(InjectError::AlreadyDestroyed)));
}

#[test]
fn startup_timeouts_are_configurable() {
    struct Slow;
    impl Lifecycle for Slow {
        fn start(&self) -> Result<(), BoxError> {
            thread::sleep(Duration::from_millis(200));
            Ok(())
        }

        fn stop(&self) -> Result<(), BoxError> {
            Ok(())
        }

        fn running(&self) -> bool {
            true
        }
    }
    component!(Slow: Lifecycle);

    let container = Container::with_config(ContainerConfig {
        startup_timeout: Duration::from_millis(10),
    });
    container
        .register(|| Slow, [options::auto_startup()])
        .unwrap();

    match container.start() {
        Err(InjectError::Lifecycle(LifecycleError::Timeout { timeout, .. })) => {
            assert_eq!(Duration::from_millis(10), timeout);
        }
        Err(error) => Err(error).unwrap(),
        Ok(_) => unreachable!(),
    }
}
