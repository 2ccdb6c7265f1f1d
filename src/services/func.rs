use crate::{Component, DynSvc, InjectError, InjectResult, Service, TypeInfo};

/// A factory for creating instances of a component. All functions of arity 8
/// or less are automatically service factories if every argument is a
/// [`Svc<I>`](crate::Svc) of some [`Interface`](crate::Interface) and the
/// return value is a [`Component`].
///
/// ```
/// use runtime_container::{component, ServiceFactory, Svc};
///
/// struct Foo;
/// struct Bar(Svc<Foo>);
///
/// component!(Foo);
/// component!(Bar);
///
/// fn factory(foo: Svc<Foo>) -> Bar {
///     Bar(foo)
/// }
///
/// let dependencies = <fn(Svc<Foo>) -> Bar as ServiceFactory<_>>::dependencies();
/// assert_eq!(1, dependencies.len());
/// # let _ = factory;
/// ```
///
/// # Type parameters
/// * `D` - Dependencies of this factory as a tuple of service pointers.
pub trait ServiceFactory<D>: Service {
    /// The component this factory produces.
    type Result: Component;

    /// The types requested by this factory, in parameter order.
    fn dependencies() -> Vec<TypeInfo>;

    /// Invokes this factory with already constructed dependencies, given in
    /// the same order as [`ServiceFactory::dependencies`].
    fn invoke(&self, dependencies: &[DynSvc]) -> InjectResult<Self::Result>;
}

macro_rules! impl_service_factory {
    () => {
        impl_service_factory!(@impl ());
    };
    ($first:ident $(, $rest:ident)*) => {
        impl_service_factory!(@impl ($first $(, $rest)*));
        impl_service_factory!($($rest),*);
    };
    (@impl ($($type_name:ident),*)) => {
        impl<F, R $(, $type_name)*> ServiceFactory<($($crate::Svc<$type_name>,)*)> for F
        where
            F: Service + Fn($($crate::Svc<$type_name>),*) -> R,
            R: Component,
            $($type_name: ?Sized + $crate::Interface,)*
        {
            type Result = R;

            fn dependencies() -> Vec<TypeInfo> {
                vec![$(<$type_name as $crate::Interface>::info()),*]
            }

            #[allow(unused_variables, unused_mut, non_snake_case)]
            fn invoke(&self, dependencies: &[DynSvc]) -> InjectResult<R> {
                let mut dependencies = dependencies.iter();
                let result = self($({
                    let expected = <$type_name as $crate::Interface>::info();
                    let mismatch = || InjectError::InvalidInstance {
                        factory: std::any::type_name::<F>().to_owned(),
                        expected: expected.canonical_name(),
                    };
                    let instance = dependencies.next().ok_or_else(mismatch)?;
                    <$type_name as $crate::Interface>::downcast(instance.clone())
                        .ok_or_else(mismatch)?
                }),*);
                Ok(result)
            }
        }
    };
}

impl_service_factory!(T0, T1, T2, T3, T4, T5, T6, T7);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{component, interface, Svc};

    struct Leaf(i32);
    struct Branch(Svc<Leaf>);
    component!(Leaf);
    component!(Branch);

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }
    interface!(Greeter);

    impl Greeter for Leaf {
        fn greet(&self) -> String {
            format!("leaf {}", self.0)
        }
    }

    fn branch(leaf: Svc<Leaf>) -> Branch {
        Branch(leaf)
    }

    fn greeter(leaf: Svc<Leaf>) -> Box<dyn Greeter> {
        Box::new(Leaf(leaf.0 + 1))
    }

    #[test]
    fn dependencies_follow_parameter_order() {
        let dependencies = <fn(Svc<Leaf>, Svc<dyn Greeter>) -> Branch as ServiceFactory<
            (Svc<Leaf>, Svc<dyn Greeter>),
        >>::dependencies();
        assert_eq!(
            vec![TypeInfo::of::<Leaf>(), TypeInfo::of::<dyn Greeter>()],
            dependencies
        );
    }

    #[test]
    fn invoke_downcasts_dependencies() {
        let leaf = Leaf(3).into_instance();
        let result = ServiceFactory::invoke(&branch, &[leaf]).unwrap();
        assert_eq!(3, result.0 .0);

        let leaf = Leaf(3).into_instance();
        let result = ServiceFactory::invoke(&greeter, &[leaf]).unwrap();
        assert_eq!("leaf 4", result.greet());
    }

    #[test]
    fn invoke_rejects_wrong_instances() {
        let wrong = Branch(Svc::new(Leaf(0))).into_instance();
        match ServiceFactory::invoke(&branch, &[wrong]) {
            Err(InjectError::InvalidInstance { expected, .. })
                if expected.ends_with("*Leaf") => {}
            Err(error) => Err(error).unwrap(),
            Ok(_) => unreachable!(),
        }

        match ServiceFactory::invoke(&branch, &[]) {
            Err(InjectError::InvalidInstance { .. }) => {}
            Err(error) => Err(error).unwrap(),
            Ok(_) => unreachable!(),
        }
    }
}
