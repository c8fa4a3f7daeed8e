use alloc::{
    string::{String, ToString as _},
    sync::{Arc, Weak},
    vec::Vec,
};
use core::{any::type_name, marker::PhantomData};
use tracing::debug;

use super::{
    any::{RcAny, TypeInfo},
    cache::{BoxedServiceFactory, ServiceSlot},
    config::Config,
    dependency_resolver::{DependencyResolver, ResolvedDependency},
    errors::{InstantiateErrorKind, ResolveErrorKind},
    namespace::Namespace,
};

/// Function that builds a service from named dependencies.
///
/// Implemented for `Fn(A1, ..., An) -> Result<T, InstantiateErrorKind>` where every argument
/// implements [`DependencyResolver`].
pub trait Constructor<Deps>: Send + Sync + 'static {
    type Provides: Send + Sync + 'static;

    /// Count of dependencies the constructor takes
    const ARITY: usize;

    /// # Errors
    /// Returns an error if a dependency has an unexpected type or the constructor fails
    fn construct(&self, dependencies: Vec<ResolvedDependency>) -> Result<Self::Provides, InstantiateErrorKind>;
}

macro_rules! impl_constructor {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case)]
        impl<F, Response, $($ty,)*> Constructor<($($ty,)*)> for F
        where
            F: Fn($($ty,)*) -> Result<Response, InstantiateErrorKind> + Send + Sync + 'static,
            Response: Send + Sync + 'static,
            $( $ty: DependencyResolver, )*
        {
            type Provides = Response;

            const ARITY: usize = <[&'static str]>::len(&[$(stringify!($ty)),*]);

            #[allow(unused_mut, unused_variables)]
            fn construct(&self, dependencies: Vec<ResolvedDependency>) -> Result<Self::Provides, InstantiateErrorKind> {
                let mut dependencies = dependencies.into_iter();
                $(
                    let Some(dependency) = dependencies.next() else {
                        unreachable!("count of dependencies is checked before construction");
                    };
                    let $ty = $ty::resolve(dependency)?;
                )*
                self($($ty,)*)
            }
        }
    };
}

all_the_tuples!(impl_constructor);

/// Service built by [`crate::FeatureContext::construct`].
///
/// It's one memoized slot: using the same construct for several entries
/// gives them the same instance.
pub struct Construct<T> {
    pub(crate) slot: Arc<ServiceSlot>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Construct<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
            _marker: PhantomData,
        }
    }
}

/// Wrapper to create a service factory that just returns a clone of passed value.
/// It can be used when the value was created outside the container, for transient services in particular.
#[inline]
#[must_use]
pub fn instance<T: Clone + Send + Sync + 'static>(val: T) -> impl Fn() -> Result<T, InstantiateErrorKind> + Send + Sync + 'static {
    move || Ok(val.clone())
}

#[must_use]
pub(crate) fn boxed_service_factory<T, F>(factory: F) -> BoxedServiceFactory
where
    T: Send + Sync + 'static,
    F: Fn() -> Result<T, InstantiateErrorKind> + Send + Sync + 'static,
{
    Arc::new(move || {
        let value = factory()?;
        debug!("Resolved");
        Ok(Arc::new(value) as RcAny)
    })
}

#[must_use]
pub(crate) fn construct<Deps, C>(namespace: Weak<Namespace>, names: &[&str], constructor: C) -> Construct<C::Provides>
where
    C: Constructor<Deps>,
{
    let names = names.iter().map(|name| name.to_string()).collect::<Vec<String>>();
    let type_name = type_name::<C::Provides>();

    let factory: BoxedServiceFactory = Arc::new(move || -> Result<RcAny, InstantiateErrorKind> {
        if names.len() != C::ARITY {
            return Err(InstantiateErrorKind::ArityMismatch {
                type_name,
                expected: C::ARITY,
                actual: names.len(),
            });
        }

        let Some(namespace) = namespace.upgrade() else {
            return Err(ResolveErrorKind::NoContainer {
                name: type_name.to_string(),
            }
            .into());
        };

        let mut dependencies = Vec::with_capacity(names.len());
        for name in &names {
            let slot = namespace.slot(name)?;
            dependencies.push(ResolvedDependency {
                name: name.clone(),
                value: slot.resolve()?,
                provides: slot.provides(),
            });
        }

        let value = constructor.construct(dependencies)?;
        debug!("Constructed");
        Ok(Arc::new(value) as RcAny)
    });

    Construct {
        slot: Arc::new(ServiceSlot::unbound(TypeInfo::of::<C::Provides>(), Config::default(), factory)),
        _marker: PhantomData,
    }
}
