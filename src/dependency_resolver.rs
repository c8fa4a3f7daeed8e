use alloc::{string::String, sync::Arc};

use crate::{
    any::{RcAny, TypeInfo},
    errors::ResolveErrorKind,
};

/// Dependency resolved by name for a constructor
pub struct ResolvedDependency {
    pub name: String,
    pub value: RcAny,
    pub provides: TypeInfo,
}

/// Argument of a constructor passed to [`crate::FeatureContext::construct`]
pub trait DependencyResolver: Sized + 'static {
    /// # Errors
    /// Returns [`ResolveErrorKind::IncorrectType`] if the value can't be represented as `Self`
    fn resolve(dependency: ResolvedDependency) -> Result<Self, ResolveErrorKind>;
}

impl<T: Send + Sync + 'static> DependencyResolver for Arc<T> {
    fn resolve(ResolvedDependency { name, value, provides }: ResolvedDependency) -> Result<Self, ResolveErrorKind> {
        value.downcast::<T>().map_err(|_| ResolveErrorKind::IncorrectType {
            name,
            expected: TypeInfo::of::<T>(),
            actual: provides,
        })
    }
}

/// Erased dependency, the constructor downcasts it by itself
impl DependencyResolver for RcAny {
    #[inline]
    fn resolve(dependency: ResolvedDependency) -> Result<Self, ResolveErrorKind> {
        Ok(dependency.value)
    }
}
