use alloc::{
    string::ToString as _,
    sync::{Arc, Weak},
};
use core::{
    fmt::{self, Debug, Formatter},
    marker::PhantomData,
};

use crate::{
    any::{RcAny, TypeInfo},
    errors::ResolveErrorKind,
    namespace::Namespace,
};

/// Deferred handle to a named service.
///
/// Nothing is looked up when the handle is created. The name is resolved against
/// the finished container on every [`Reference::get`], so features may refer to services
/// defined by features added after them.
///
/// The handle doesn't keep the container alive.
pub struct Reference<T> {
    namespace: Weak<Namespace>,
    name: Arc<str>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Reference<T> {
    fn clone(&self) -> Self {
        Self {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> Debug for Reference<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reference")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<T: Send + Sync + 'static> Reference<T> {
    #[inline]
    #[must_use]
    pub(crate) fn new(namespace: &Arc<Namespace>, name: &str) -> Self {
        Self {
            namespace: Arc::downgrade(namespace),
            name: Arc::from(name),
            _marker: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolves the referenced service
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::NotCompiled`] if the container isn't built yet
    /// - Returns [`ResolveErrorKind::NoService`] if the name was never defined
    /// - Returns [`ResolveErrorKind::IncorrectType`] if the service provides another type
    /// - Returns [`ResolveErrorKind::NoContainer`] if the container was dropped
    /// - Returns the error of the service factory otherwise
    pub fn get(&self) -> Result<Arc<T>, ResolveErrorKind> {
        match self.namespace.upgrade() {
            Some(namespace) => namespace.resolve_typed(&self.name),
            None => Err(ResolveErrorKind::NoContainer {
                name: self.name.to_string(),
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn erase(self) -> AnyReference {
        AnyReference {
            namespace: self.namespace,
            name: self.name,
            provides: TypeInfo::of::<T>(),
        }
    }
}

/// [`Reference`] with erased type
#[derive(Clone)]
pub struct AnyReference {
    namespace: Weak<Namespace>,
    name: Arc<str>,
    provides: TypeInfo,
}

impl Debug for AnyReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyReference")
            .field("name", &self.name)
            .field("provides", &self.provides.name)
            .finish_non_exhaustive()
    }
}

impl AnyReference {
    #[inline]
    #[must_use]
    pub(crate) fn new(namespace: &Arc<Namespace>, name: &str, provides: TypeInfo) -> Self {
        Self {
            namespace: Arc::downgrade(namespace),
            name: Arc::from(name),
            provides,
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub const fn provides(&self) -> TypeInfo {
        self.provides
    }

    pub(crate) fn resolve(&self) -> Result<RcAny, ResolveErrorKind> {
        match self.namespace.upgrade() {
            Some(namespace) => namespace.resolve(&self.name),
            None => Err(ResolveErrorKind::NoContainer {
                name: self.name.to_string(),
            }),
        }
    }

    /// Restores the type of the reference.
    /// Returns `None` if the reference provides another type.
    #[must_use]
    pub fn downcast<T: Send + Sync + 'static>(self) -> Option<Reference<T>> {
        if self.provides != TypeInfo::of::<T>() {
            return None;
        }
        Some(Reference {
            namespace: self.namespace,
            name: self.name,
            _marker: PhantomData,
        })
    }
}

impl<T: Send + Sync + 'static> From<Reference<T>> for AnyReference {
    #[inline]
    fn from(reference: Reference<T>) -> Self {
        reference.erase()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::{AnyReference, Reference};
    use crate::{
        any::TypeInfo,
        cache::ServiceSlot,
        errors::ResolveErrorKind,
        namespace::{GroupStatus, Namespace},
    };

    use alloc::{
        collections::BTreeMap,
        format,
        string::{String, ToString as _},
        sync::Arc,
    };
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_reference_resolved_after_freeze() {
        let namespace = Arc::new(Namespace::new("root", None));
        namespace.set_status(GroupStatus::Compiling);

        // Created before the target exists
        let reference = Reference::<u32>::new(&namespace, "answer");
        assert!(matches!(reference.get(), Err(ResolveErrorKind::NotCompiled { .. })));

        namespace.freeze(BTreeMap::from([(
            "answer".to_string(),
            Arc::new(ServiceSlot::resolved("answer", TypeInfo::of::<u32>(), Arc::new(42u32))),
        )]));

        assert_eq!(*reference.get().unwrap(), 42);
    }

    #[test]
    #[traced_test]
    fn test_reference_missing_target() {
        let namespace = Arc::new(Namespace::new("root", None));
        let reference = Reference::<u32>::new(&namespace, "missing");
        namespace.freeze(BTreeMap::new());

        assert!(matches!(reference.get(), Err(ResolveErrorKind::NoService { name }) if name == "missing"));
    }

    #[test]
    fn test_reference_after_drop() {
        let namespace = Arc::new(Namespace::new("root", None));
        let reference = Reference::<u32>::new(&namespace, "answer");
        drop(namespace);

        assert!(matches!(reference.get(), Err(ResolveErrorKind::NoContainer { .. })));
    }

    #[test]
    fn test_any_reference_downcast() {
        let namespace = Arc::new(Namespace::new("root", None));
        let reference: AnyReference = Reference::<u32>::new(&namespace, "answer").into();

        assert_eq!(reference.provides(), TypeInfo::of::<u32>());
        assert!(reference.clone().downcast::<u8>().is_none());
        assert!(reference.downcast::<u32>().is_some());
    }
}
