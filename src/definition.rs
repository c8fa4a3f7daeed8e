use alloc::{string::String, sync::Arc, vec::Vec};
use core::fmt::{self, Debug, Formatter};

use crate::{
    any::{RcAny, TypeInfo},
    cache::{BoxedServiceFactory, ServiceSlot},
    config::Config,
    errors::InstantiateErrorKind,
    instantiator::{boxed_service_factory, Construct},
    merge::MergedServices,
    reference::{AnyReference, Reference},
};

enum DefinitionKind {
    Value(RcAny),
    Factory { factory: BoxedServiceFactory, config: Config },
    Alias(AnyReference),
    Slot(Arc<ServiceSlot>),
}

/// What a name is bound to: a value, a lazily evaluated factory or a deferred alias of another service
pub struct Definition {
    provides: TypeInfo,
    kind: DefinitionKind,
}

impl Definition {
    #[inline]
    #[must_use]
    pub fn value<T: Send + Sync + 'static>(value: T) -> Self {
        Self {
            provides: TypeInfo::of::<T>(),
            kind: DefinitionKind::Value(Arc::new(value)),
        }
    }

    #[inline]
    #[must_use]
    pub fn service<T, F>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> Result<T, InstantiateErrorKind> + Send + Sync + 'static,
    {
        Self::service_with_config(factory, Config::default())
    }

    #[inline]
    #[must_use]
    pub fn service_with_config<T, F>(factory: F, config: Config) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> Result<T, InstantiateErrorKind> + Send + Sync + 'static,
    {
        Self {
            provides: TypeInfo::of::<T>(),
            kind: DefinitionKind::Factory {
                factory: boxed_service_factory(factory),
                config,
            },
        }
    }

    /// Binds the name to another service, looked up on first access
    #[inline]
    #[must_use]
    pub fn alias(reference: impl Into<AnyReference>) -> Self {
        let reference = reference.into();
        Self {
            provides: reference.provides(),
            kind: DefinitionKind::Alias(reference),
        }
    }

    #[inline]
    #[must_use]
    pub const fn provides(&self) -> TypeInfo {
        self.provides
    }

    pub(crate) fn into_slot(self, name: &str) -> Arc<ServiceSlot> {
        match self.kind {
            DefinitionKind::Value(value) => Arc::new(ServiceSlot::resolved(name, self.provides, value)),
            DefinitionKind::Factory { factory, config } => Arc::new(ServiceSlot::new(name, self.provides, config, factory)),
            // Caching is left to the target
            DefinitionKind::Alias(reference) => Arc::new(ServiceSlot::new(
                name,
                self.provides,
                Config::transient(),
                Arc::new(move || -> Result<RcAny, InstantiateErrorKind> { Ok(reference.resolve()?) }),
            )),
            DefinitionKind::Slot(slot) => {
                slot.bind(name);
                slot
            }
        }
    }
}

impl Debug for Definition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            DefinitionKind::Value(_) => "value",
            DefinitionKind::Factory { .. } => "factory",
            DefinitionKind::Alias(_) => "alias",
            DefinitionKind::Slot(_) => "construct",
        };
        f.debug_struct("Definition")
            .field("kind", &kind)
            .field("provides", &self.provides.name)
            .finish()
    }
}

impl<T: Send + Sync + 'static> From<Reference<T>> for Definition {
    #[inline]
    fn from(reference: Reference<T>) -> Self {
        Self::alias(reference)
    }
}

impl From<AnyReference> for Definition {
    #[inline]
    fn from(reference: AnyReference) -> Self {
        Self::alias(reference)
    }
}

impl<T: Send + Sync + 'static> From<Construct<T>> for Definition {
    #[inline]
    fn from(construct: Construct<T>) -> Self {
        Self {
            provides: TypeInfo::of::<T>(),
            kind: DefinitionKind::Slot(construct.slot),
        }
    }
}

/// Services a feature factory exposes under its group, in definition order
#[derive(Default, Debug)]
pub struct FeatureDefinition {
    entries: Vec<(String, Definition)>,
}

impl FeatureDefinition {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn value<T: Send + Sync + 'static>(self, name: impl Into<String>, value: T) -> Self {
        self.define(name, Definition::value(value))
    }

    #[inline]
    #[must_use]
    pub fn service<T, F>(self, name: impl Into<String>, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> Result<T, InstantiateErrorKind> + Send + Sync + 'static,
    {
        self.define(name, Definition::service(factory))
    }

    #[inline]
    #[must_use]
    pub fn service_with_config<T, F>(self, name: impl Into<String>, factory: F, config: Config) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> Result<T, InstantiateErrorKind> + Send + Sync + 'static,
    {
        self.define(name, Definition::service_with_config(factory, config))
    }

    #[inline]
    #[must_use]
    pub fn define(mut self, name: impl Into<String>, definition: impl Into<Definition>) -> Self {
        self.entries.push((name.into(), definition.into()));
        self
    }

    /// Re-exports services of a merged group under the same names
    #[must_use]
    pub fn merged(mut self, services: MergedServices) -> Self {
        for (name, reference) in services {
            self.entries.push((name, Definition::alias(reference)));
        }
        self
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    #[inline]
    pub(crate) fn into_entries(self) -> Vec<(String, Definition)> {
        self.entries
    }
}
