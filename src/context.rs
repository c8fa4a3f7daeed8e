use alloc::{
    string::{String, ToString as _},
    sync::Arc,
    vec::Vec,
};
use core::future::Future;
use tracing::{debug, warn};

use crate::{
    any::TypeInfo,
    definition::Definition,
    errors::{CompileErrorKind, FeatureResult, InstantiateErrorKind},
    feature::FeatureFactory,
    group::{GroupState, Surface},
    instantiator::{self, Construct, Constructor},
    merge::MergeWith,
    reference::Reference,
    registry::{RegistryDecl, RegistryList, RegistryMap},
    session::CompileSession,
    setup::{SetupCallback, SETUP_CALLBACKS},
};

/// Capabilities available to a feature factory while its group is compiled.
///
/// Everything here is declarative: services are not evaluated until they're requested
/// from the built container.
pub struct FeatureContext {
    group: Arc<GroupState>,
    session: CompileSession,
    overrides: Vec<(String, Definition)>,
}

impl FeatureContext {
    #[inline]
    #[must_use]
    pub(crate) fn new(group: Arc<GroupState>, session: CompileSession) -> Self {
        Self {
            group,
            session,
            overrides: Vec::new(),
        }
    }

    #[inline]
    pub(crate) fn into_overrides(self) -> Vec<(String, Definition)> {
        self.overrides
    }

    /// Name of the group the feature is compiled in
    #[inline]
    #[must_use]
    pub fn group_name(&self) -> &str {
        self.group.name()
    }

    /// Typed handle to a service already declared by an earlier feature or visible from the group.
    ///
    /// # Errors
    /// - Returns [`CompileErrorKind::MissingService`] if nothing with the name is declared yet
    /// - Returns [`CompileErrorKind::IncorrectType`] if the service provides another type
    pub fn service<T: Send + Sync + 'static>(&self, name: &str) -> Result<Reference<T>, CompileErrorKind> {
        let Some(provides) = self.group.declared(name) else {
            let err = CompileErrorKind::MissingService {
                name: name.to_string(),
                group: self.group.name().to_string(),
            };
            warn!("{}", err);
            return Err(err);
        };
        if provides != TypeInfo::of::<T>() {
            return Err(CompileErrorKind::IncorrectType {
                name: name.to_string(),
                expected: TypeInfo::of::<T>(),
                actual: provides,
            });
        }
        Ok(Reference::new(&self.group.namespace, name))
    }

    /// Deferred handle, the name may be defined later, by any feature of the group or its parents.
    /// Nothing is checked until the handle is resolved, unless the build validates references.
    #[must_use]
    pub fn reference<T: Send + Sync + 'static>(&self, name: &str) -> Reference<T> {
        self.session
            .record_reference(self.group.namespace.clone(), name, Some(TypeInfo::of::<T>()));
        Reference::new(&self.group.namespace, name)
    }

    /// Declares a list registry in the group. Declaring it again with the same item type is allowed.
    ///
    /// # Errors
    /// - Returns [`CompileErrorKind::DuplicateService`] if a service with the name is defined
    /// - Returns [`CompileErrorKind::RegistryTypeMismatch`] if it's declared with another shape
    pub fn register_list<T: Send + Sync + 'static>(&self, name: &str) -> Result<Reference<RegistryList<T>>, CompileErrorKind> {
        self.group.declare_registry(name, RegistryDecl::list::<T>())?;
        Ok(Reference::new(&self.group.namespace, name))
    }

    /// Declares a map registry in the group
    ///
    /// # Errors
    /// The same as for [`FeatureContext::register_list`]
    pub fn register_map<T: Send + Sync + 'static>(&self, name: &str) -> Result<Reference<RegistryMap<T>>, CompileErrorKind> {
        self.group.declare_registry(name, RegistryDecl::map::<T>())?;
        Ok(Reference::new(&self.group.namespace, name))
    }

    /// Appends an item to a list registry declared in the group or one of its parents.
    /// The registry is looked up when the group is frozen.
    pub fn register(&self, registry: &str, definition: impl Into<Definition>) {
        self.group.contribute(registry, None, definition.into());
    }

    #[inline]
    pub fn register_value<T: Send + Sync + 'static>(&self, registry: &str, value: T) {
        self.register(registry, Definition::value(value));
    }

    #[inline]
    pub fn register_service<T, F>(&self, registry: &str, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn() -> Result<T, InstantiateErrorKind> + Send + Sync + 'static,
    {
        self.register(registry, Definition::service(factory));
    }

    /// Adds a keyed item to a map registry
    pub fn register_entry(&self, registry: &str, key: impl Into<String>, definition: impl Into<Definition>) {
        self.group.contribute(registry, Some(key.into()), definition.into());
    }

    /// Service built by `constructor` from the named services, passed positionally.
    /// The count of names is checked against the constructor when the service is first requested.
    #[must_use]
    pub fn construct<Deps, C>(&self, names: &[&str], constructor: C) -> Construct<C::Provides>
    where
        C: Constructor<Deps>,
    {
        for name in names {
            self.session.record_reference(self.group.namespace.clone(), *name, None);
        }
        instantiator::construct(Arc::downgrade(&self.group.namespace), names, constructor)
    }

    /// Replaces a service defined in the group.
    /// Applied after the definitions of the current feature, so it may target them too.
    pub fn override_service(&mut self, name: impl Into<String>, definition: impl Into<Definition>) {
        let name = name.into();
        debug!(service = %name, "Override scheduled");
        self.overrides.push((name, definition.into()));
    }

    /// Starts a merged group seeing everything the current group sees
    #[must_use]
    pub fn merge<F>(&self, feature: F) -> MergeWith
    where
        F: Fn(&mut FeatureContext) -> FeatureResult + Send + Sync + 'static,
    {
        self.merge_feature(feature)
    }

    #[must_use]
    pub fn merge_feature(&self, feature: impl FeatureFactory) -> MergeWith {
        MergeWith::new(&self.group, self.session.clone(), Surface::Full).with_feature(feature)
    }

    /// Starts a merged group seeing only the named services of the current group
    #[must_use]
    pub fn merge_services(&self, names: &[&str]) -> MergeWith {
        let names = names.iter().map(|name| name.to_string()).collect();
        MergeWith::new(&self.group, self.session.clone(), Surface::Narrow(names))
    }

    /// Adds a callback run once after the container is compiled.
    /// Callbacks run sequentially, in registration order.
    pub fn setup<F, Fut>(&self, callback: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.register_value(SETUP_CALLBACKS, SetupCallback::new(callback));
    }
}
