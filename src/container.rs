use alloc::{string::String, sync::Arc, vec::Vec};
use core::any::type_name;
use tracing::{debug, error, info_span, Instrument as _};

use crate::{
    config::BuildOptions,
    context::FeatureContext,
    errors::{BuildErrorKind, FeatureResult, ResolveErrorKind, SetupErrorKind},
    feature::{BoxedFeatureFactory, FeatureFactory},
    group::{compile, FeatureGroup, Surface},
    namespace::Namespace,
    reference::Reference,
    registry::{RegistryList, RegistryMap},
    session::CompileSession,
    setup::{run_setups, SetupCallback, SETUP_CALLBACKS},
};

/// Built container: services of the root group, evaluated on first request.
///
/// Cheap to clone, clones share the services.
#[derive(Clone)]
pub struct Container {
    namespace: Arc<Namespace>,
}

impl Container {
    #[inline]
    #[must_use]
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        self.namespace.name()
    }

    /// Resolves the service by name, evaluating it on the first request
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::NoService`] if the name isn't defined
    /// - Returns [`ResolveErrorKind::IncorrectType`] if the service provides another type
    /// - Returns [`ResolveErrorKind::CircularResolution`] if the service depends on itself
    /// - Returns the error of the service factory otherwise
    pub fn get<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, ResolveErrorKind> {
        let span = info_span!("get", service = name, provides = type_name::<T>());
        let _guard = span.enter();

        self.namespace.resolve_typed(name)
    }

    /// Deferred handle to the service, it doesn't keep the container alive
    #[inline]
    #[must_use]
    pub fn reference<T: Send + Sync + 'static>(&self, name: &str) -> Reference<T> {
        Reference::new(&self.namespace, name)
    }

    /// # Errors
    /// The same as for [`Container::get`]
    #[inline]
    pub fn registry<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<RegistryList<T>>, ResolveErrorKind> {
        self.get(name)
    }

    /// # Errors
    /// The same as for [`Container::get`]
    #[inline]
    pub fn registry_map<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<RegistryMap<T>>, ResolveErrorKind> {
        self.get(name)
    }

    /// Names of the root group, sorted
    #[inline]
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.namespace.names()
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.namespace.find(name).is_some()
    }
}

/// Ordered list of features the container is built from
#[derive(Clone, Default)]
#[must_use]
pub struct ContainerBuilder {
    factories: Vec<BoxedFeatureFactory>,
    options: BuildOptions,
}

/// Entry point of the container
#[inline]
pub fn create_container() -> ContainerBuilder {
    ContainerBuilder::new()
}

impl ContainerBuilder {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a feature factory. The builder is immutable, a new one is returned.
    #[inline]
    pub fn add<F>(&self, feature: F) -> Self
    where
        F: Fn(&mut FeatureContext) -> FeatureResult + Send + Sync + 'static,
    {
        self.add_feature(feature)
    }

    #[inline]
    pub fn add_feature(&self, feature: impl FeatureFactory) -> Self {
        let mut builder = self.clone();
        builder.factories.push(Arc::new(feature));
        builder
    }

    #[inline]
    pub fn with_options(&self, options: BuildOptions) -> Self {
        Self {
            factories: self.factories.clone(),
            options,
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Compiles the features in order, then runs the setup callbacks one at a time.
    /// The builder may be built again, every build gets fresh services.
    ///
    /// # Errors
    /// - Returns [`BuildErrorKind::Compile`] if a feature can't be compiled
    /// - Returns [`BuildErrorKind::Validation`] if validation is enabled and a reference is dangling
    /// - Returns [`BuildErrorKind::Setup`] if a setup callback fails, later callbacks don't run
    pub async fn build(&self) -> Result<Container, BuildErrorKind> {
        let span = info_span!("build", container = %self.options.name, features = self.factories.len());
        self.build_inner().instrument(span).await
    }

    async fn build_inner(&self) -> Result<Container, BuildErrorKind> {
        let session = CompileSession::new();
        let compiled = compile(
            FeatureGroup {
                name: self.options.name.clone(),
                factories: self.factories.clone(),
                surface: Surface::Root,
            },
            None,
            &session,
        )?;

        if self.options.validate {
            if let Err(err) = session.validate() {
                error!("{}", err);
                return Err(BuildErrorKind::Validation(err));
            }
        }
        drop(session);

        let container = Container {
            namespace: compiled.namespace,
        };

        let callbacks = container
            .registry::<SetupCallback>(SETUP_CALLBACKS)
            .map_err(SetupErrorKind::from)?;
        debug!(callbacks = callbacks.len(), "Running setup callbacks");
        run_setups(&callbacks).await?;

        debug!("Container built");
        Ok(container)
    }
}
