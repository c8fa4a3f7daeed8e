use alloc::{
    collections::BTreeMap,
    string::{String, ToString as _},
    sync::{Arc, Weak},
    vec::Vec,
};
use tracing::{debug, error};

use crate::{
    context::FeatureContext,
    errors::{CompileErrorKind, FeatureResult},
    feature::{BoxedFeatureFactory, FeatureFactory},
    group::{compile, FeatureGroup, GroupState, Surface},
    reference::{AnyReference, Reference},
    session::CompileSession,
};

/// Builder of a merged group, created by [`FeatureContext::merge`] and friends.
///
/// The group is compiled on [`MergeWith::create`], right in the middle of the calling factory,
/// so its registry contributions form one block at the call site.
#[must_use]
pub struct MergeWith {
    parent: Weak<GroupState>,
    session: CompileSession,
    surface: Surface,
    factories: Vec<BoxedFeatureFactory>,
    name: Option<String>,
}

impl MergeWith {
    pub(crate) fn new(parent: &Arc<GroupState>, session: CompileSession, surface: Surface) -> Self {
        Self {
            parent: Arc::downgrade(parent),
            session,
            surface,
            factories: Vec::new(),
            name: None,
        }
    }

    #[inline]
    pub fn with<F>(self, feature: F) -> Self
    where
        F: Fn(&mut FeatureContext) -> FeatureResult + Send + Sync + 'static,
    {
        self.with_feature(feature)
    }

    #[inline]
    pub fn with_feature(mut self, feature: impl FeatureFactory) -> Self {
        self.factories.push(Arc::new(feature));
        self
    }

    /// Name of the merged group, qualified by the parent name.
    /// Generated if not set.
    #[inline]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Compiles the group and returns all of its own services
    ///
    /// # Errors
    /// - Returns [`CompileErrorKind::MergeOutsideFactory`] if the calling factory has already returned
    /// - Returns the compile error of the merged features otherwise
    pub fn create(self) -> Result<MergedServices, CompileErrorKind> {
        self.compile()
    }

    /// Compiles the group and returns only the selected services
    ///
    /// # Errors
    /// - Returns [`CompileErrorKind::MissingService`] if the group doesn't define a selected name
    /// - Returns the errors of [`MergeWith::create`]
    pub fn create_selected(self, names: &[&str]) -> Result<MergedServices, CompileErrorKind> {
        let MergedServices { group, mut services } = self.compile()?;

        let mut selected = BTreeMap::new();
        for name in names {
            let Some(reference) = services.remove(*name) else {
                return Err(CompileErrorKind::MissingService {
                    name: name.to_string(),
                    group,
                });
            };
            selected.insert(name.to_string(), reference);
        }
        Ok(MergedServices { group, services: selected })
    }

    fn compile(self) -> Result<MergedServices, CompileErrorKind> {
        // Only a factory of the group itself may merge into it
        let (parent, frame) = match (self.parent.upgrade(), self.session.current_frame()) {
            (Some(parent), Some(frame)) if parent.is_compiling() && frame.group == parent.name() => (parent, frame),
            _ => {
                let err = CompileErrorKind::MergeOutsideFactory;
                error!("{}", err);
                return Err(err);
            }
        };

        let name = parent.child_name(self.name.as_deref())?;
        debug!(group = %name, feature = frame.feature, features = self.factories.len(), "Merging");

        let compiled = compile(
            FeatureGroup {
                name,
                factories: self.factories,
                surface: self.surface,
            },
            Some(parent),
            &self.session,
        )?;

        let services = compiled
            .exports
            .into_iter()
            .map(|(name, provides)| {
                let reference = AnyReference::new(&compiled.namespace, &name, provides);
                (name, reference)
            })
            .collect();
        Ok(MergedServices {
            group: compiled.namespace.name().to_string(),
            services,
        })
    }
}

/// Deferred references to services of a merged group
#[derive(Debug, Clone)]
pub struct MergedServices {
    group: String,
    services: BTreeMap<String, AnyReference>,
}

impl MergedServices {
    #[inline]
    #[must_use]
    pub fn group_name(&self) -> &str {
        &self.group
    }

    /// Typed reference to a service of the group.
    /// Returns `None` if there's no such service or it provides another type.
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self, name: &str) -> Option<Reference<T>> {
        self.services.get(name).cloned().and_then(AnyReference::downcast)
    }

    #[inline]
    #[must_use]
    pub fn get_any(&self, name: &str) -> Option<&AnyReference> {
        self.services.get(name)
    }

    #[inline]
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl IntoIterator for MergedServices {
    type Item = (String, AnyReference);
    type IntoIter = alloc::collections::btree_map::IntoIter<String, AnyReference>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.services.into_iter()
    }
}
