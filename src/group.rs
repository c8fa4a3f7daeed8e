use alloc::{
    collections::{BTreeMap, BTreeSet},
    format,
    string::{String, ToString as _},
    sync::Arc,
    vec::Vec,
};
use core::{
    mem,
    sync::atomic::{AtomicUsize, Ordering},
};
use parking_lot::Mutex;
use tracing::{debug, debug_span, error};

use crate::{
    any::TypeInfo,
    cache::ServiceSlot,
    config::Config,
    context::FeatureContext,
    definition::Definition,
    errors::CompileErrorKind,
    feature::BoxedFeatureFactory,
    namespace::{GroupStatus, Namespace},
    reference::AnyReference,
    registry::{Contribution, RegistryDecl, RegistryKind},
    session::{CompileSession, Frame},
    setup::{SetupCallback, SETUP_CALLBACKS},
};

/// What a group can see outside of its own definitions
pub(crate) enum Surface {
    /// Top-level group, owns the built-in registries
    Root,
    /// Sees everything its parent sees
    Full,
    /// Sees only the listed parent entries
    Narrow(Vec<String>),
}

pub(crate) struct FeatureGroup {
    pub(crate) name: String,
    pub(crate) factories: Vec<BoxedFeatureFactory>,
    pub(crate) surface: Surface,
}

pub(crate) struct CompiledGroup {
    pub(crate) namespace: Arc<Namespace>,
    /// Own entries of the group, imported names excluded
    pub(crate) exports: Vec<(String, TypeInfo)>,
}

#[derive(Default)]
struct PendingGroup {
    services: BTreeMap<String, Arc<ServiceSlot>>,
    registries: BTreeMap<String, RegistryDecl>,
    contributions: Vec<(String, Contribution)>,
    imported: BTreeSet<String>,
    children: BTreeSet<String>,
}

/// Group being compiled. Definitions are collected here and published to the namespace on freeze.
pub(crate) struct GroupState {
    pub(crate) namespace: Arc<Namespace>,
    parent: Option<Arc<GroupState>>,
    inherits: bool,
    pending: Mutex<PendingGroup>,
    merge_count: AtomicUsize,
}

impl GroupState {
    #[inline]
    #[must_use]
    pub(crate) fn name(&self) -> &str {
        self.namespace.name()
    }

    #[inline]
    #[must_use]
    pub(crate) fn is_compiling(&self) -> bool {
        self.namespace.status() == GroupStatus::Compiling
    }

    /// Type of a name declared so far in the group or visible from it
    #[must_use]
    pub(crate) fn declared(&self, name: &str) -> Option<TypeInfo> {
        {
            let pending = self.pending.lock();
            if let Some(slot) = pending.services.get(name) {
                return Some(slot.provides());
            }
            if let Some(decl) = pending.registries.get(name) {
                return Some(decl.provides);
            }
        }
        match &self.parent {
            Some(parent) if self.inherits => parent.declared(name),
            _ => None,
        }
    }

    pub(crate) fn declare_registry(&self, name: &str, decl: RegistryDecl) -> Result<(), CompileErrorKind> {
        let mut pending = self.pending.lock();
        if pending.services.contains_key(name) {
            return Err(CompileErrorKind::DuplicateService {
                name: name.to_string(),
                group: self.name().to_string(),
            });
        }
        match pending.registries.get(name) {
            Some(existing) if existing.same_as(&decl) => {}
            Some(existing) => {
                return Err(CompileErrorKind::RegistryTypeMismatch {
                    name: name.to_string(),
                    expected: existing.provides,
                    actual: decl.provides,
                });
            }
            None => {
                debug!(registry = %name, item = decl.item.short_name(), "Registry declared");
                pending.registries.insert(name.to_string(), decl);
            }
        }
        Ok(())
    }

    pub(crate) fn contribute(&self, registry: &str, key: Option<String>, definition: Definition) {
        let slot_name = match &key {
            Some(key) => format!("{registry}[{key}]"),
            None => format!("{registry}[]"),
        };
        let contribution = Contribution {
            key,
            slot: definition.into_slot(&slot_name),
        };
        self.pending.lock().contributions.push((registry.to_string(), contribution));
    }

    /// Name of the next merged group, unique among siblings
    pub(crate) fn child_name(&self, explicit: Option<&str>) -> Result<String, CompileErrorKind> {
        let mut pending = self.pending.lock();
        let name = match explicit {
            Some(explicit) => {
                let name = format!("{}.{explicit}", self.name());
                if pending.children.contains(&name) {
                    return Err(CompileErrorKind::DuplicateService {
                        name,
                        group: self.name().to_string(),
                    });
                }
                name
            }
            None => loop {
                let index = self.merge_count.fetch_add(1, Ordering::Relaxed) + 1;
                let name = format!("{}.merge-{index}", self.name());
                if !pending.children.contains(&name) {
                    break name;
                }
            },
        };
        pending.children.insert(name.clone());
        Ok(name)
    }

    fn define(&self, name: String, definition: Definition) -> Result<(), CompileErrorKind> {
        let mut pending = self.pending.lock();
        if pending.services.contains_key(&name) || pending.registries.contains_key(&name) {
            return Err(CompileErrorKind::DuplicateService {
                name,
                group: self.name().to_string(),
            });
        }
        let slot = definition.into_slot(&name);
        debug!(service = %name, provides = slot.provides().short_name(), "Service defined");
        pending.services.insert(name, slot);
        Ok(())
    }

    fn override_with(&self, name: String, definition: Definition) -> Result<(), CompileErrorKind> {
        let mut pending = self.pending.lock();
        if pending.registries.contains_key(&name) {
            return Err(CompileErrorKind::OverrideRegistry {
                name,
                group: self.name().to_string(),
            });
        }
        let Some(slot) = pending.services.get_mut(&name) else {
            return Err(CompileErrorKind::OverrideTargetMissing {
                name,
                group: self.name().to_string(),
            });
        };
        if slot.provides() != definition.provides() {
            return Err(CompileErrorKind::IncorrectType {
                name,
                expected: slot.provides(),
                actual: definition.provides(),
            });
        }
        *slot = definition.into_slot(&name);
        debug!(service = %name, "Service overridden");
        Ok(())
    }

    fn import(&self, names: &[String]) -> Result<(), CompileErrorKind> {
        let Some(parent) = &self.parent else {
            return Ok(());
        };
        for name in names {
            let Some(provides) = parent.declared(name) else {
                return Err(CompileErrorKind::MissingService {
                    name: name.clone(),
                    group: parent.name().to_string(),
                });
            };
            let slot = Definition::alias(AnyReference::new(&parent.namespace, name, provides)).into_slot(name);
            let mut pending = self.pending.lock();
            pending.services.insert(name.clone(), slot);
            pending.imported.insert(name.clone());
        }
        Ok(())
    }

    fn freeze(&self) -> Result<CompiledGroup, CompileErrorKind> {
        let PendingGroup {
            mut services,
            registries,
            contributions,
            imported,
            ..
        } = mem::take(&mut *self.pending.lock());

        let mut routed: BTreeMap<&str, Vec<Contribution>> = BTreeMap::new();
        let mut forwarded = Vec::new();
        for (registry, contribution) in contributions {
            let Some((name, decl)) = registries.get_key_value(&registry) else {
                if self.parent.is_some() {
                    forwarded.push((registry, contribution));
                    continue;
                }
                return Err(CompileErrorKind::MissingService {
                    name: registry,
                    group: self.name().to_string(),
                });
            };
            if contribution.slot.provides() != decl.item {
                return Err(CompileErrorKind::RegistryTypeMismatch {
                    name: registry,
                    expected: decl.item,
                    actual: contribution.slot.provides(),
                });
            }
            routed.entry(name.as_str()).or_default().push(contribution);
        }

        for (name, decl) in &registries {
            let items = routed.remove(name.as_str()).unwrap_or_default();
            if decl.kind == RegistryKind::Map {
                let mut keys = BTreeSet::new();
                for key in items.iter().filter_map(|item| item.key.as_deref()) {
                    if !keys.insert(key) {
                        return Err(CompileErrorKind::DuplicateKey {
                            name: name.clone(),
                            key: key.to_string(),
                        });
                    }
                }
            }
            debug!(registry = %name, items = items.len(), "Registry collected");

            let collect = decl.collect;
            let items: Arc<[Contribution]> = items.into();
            services.insert(
                name.clone(),
                Arc::new(ServiceSlot::new(
                    name.clone(),
                    decl.provides,
                    Config::default(),
                    Arc::new(move || collect(&items)),
                )),
            );
        }

        if let Some(parent) = &self.parent {
            if !forwarded.is_empty() {
                debug!(parent = parent.name(), contributions = forwarded.len(), "Contributions forwarded");
                parent.pending.lock().contributions.extend(forwarded);
            }
        }

        let exports = services
            .iter()
            .filter(|(name, _)| !imported.contains(*name))
            .map(|(name, slot)| (name.clone(), slot.provides()))
            .collect();
        self.namespace.freeze(services);

        Ok(CompiledGroup {
            namespace: self.namespace.clone(),
            exports,
        })
    }
}

/// Compiles the group eagerly: runs its factories in order and freezes the result.
///
/// The namespace of a merged group is owned by the parent namespace.
pub(crate) fn compile(
    group: FeatureGroup,
    parent: Option<Arc<GroupState>>,
    session: &CompileSession,
) -> Result<CompiledGroup, CompileErrorKind> {
    let span = debug_span!("compile", group = %group.name);
    let _guard = span.enter();

    let inherits = matches!(group.surface, Surface::Full);
    let namespace = Arc::new(Namespace::new(
        group.name,
        match &parent {
            Some(parent) if inherits => Some(Arc::downgrade(&parent.namespace)),
            _ => None,
        },
    ));
    if let Some(parent) = &parent {
        parent.namespace.adopt(namespace.clone());
    }

    let state = Arc::new(GroupState {
        namespace,
        parent,
        inherits,
        pending: Mutex::new(PendingGroup::default()),
        merge_count: AtomicUsize::new(0),
    });
    state.namespace.set_status(GroupStatus::Compiling);

    match run(&state, group.factories, group.surface, session) {
        Ok(compiled) => {
            debug!(services = compiled.exports.len(), "Group compiled");
            Ok(compiled)
        }
        Err(err) => {
            state.namespace.set_status(GroupStatus::Failed);
            error!("{}", err);
            Err(err)
        }
    }
}

fn run(
    state: &Arc<GroupState>,
    factories: Vec<BoxedFeatureFactory>,
    surface: Surface,
    session: &CompileSession,
) -> Result<CompiledGroup, CompileErrorKind> {
    match surface {
        Surface::Root => state.declare_registry(SETUP_CALLBACKS, RegistryDecl::list::<SetupCallback>())?,
        Surface::Narrow(names) => state.import(&names)?,
        Surface::Full => {}
    }

    for factory in factories {
        let feature = factory.name();
        let span = debug_span!("feature", feature);
        let _guard = span.enter();

        let (definition, overrides) = {
            let _frame = session.enter(Frame {
                feature,
                group: state.name().to_string(),
            });
            let mut context = FeatureContext::new(state.clone(), session.clone());
            let definition = factory.define(&mut context)?;
            (definition, context.into_overrides())
        };

        for (name, definition) in definition.into_entries() {
            state.define(name, definition)?;
        }
        for (name, definition) in overrides {
            state.override_with(name, definition)?;
        }
        debug!("Feature merged");
    }

    state.freeze()
}
