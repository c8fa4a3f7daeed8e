use alloc::{
    collections::BTreeMap,
    string::{String, ToString as _},
    sync::{Arc, Weak},
    vec::Vec,
};
use core::sync::atomic::{AtomicU8, Ordering};
use parking_lot::{Mutex, RwLock};
use tracing::warn;

use crate::{
    any::{RcAny, TypeInfo},
    cache::ServiceSlot,
    errors::ResolveErrorKind,
};

/// Compilation status of a feature group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GroupStatus {
    Uncompiled,
    Compiling,
    Compiled,
    Failed,
}

impl GroupStatus {
    #[inline]
    const fn from_u8(val: u8) -> Self {
        match val {
            0 => Self::Uncompiled,
            1 => Self::Compiling,
            2 => Self::Compiled,
            _ => Self::Failed,
        }
    }
}

/// Entries of one feature group.
///
/// Filled once when the group is frozen, read-only afterwards.
/// A namespace owns the namespaces of its merged groups, links in other directions are weak.
pub(crate) struct Namespace {
    name: String,
    status: AtomicU8,
    entries: RwLock<BTreeMap<String, Arc<ServiceSlot>>>,
    parent: Option<Weak<Namespace>>,
    children: Mutex<Vec<Arc<Namespace>>>,
}

impl Namespace {
    #[inline]
    #[must_use]
    pub(crate) fn new(name: impl Into<String>, parent: Option<Weak<Namespace>>) -> Self {
        Self {
            name: name.into(),
            status: AtomicU8::new(GroupStatus::Uncompiled as u8),
            entries: RwLock::new(BTreeMap::new()),
            parent,
            children: Mutex::new(Vec::new()),
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub(crate) fn status(&self) -> GroupStatus {
        GroupStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn set_status(&self, status: GroupStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    pub(crate) fn adopt(&self, child: Arc<Namespace>) {
        self.children.lock().push(child);
    }

    pub(crate) fn freeze(&self, entries: BTreeMap<String, Arc<ServiceSlot>>) {
        *self.entries.write() = entries;
        self.set_status(GroupStatus::Compiled);
    }

    #[must_use]
    pub(crate) fn names(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Finds a slot without status checks, used by validation
    #[must_use]
    pub(crate) fn find(&self, name: &str) -> Option<Arc<ServiceSlot>> {
        if let Some(slot) = self.entries.read().get(name) {
            return Some(slot.clone());
        }
        self.parent.as_ref().and_then(Weak::upgrade).and_then(|parent| parent.find(name))
    }

    pub(crate) fn slot(&self, name: &str) -> Result<Arc<ServiceSlot>, ResolveErrorKind> {
        let status = self.status();
        if status != GroupStatus::Compiled {
            return Err(ResolveErrorKind::NotCompiled {
                name: name.to_string(),
                group: self.name.clone(),
                status,
            });
        }

        if let Some(slot) = self.entries.read().get(name) {
            return Ok(slot.clone());
        }
        match self.parent.as_ref().and_then(Weak::upgrade) {
            Some(parent) => parent.slot(name),
            None => {
                let err = ResolveErrorKind::NoService { name: name.to_string() };
                warn!(group = %self.name, "{}", err);
                Err(err)
            }
        }
    }

    #[inline]
    pub(crate) fn resolve(&self, name: &str) -> Result<RcAny, ResolveErrorKind> {
        self.slot(name)?.resolve()
    }

    pub(crate) fn resolve_typed<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, ResolveErrorKind> {
        let slot = self.slot(name)?;
        match slot.resolve()?.downcast::<T>() {
            Ok(value) => Ok(value),
            Err(_) => Err(ResolveErrorKind::IncorrectType {
                name: name.to_string(),
                expected: TypeInfo::of::<T>(),
                actual: slot.provides(),
            }),
        }
    }
}
