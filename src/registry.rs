use alloc::{string::String, sync::Arc, vec::Vec};
use core::{
    fmt::{self, Debug, Formatter},
    ops::Deref,
    slice,
};

use crate::{
    any::{RcAny, TypeInfo},
    cache::ServiceSlot,
    errors::{InstantiateErrorKind, ResolveErrorKind},
};

/// Ordered items contributed to a list registry.
///
/// Items follow the order of contributions: features in declaration order,
/// contributions of a merged group as one block at the merge call site.
pub struct RegistryList<T>(Vec<Arc<T>>);

impl<T> RegistryList<T> {
    #[inline]
    #[must_use]
    pub fn items(&self) -> &[Arc<T>] {
        &self.0
    }
}

impl<T> Deref for RegistryList<T> {
    type Target = [Arc<T>];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'a, T> IntoIterator for &'a RegistryList<T> {
    type Item = &'a Arc<T>;
    type IntoIter = slice::Iter<'a, Arc<T>>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<T: Debug> Debug for RegistryList<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

/// Keyed items contributed to a map registry, in contribution order
pub struct RegistryMap<T>(Vec<(String, Arc<T>)>);

impl<T> RegistryMap<T> {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Arc<T>> {
        self.0.iter().find(|(item_key, _)| item_key == key).map(|(_, value)| value)
    }

    #[inline]
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(key, _)| key.as_str())
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<T>)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T: Debug> Debug for RegistryMap<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.iter().map(|(key, value)| (key, value))).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RegistryKind {
    List,
    Map,
}

/// One contributed item, evaluated lazily as any other service
#[derive(Clone)]
pub(crate) struct Contribution {
    pub(crate) key: Option<String>,
    pub(crate) slot: Arc<ServiceSlot>,
}

type Collect = fn(&[Contribution]) -> Result<RcAny, InstantiateErrorKind>;

#[derive(Clone, Copy)]
pub(crate) struct RegistryDecl {
    pub(crate) kind: RegistryKind,
    pub(crate) item: TypeInfo,
    pub(crate) provides: TypeInfo,
    pub(crate) collect: Collect,
}

impl RegistryDecl {
    #[inline]
    #[must_use]
    pub(crate) fn list<T: Send + Sync + 'static>() -> Self {
        Self {
            kind: RegistryKind::List,
            item: TypeInfo::of::<T>(),
            provides: TypeInfo::of::<RegistryList<T>>(),
            collect: collect_list::<T>,
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn map<T: Send + Sync + 'static>() -> Self {
        Self {
            kind: RegistryKind::Map,
            item: TypeInfo::of::<T>(),
            provides: TypeInfo::of::<RegistryMap<T>>(),
            collect: collect_map::<T>,
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn same_as(&self, other: &Self) -> bool {
        self.kind == other.kind && self.item == other.item
    }
}

fn resolve_item<T: Send + Sync + 'static>(slot: &ServiceSlot) -> Result<Arc<T>, InstantiateErrorKind> {
    match slot.resolve()?.downcast::<T>() {
        Ok(value) => Ok(value),
        Err(_) => Err(ResolveErrorKind::IncorrectType {
            name: slot.name(),
            expected: TypeInfo::of::<T>(),
            actual: slot.provides(),
        }
        .into()),
    }
}

fn collect_list<T: Send + Sync + 'static>(contributions: &[Contribution]) -> Result<RcAny, InstantiateErrorKind> {
    let items = contributions
        .iter()
        .map(|Contribution { slot, .. }| resolve_item::<T>(slot))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Arc::new(RegistryList(items)))
}

fn collect_map<T: Send + Sync + 'static>(contributions: &[Contribution]) -> Result<RcAny, InstantiateErrorKind> {
    let mut items = Vec::with_capacity(contributions.len());
    for Contribution { key, slot } in contributions {
        items.push((key.clone().unwrap_or_default(), resolve_item::<T>(slot)?));
    }
    Ok(Arc::new(RegistryMap(items)))
}
