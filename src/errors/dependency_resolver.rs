use alloc::{boxed::Box, string::String};

use super::{instantiate::InstantiateErrorKind, instantiator::InstantiatorErrorKind};
use crate::{any::TypeInfo, namespace::GroupStatus};

#[derive(thiserror::Error, Debug)]
pub enum ResolveErrorKind {
    #[error("Service `{name}` not found in container")]
    NoService { name: String },
    #[error(
        "Service `{name}` can't be resolved before group `{group}` is compiled. Actual status: {status:?}. \
        References are resolved only after the container is built."
    )]
    NotCompiled { name: String, group: String, status: GroupStatus },
    #[error("Incorrect type of service `{name}`. Actual: {actual}, expected: {expected}")]
    IncorrectType { name: String, expected: TypeInfo, actual: TypeInfo },
    #[error("Circular resolution of service `{name}`: it's requested again while its factory is still running")]
    CircularResolution { name: String },
    #[error("Service `{name}` can't be resolved: its container was dropped")]
    NoContainer { name: String },
    #[error("Service `{name}` failed: {source}")]
    Instantiator {
        name: String,
        source: InstantiatorErrorKind<Box<ResolveErrorKind>, InstantiateErrorKind>,
    },
}

impl ResolveErrorKind {
    /// Follows failed dependencies down to the error that started the chain
    #[must_use]
    pub fn root_cause(&self) -> &ResolveErrorKind {
        match self {
            Self::Instantiator {
                source: InstantiatorErrorKind::Deps(err),
                ..
            } => err.root_cause(),
            err => err,
        }
    }
}
