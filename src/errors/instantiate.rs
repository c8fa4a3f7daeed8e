use alloc::boxed::Box;

use super::{compile::CompileErrorKind, dependency_resolver::ResolveErrorKind};

#[derive(thiserror::Error, Debug)]
pub enum InstantiateErrorKind {
    #[error(transparent)]
    Dependency(Box<ResolveErrorKind>),
    #[error("Constructor of `{type_name}` takes {expected} dependencies, but {actual} names were given")]
    ArityMismatch {
        type_name: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error(transparent)]
    Compile(Box<CompileErrorKind>),
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
}

impl From<ResolveErrorKind> for InstantiateErrorKind {
    #[inline]
    fn from(err: ResolveErrorKind) -> Self {
        Self::Dependency(Box::new(err))
    }
}

impl From<CompileErrorKind> for InstantiateErrorKind {
    #[inline]
    fn from(err: CompileErrorKind) -> Self {
        Self::Compile(Box::new(err))
    }
}
