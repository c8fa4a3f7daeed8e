use super::{compile::CompileErrorKind, dependency_resolver::ResolveErrorKind};

#[derive(thiserror::Error, Debug)]
pub enum SetupErrorKind {
    #[error("Setup callbacks can't be resolved: {0}")]
    Resolve(#[from] ResolveErrorKind),
    #[error("Setup callback #{index} failed: {source}")]
    Failed {
        index: usize,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum BuildErrorKind {
    #[error(transparent)]
    Compile(#[from] CompileErrorKind),
    #[error("Container validation failed: {0}")]
    Validation(ResolveErrorKind),
    #[error(transparent)]
    Setup(#[from] SetupErrorKind),
}
