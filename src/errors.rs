mod compile;
mod container;
mod dependency_resolver;
mod instantiate;
mod instantiator;

pub use compile::CompileErrorKind;
pub use container::{BuildErrorKind, SetupErrorKind};
pub use dependency_resolver::ResolveErrorKind;
pub use instantiate::InstantiateErrorKind;
pub use instantiator::InstantiatorErrorKind;

use crate::definition::FeatureDefinition;

/// Result of a feature factory
pub type FeatureResult<Err = CompileErrorKind> = Result<FeatureDefinition, Err>;
