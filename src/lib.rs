#![no_std]

extern crate alloc;

#[macro_use]
pub(crate) mod macros;

pub(crate) mod any;
pub(crate) mod cache;
pub(crate) mod config;
pub(crate) mod container;
pub(crate) mod context;
pub(crate) mod definition;
pub(crate) mod dependency_resolver;
pub(crate) mod errors;
pub(crate) mod feature;
pub(crate) mod group;
pub(crate) mod instantiator;
pub(crate) mod merge;
pub(crate) mod namespace;
pub(crate) mod reference;
pub(crate) mod registry;
pub(crate) mod session;
pub(crate) mod setup;
pub(crate) mod utils;

pub use any::{RcAny, TypeInfo};
pub use config::{BuildOptions, Config};
pub use container::{create_container, Container, ContainerBuilder};
pub use context::FeatureContext;
pub use definition::{Definition, FeatureDefinition};
pub use dependency_resolver::{DependencyResolver, ResolvedDependency};
pub use errors::{
    BuildErrorKind, CompileErrorKind, FeatureResult, InstantiateErrorKind, InstantiatorErrorKind, ResolveErrorKind, SetupErrorKind,
};
pub use feature::FeatureFactory;
pub use instantiator::{instance, Construct, Constructor};
pub use merge::{MergeWith, MergedServices};
pub use namespace::GroupStatus;
pub use reference::{AnyReference, Reference};
pub use registry::{RegistryList, RegistryMap};
pub use setup::{SetupCallback, SETUP_CALLBACKS};
