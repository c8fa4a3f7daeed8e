use alloc::string::String;

use crate::any::TypeInfo;

#[derive(thiserror::Error, Debug)]
pub enum CompileErrorKind {
    #[error("Service `{name}` is already defined in group `{group}`")]
    DuplicateService { name: String, group: String },
    #[error("Can't override service `{name}`: it isn't defined in group `{group}`")]
    OverrideTargetMissing { name: String, group: String },
    #[error("Can't override `{name}` in group `{group}`: registries are append-only")]
    OverrideRegistry { name: String, group: String },
    #[error("Service `{name}` isn't declared in group `{group}` or visible from it")]
    MissingService { name: String, group: String },
    #[error("Incorrect type of service `{name}`. Actual: {actual}, expected: {expected}")]
    IncorrectType { name: String, expected: TypeInfo, actual: TypeInfo },
    #[error("Registry `{name}` holds `{expected}`, but `{actual}` was used")]
    RegistryTypeMismatch { name: String, expected: TypeInfo, actual: TypeInfo },
    #[error("Key `{key}` is already registered in map registry `{name}`")]
    DuplicateKey { name: String, key: String },
    #[error("Can only merge inside a feature factory")]
    MergeOutsideFactory,
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
}
