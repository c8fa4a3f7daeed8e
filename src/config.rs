use alloc::string::{String, ToString as _};

/// Config for a service
/// ## Fields
/// - `cache_provides`:
///   If `true`, the value provided by the service factory will be cached and reused.
///   If `false`, the factory is called on every access (transient service).
///
///   This does **not** affect the dependencies of the service.
///   Only the final result is cached if caching is applicable.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub cache_provides: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self { cache_provides: true }
    }
}

impl Config {
    #[inline]
    #[must_use]
    pub const fn transient() -> Self {
        Self { cache_provides: false }
    }
}

/// Options of a container build
/// ## Fields
/// - `name`:
///   Name of the root feature group. Names of merged groups are derived from it.
/// - `validate`:
///   If `true`, every reference created by features is checked after compilation:
///   the target should exist and provide the referenced type.
///   Otherwise a broken reference is only reported on first access.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub name: String,
    pub validate: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            name: "root".to_string(),
            validate: false,
        }
    }
}

impl BuildOptions {
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }
}
