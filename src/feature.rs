use alloc::sync::Arc;
use core::any::type_name;

use crate::{context::FeatureContext, errors::FeatureResult};

/// Unit of composition: receives a [`FeatureContext`] and returns the services it exposes.
///
/// Implemented for closures `Fn(&mut FeatureContext) -> FeatureResult`.
/// Implement it for a type to give the feature a readable name in logs and errors.
pub trait FeatureFactory: Send + Sync + 'static {
    #[inline]
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }

    /// # Errors
    /// Returns an error if the feature can't be defined, the build fails with it
    fn define(&self, context: &mut FeatureContext) -> FeatureResult;
}

impl<F> FeatureFactory for F
where
    F: Fn(&mut FeatureContext) -> FeatureResult + Send + Sync + 'static,
{
    #[inline]
    fn define(&self, context: &mut FeatureContext) -> FeatureResult {
        self(context)
    }
}

pub(crate) type BoxedFeatureFactory = Arc<dyn FeatureFactory>;
