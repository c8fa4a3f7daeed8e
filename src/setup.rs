use alloc::{boxed::Box, sync::Arc};
use core::{
    fmt::{self, Debug, Formatter},
    future::Future,
};
use tracing::{debug, error};

use crate::{errors::SetupErrorKind, registry::RegistryList, utils::future::BoxFuture};

/// Name of the built-in list registry holding [`SetupCallback`]s
pub const SETUP_CALLBACKS: &str = "setupCallbacks";

/// Async side-effect run once after the container is compiled
#[derive(Clone)]
pub struct SetupCallback(Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>);

impl SetupCallback {
    #[must_use]
    pub fn new<F, Fut>(callback: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self(Arc::new(move || -> BoxFuture<'static, anyhow::Result<()>> { Box::pin(callback()) }))
    }

    #[inline]
    pub fn call(&self) -> impl Future<Output = anyhow::Result<()>> + Send + 'static {
        (self.0)()
    }
}

impl Debug for SetupCallback {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetupCallback").finish_non_exhaustive()
    }
}

/// Runs callbacks one at a time in registry order, stops on the first failure
pub(crate) async fn run_setups(callbacks: &RegistryList<SetupCallback>) -> Result<(), SetupErrorKind> {
    for (index, callback) in callbacks.iter().enumerate() {
        if let Err(source) = callback.call().await {
            let err = SetupErrorKind::Failed { index, source };
            error!("{}", err);
            return Err(err);
        }
        debug!(index, "Setup callback finished");
    }
    Ok(())
}
