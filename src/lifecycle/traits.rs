//! Lifecycle hook traits

use super::LifecycleError;
use async_trait::async_trait;
use std::future::Future;

/// Called before the application starts accepting requests.
///
/// Use this hook to:
/// - Open database pools
/// - Warm up caches
/// - Check that external services are reachable
#[async_trait]
pub trait OnStartup: Send + Sync + 'static {
    async fn on_startup(&self) -> Result<(), LifecycleError>;
}

/// Called once the server has stopped accepting requests.
///
/// Hooks run in **reverse order** of registration, so resources opened
/// first are released last.
#[async_trait]
pub trait OnShutdown: Send + Sync + 'static {
    async fn on_shutdown(&self) -> Result<(), LifecycleError>;
}

#[async_trait]
impl<F, Fut> OnStartup for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), LifecycleError>> + Send,
{
    async fn on_startup(&self) -> Result<(), LifecycleError> {
        (self)().await
    }
}

#[async_trait]
impl<F, Fut> OnShutdown for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), LifecycleError>> + Send,
{
    async fn on_shutdown(&self) -> Result<(), LifecycleError> {
        (self)().await
    }
}
