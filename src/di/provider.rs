use super::Container;
use crate::error::{BoxError, FennecError, Result};
use crate::http::Request;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::any::{Any, type_name};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// A resolved dependency, type-erased.
pub type DependencyValue = Arc<dyn Any + Send + Sync>;

/// Release step of a scoped dependency, run once after the response is
/// finalized.
pub type Cleanup = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// What a provider hands back: the value and an optional release step.
pub struct Provision {
    pub(crate) value: DependencyValue,
    pub(crate) cleanup: Option<Cleanup>,
}

impl Provision {
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self::shared(Arc::new(value))
    }

    pub fn shared<T: Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            value,
            cleanup: None,
        }
    }

    pub fn with_cleanup<F, Fut>(mut self, cleanup: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cleanup = Some(Box::new(move || Box::pin(cleanup())));
        self
    }
}

/// What a provider can see while producing its value.
#[derive(Clone)]
pub struct DependencyContext {
    request: Arc<Request>,
    resolved: HashMap<String, DependencyValue>,
    container: Arc<Container>,
}

impl DependencyContext {
    pub(crate) fn new(
        request: Arc<Request>,
        resolved: HashMap<String, DependencyValue>,
        container: Arc<Container>,
    ) -> Self {
        Self {
            request,
            resolved,
            container,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// One of this provider's own declared dependencies.
    pub fn get<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>> {
        let value = self
            .resolved
            .get(name)
            .ok_or_else(|| FennecError::DependencyNotFound(name.to_string()))?;
        Arc::clone(value).downcast::<T>().map_err(|_| {
            FennecError::internal(format!(
                "Dependency '{}' is not a {}",
                name,
                type_name::<T>()
            ))
        })
    }

    pub fn service<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.container.resolve::<T>()
    }
}

/// Produces a named dependency for one request.
#[async_trait]
pub trait Provider: Send + Sync + 'static {
    /// Names of the dependencies this provider needs first.
    fn dependencies(&self) -> &[String] {
        &[]
    }

    async fn provide(&self, cx: DependencyContext) -> std::result::Result<Provision, BoxError>;
}

/// Provider backed by an async function.
pub struct FnProvider<F> {
    f: F,
    dependencies: Vec<String>,
}

/// Wrap `async fn(DependencyContext) -> Result<T, E>` as a provider.
pub fn provider_fn<F, Fut, T, E>(f: F) -> FnProvider<F>
where
    F: Fn(DependencyContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
{
    FnProvider {
        f,
        dependencies: Vec::new(),
    }
}

impl<F> FnProvider<F> {
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(name.into());
        self
    }
}

#[async_trait]
impl<F, Fut, T, E> Provider for FnProvider<F>
where
    F: Fn(DependencyContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    T: Send + Sync + 'static,
    E: Into<BoxError> + 'static,
{
    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    async fn provide(&self, cx: DependencyContext) -> std::result::Result<Provision, BoxError> {
        let value = (self.f)(cx).await.map_err(Into::into)?;
        Ok(Provision::new(value))
    }
}

/// A provider with an acquire/release pair.
///
/// The value is acquired when first needed in a request and released
/// after the response is finalized, including when the handler fails or
/// the request is cancelled.
pub struct ScopedProvider<A, R> {
    acquire: A,
    release: Arc<R>,
    dependencies: Vec<String>,
}

pub fn scoped<A, R, Fut, RFut, T, E>(acquire: A, release: R) -> ScopedProvider<A, R>
where
    A: Fn(DependencyContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    R: Fn(Arc<T>) -> RFut + Send + Sync + 'static,
    RFut: Future<Output = ()> + Send + 'static,
{
    ScopedProvider {
        acquire,
        release: Arc::new(release),
        dependencies: Vec::new(),
    }
}

impl<A, R> ScopedProvider<A, R> {
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(name.into());
        self
    }
}

#[async_trait]
impl<A, R, Fut, RFut, T, E> Provider for ScopedProvider<A, R>
where
    A: Fn(DependencyContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    R: Fn(Arc<T>) -> RFut + Send + Sync + 'static,
    RFut: Future<Output = ()> + Send + 'static,
    T: Send + Sync + 'static,
    E: Into<BoxError> + 'static,
{
    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    async fn provide(&self, cx: DependencyContext) -> std::result::Result<Provision, BoxError> {
        let value = Arc::new((self.acquire)(cx).await.map_err(Into::into)?);
        let release = Arc::clone(&self.release);
        let held = Arc::clone(&value);
        Ok(Provision::shared(value).with_cleanup(move || (*release)(held)))
    }
}
