use crate::background::BackgroundTasks;
use crate::di::{Container, DependencyValue};
use crate::error::{FennecError, Result};
use crate::guard::Principal;
use crate::http::{IntoResponse, Request, Response};
use crate::validation::{Model, ValidatedModel};
use futures_util::future::BoxFuture;
use serde_json::Value;
use std::any::type_name;
use std::collections::HashMap;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

/// An HTTP endpoint.
///
/// Implemented for every `async fn(RequestContext) -> Result<R>` where `R`
/// converts into a response, so plain functions and closures can be
/// registered directly.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, cx: RequestContext) -> BoxFuture<'static, Result<Response>>;
}

impl<F, Fut, R> Handler for F
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
    R: IntoResponse,
{
    fn call(&self, cx: RequestContext) -> BoxFuture<'static, Result<Response>> {
        let fut = (self)(cx);
        Box::pin(async move { fut.await.map(IntoResponse::into_response) })
    }
}

/// Everything a handler can reach: the routed request, resolved
/// dependencies, the validated body, application services and the
/// request's background task queue.
pub struct RequestContext {
    request: Arc<Request>,
    dependencies: HashMap<String, DependencyValue>,
    model: Option<ValidatedModel>,
    container: Arc<Container>,
    background: BackgroundTasks,
}

impl RequestContext {
    pub(crate) fn new(
        request: Arc<Request>,
        dependencies: HashMap<String, DependencyValue>,
        model: Option<ValidatedModel>,
        container: Arc<Container>,
        background: BackgroundTasks,
    ) -> Self {
        Self {
            request,
            dependencies,
            model,
            container,
            background,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.request.path_param(name)
    }

    pub fn param_as<T: FromStr>(&self, name: &str) -> Result<T> {
        self.request.path_param_as(name)
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.request.query(name)
    }

    pub fn json(&self) -> Result<&Value> {
        self.request.json()
    }

    /// A dependency declared with `Route::depends_on`.
    pub fn dependency<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>> {
        let value = self
            .dependencies
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

    /// The validated body as `T`. Routes without a declared model validate
    /// against `T`'s schema here.
    pub fn body<T: Model>(&self) -> Result<T> {
        match &self.model {
            Some(model) => model.deserialize(),
            None => T::from_json(self.request.json()?),
        }
    }

    pub fn validated(&self) -> Option<&ValidatedModel> {
        self.model.as_ref()
    }

    /// An application-scoped service from the container.
    pub fn service<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.container.resolve::<T>()
    }

    pub fn service_trait<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.container.resolve_trait::<T>()
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.request.extensions().get::<Principal>()
    }

    pub fn background(&self) -> &BackgroundTasks {
        &self.background
    }
}
