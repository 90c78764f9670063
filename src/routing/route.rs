use super::{PathPattern, RouteEntry, join_paths};
use crate::guard::Guard;
use crate::handler::Handler;
use crate::validation::{Model, ModelInfo, ModelSchema};
use axum::http::Method;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// An HTTP route: method, path pattern, handler and the metadata the
/// dispatcher needs before calling it.
///
/// # Example
/// ```ignore
/// let route = Route::post("/users", create_user)
///     .model::<CreateUser>()
///     .depends_on("db")
///     .name("create_user");
/// ```
#[derive(Clone)]
pub struct Route {
    method: Method,
    path: String,
    handler: Arc<dyn Handler>,
    dependencies: Vec<String>,
    model: Option<Arc<ModelSchema>>,
    guards: Vec<Arc<dyn Guard>>,
    name: Option<String>,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("dependencies", &self.dependencies)
            .field("model", &self.model.as_ref().map(|m| m.name().to_string()))
            .field("guards", &self.guards.len())
            .field("name", &self.name)
            .finish()
    }
}

impl Route {
    pub fn new(method: Method, path: impl Into<String>, handler: impl Handler) -> Self {
        Self {
            method,
            path: path.into(),
            handler: Arc::new(handler),
            dependencies: Vec::new(),
            model: None,
            guards: Vec::new(),
            name: None,
        }
    }

    pub fn get(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::GET, path, handler)
    }

    pub fn post(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::POST, path, handler)
    }

    pub fn put(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::PUT, path, handler)
    }

    pub fn patch(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::PATCH, path, handler)
    }

    pub fn delete(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::DELETE, path, handler)
    }

    /// Declare a named dependency resolved before the handler runs.
    pub fn depends_on(mut self, dependency: impl Into<String>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    /// Validate the JSON body against `T`'s schema.
    pub fn model<T: Model>(self) -> Self {
        self.schema(T::schema())
    }

    pub fn schema(mut self, schema: ModelSchema) -> Self {
        self.model = Some(Arc::new(schema));
        self
    }

    pub fn guard(mut self, guard: impl Guard) -> Self {
        self.guards.push(Arc::new(guard));
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn model_schema(&self) -> Option<&Arc<ModelSchema>> {
        self.model.as_ref()
    }

    pub fn guards(&self) -> &[Arc<dyn Guard>] {
        &self.guards
    }

    pub fn route_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn with_prefix(mut self, prefix: &str) -> Self {
        self.path = join_paths(prefix, &self.path);
        self
    }

    pub(crate) fn info(&self, pattern: &PathPattern) -> RouteInfo {
        RouteInfo {
            method: self.method.to_string(),
            path: pattern.as_str().to_string(),
            name: self.name.clone(),
            params: pattern.param_names().into_iter().map(str::to_string).collect(),
            dependencies: self.dependencies.clone(),
            model: self.model.as_ref().map(|m| m.describe()),
            websocket: false,
        }
    }
}

impl RouteEntry for Route {
    fn method(&self) -> &Method {
        &self.method
    }

    fn path(&self) -> &str {
        &self.path
    }
}

/// Introspectable route metadata, enough for an OpenAPI generator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteInfo {
    pub method: String,
    pub path: String,
    pub name: Option<String>,
    pub params: Vec<String>,
    pub dependencies: Vec<String>,
    pub model: Option<ModelInfo>,
    pub websocket: bool,
}
