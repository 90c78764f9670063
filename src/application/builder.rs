use super::{Application, Inner};
use crate::config::Settings;
use crate::di::{Container, DependencyRegistry, Provider};
use crate::dispatch::{AccessLog, Dispatcher, TracingAccessLog};
use crate::error::{ErrorKind, FennecError};
use crate::exception::{ExceptionFilter, ExceptionFilters, FnFilter};
use crate::handler::Handler;
use crate::http::{Request, Response};
use crate::lifecycle::{LifecycleManager, OnShutdown, OnStartup};
use crate::middleware::{Middleware, MiddlewareChain};
use crate::routing::{Route, RouteError, RouteTable, Router};
use crate::websocket::{ConnectionManager, WebSocketRoute, WsHandler};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

/// Collects routes, middleware, dependencies, services and hooks, then
/// freezes them into an [`Application`].
pub struct ApplicationBuilder {
    title: String,
    settings: Settings,
    routes: Vec<Route>,
    websockets: Vec<WebSocketRoute>,
    middleware: Vec<Arc<dyn Middleware>>,
    registry: DependencyRegistry,
    container: Container,
    filters: ExceptionFilters,
    access_log: Arc<dyn AccessLog>,
    lifecycle: LifecycleManager,
}

impl Default for ApplicationBuilder {
    fn default() -> Self {
        Self {
            title: "Fennec".to_string(),
            settings: Settings::default(),
            routes: Vec::new(),
            websockets: Vec::new(),
            middleware: Vec::new(),
            registry: DependencyRegistry::new(),
            container: Container::new(),
            filters: ExceptionFilters::new(),
            access_log: Arc::new(TracingAccessLog),
            lifecycle: LifecycleManager::new(),
        }
    }
}

impl ApplicationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Settings are also registered in the container, so providers and
    /// handlers can read them with `service::<Settings>()`.
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.route(Route::get(path, handler))
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.route(Route::post(path, handler))
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.route(Route::put(path, handler))
    }

    pub fn patch(self, path: &str, handler: impl Handler) -> Self {
        self.route(Route::patch(path, handler))
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.route(Route::delete(path, handler))
    }

    /// Merge a router's routes under `prefix`.
    pub fn include_router(mut self, router: Router, prefix: &str) -> Self {
        let (routes, websockets) = Router::new(prefix).include(router).into_routes();
        self.routes.extend(routes);
        self.websockets.extend(websockets);
        self
    }

    pub fn websocket(mut self, path: &str, handler: impl WsHandler) -> Self {
        self.websockets.push(WebSocketRoute::new(path, handler));
        self
    }

    /// Middleware wrap each other in registration order: the first one
    /// added is the outermost.
    pub fn middleware(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn dependency(mut self, name: impl Into<String>, provider: impl Provider) -> Self {
        self.registry.register(name, provider);
        self
    }

    pub fn dependency_uncached(mut self, name: impl Into<String>, provider: impl Provider) -> Self {
        self.registry.register_uncached(name, provider);
        self
    }

    pub fn override_dependency(mut self, name: impl Into<String>, provider: impl Provider) -> Self {
        self.registry.override_with(name, provider);
        self
    }

    /// Register an application-scoped service.
    pub fn service<T: Send + Sync + 'static>(mut self, service: T) -> Self {
        self.container.register(service);
        self
    }

    pub fn service_arc<T: Send + Sync + 'static>(mut self, service: Arc<T>) -> Self {
        self.container.register_arc(service);
        self
    }

    /// Make a registered `Impl` resolvable as `Arc<Trait>`.
    pub fn bind_trait<Trait, Impl, F>(mut self, caster: F) -> Self
    where
        Trait: ?Sized + Send + Sync + 'static,
        Impl: Send + Sync + 'static,
        F: Fn(Arc<Impl>) -> Arc<Trait> + Send + Sync + 'static,
    {
        self.container.register_trait::<Trait, Impl, F>(caster);
        self
    }

    pub fn exception_handler<F>(mut self, kind: ErrorKind, handler: F) -> Self
    where
        F: Fn(&Request, &FennecError) -> Response + Send + Sync + 'static,
    {
        self.filters.register(kind, FnFilter(handler));
        self
    }

    pub fn exception_filter(mut self, kind: ErrorKind, filter: impl ExceptionFilter) -> Self {
        self.filters.register(kind, filter);
        self
    }

    /// Handler for every error kind without its own handler.
    pub fn fallback_exception_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Request, &FennecError) -> Response + Send + Sync + 'static,
    {
        self.filters.set_fallback(FnFilter(handler));
        self
    }

    pub fn access_log(mut self, sink: impl AccessLog) -> Self {
        self.access_log = Arc::new(sink);
        self
    }

    pub fn on_startup(mut self, name: impl Into<String>, hook: impl OnStartup) -> Self {
        self.lifecycle.register_startup(Arc::new(hook), name);
        self
    }

    pub fn on_shutdown(mut self, name: impl Into<String>, hook: impl OnShutdown) -> Self {
        self.lifecycle.register_shutdown(Arc::new(hook), name);
        self
    }

    pub fn lifecycle_timeout(mut self, timeout: Duration) -> Self {
        self.lifecycle = self.lifecycle.with_timeout(timeout);
        self
    }

    /// Compile the route tables. Fails on duplicate or malformed routes.
    pub fn build(mut self) -> Result<Application, RouteError> {
        let mut routes = RouteTable::new();
        for route in self.routes {
            for name in route.dependencies() {
                if !self.registry.contains(name) {
                    tracing::warn!(
                        "Route {} {} depends on unregistered '{}'",
                        crate::routing::RouteEntry::method(&route),
                        crate::routing::RouteEntry::path(&route),
                        name
                    );
                }
            }
            routes.insert(route)?;
        }

        let mut websockets = RouteTable::new();
        for route in self.websockets {
            websockets.insert(route)?;
        }

        if !self.container.contains::<Settings>() {
            self.container.register(self.settings.clone());
        }

        let dispatcher = Dispatcher::new(
            routes,
            MiddlewareChain::new(self.middleware),
            Arc::new(self.registry),
            Arc::new(self.container),
            self.filters,
            self.access_log,
        );
        tracing::debug!(
            "Built {} with {} routes and {} WebSocket routes",
            self.title,
            dispatcher.routes().len(),
            websockets.len()
        );

        Ok(Application {
            inner: Arc::new(Inner {
                title: self.title,
                settings: self.settings,
                dispatcher,
                websockets,
                connections: ConnectionManager::new(),
                lifecycle: self.lifecycle,
                started: AtomicBool::new(false),
            }),
        })
    }
}
