//! Per-request orchestration.
//!
//! [`Dispatcher::dispatch`] drives one request through the stage machine
//! `Received -> Routed -> DependenciesResolved -> Validated -> Handled ->
//! ResponseReady -> Sent`. The middleware chain wraps everything from
//! routing to the handler. Any failure is mapped to a response by the
//! exception filters, dependency cleanup runs on every path, and the
//! access log sees each request exactly once.

mod access_log;
mod stage;

pub use access_log::{AccessEvent, AccessLog, TracingAccessLog};
pub use stage::Stage;

use crate::background::BackgroundTasks;
use crate::di::{Container, DependencyRegistry, DependencyScope};
use crate::error::{ErrorKind, FennecError, Result};
use crate::exception::ExceptionFilters;
use crate::handler::{Handler, RequestContext};
use crate::http::{Method, Request, Response, StatusCode};
use crate::middleware::{MiddlewareChain, Outcome};
use crate::routing::{Lookup, Route, RouteTable};
use stage::StageTracker;
use std::any::Any;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;

/// Status recorded for requests abandoned before a response existed.
const CLIENT_CLOSED_REQUEST: u16 = 499;

pub struct Dispatcher {
    routes: RouteTable<Route>,
    middleware: MiddlewareChain,
    registry: Arc<DependencyRegistry>,
    container: Arc<Container>,
    filters: ExceptionFilters,
    access_log: Arc<dyn AccessLog>,
}

impl Dispatcher {
    pub fn new(
        routes: RouteTable<Route>,
        middleware: MiddlewareChain,
        registry: Arc<DependencyRegistry>,
        container: Arc<Container>,
        filters: ExceptionFilters,
        access_log: Arc<dyn AccessLog>,
    ) -> Self {
        Self {
            routes,
            middleware,
            registry,
            container,
            filters,
            access_log,
        }
    }

    pub fn routes(&self) -> &RouteTable<Route> {
        &self.routes
    }

    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    pub async fn dispatch(&self, request: Request) -> Response {
        let record = AccessRecord::start(self.access_log.as_ref(), &request);
        let background = BackgroundTasks::new();
        let mut scope = DependencyScope::new(Arc::clone(&self.registry), Arc::clone(&self.container));

        let (request, outcome) = {
            let scope = &mut scope;
            let tracker = &record.tracker;
            let background = &background;
            self.middleware
                .invoke(request, move |request| {
                    self.run(request, scope, tracker, background)
                })
                .await
        };

        let (response, failure) = match outcome {
            Ok(response) => (response, None),
            Err(error) => {
                let failed_at = record.tracker.failed_at();
                if error.is_internal() {
                    tracing::error!(
                        method = %request.method(),
                        path = %request.path(),
                        stage = %failed_at,
                        "Request failed: {:?}",
                        error
                    );
                } else {
                    tracing::debug!("{} {} rejected: {}", request.method(), request.path(), error);
                }
                (self.filters.catch(&request, &error), Some((failed_at, error.kind())))
            }
        };
        record.tracker.advance(Stage::ResponseReady);

        scope.close().await;
        record.finish(response.status(), failure);

        background.spawn();
        response
    }

    async fn run(
        &self,
        mut request: Request,
        scope: &mut DependencyScope,
        tracker: &StageTracker,
        background: &BackgroundTasks,
    ) -> Outcome {
        let route = match self.routes.lookup(request.method(), request.path()) {
            Lookup::Found { route, params } => {
                request.set_path_params(params);
                route
            }
            Lookup::MethodNotAllowed { allowed } => {
                return Err(FennecError::MethodNotAllowed {
                    method: request.method().clone(),
                    path: request.path().to_string(),
                    allowed,
                });
            }
            Lookup::NotFound => {
                return Err(FennecError::RouteNotFound {
                    method: request.method().clone(),
                    path: request.path().to_string(),
                });
            }
        };
        tracker.advance(Stage::Routed);

        for guard in route.guards() {
            guard.can_activate(&request).await?;
        }

        let request = Arc::new(request);
        let dependencies = scope.resolve_all(&request, route.dependencies()).await?;
        tracker.advance(Stage::DependenciesResolved);

        let model = match route.model_schema() {
            Some(schema) => Some(schema.construct(request.json()?)?),
            None => None,
        };
        tracker.advance(Stage::Validated);

        let cx = RequestContext::new(
            request,
            dependencies,
            model,
            Arc::clone(&self.container),
            background.clone(),
        );
        let response = call_isolated(route.handler(), cx).await?;
        tracker.advance(Stage::Handled);
        Ok(response)
    }
}

/// Aborts the task when the owning request goes away.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run the handler on its own task so a panic surfaces as
/// [`FennecError::HandlerPanic`] instead of tearing down the connection.
async fn call_isolated(handler: &Arc<dyn Handler>, cx: RequestContext) -> Result<Response> {
    let mut task = AbortOnDrop(tokio::spawn(handler.call(cx)));
    match (&mut task.0).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(FennecError::HandlerPanic(panic_message(e.into_panic()))),
        Err(_) => Err(FennecError::HandlerPanic("handler task was cancelled".to_string())),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Writes the access event once: on `finish`, or from `Drop` if the
/// request was abandoned first.
struct AccessRecord<'a> {
    sink: &'a dyn AccessLog,
    method: Method,
    path: String,
    started: Instant,
    tracker: StageTracker,
    written: bool,
}

impl<'a> AccessRecord<'a> {
    fn start(sink: &'a dyn AccessLog, request: &Request) -> Self {
        Self {
            sink,
            method: request.method().clone(),
            path: request.path().to_string(),
            started: Instant::now(),
            tracker: StageTracker::new(),
            written: false,
        }
    }

    fn finish(mut self, status: StatusCode, failure: Option<(Stage, ErrorKind)>) {
        self.tracker.advance(Stage::Sent);
        self.write(status, failure);
    }

    fn write(&mut self, status: StatusCode, failure: Option<(Stage, ErrorKind)>) {
        if self.written {
            return;
        }
        self.written = true;
        self.sink.log(&AccessEvent {
            method: self.method.clone(),
            path: std::mem::take(&mut self.path),
            status,
            duration: self.started.elapsed(),
            stage: self.tracker.current(),
            failed_at: failure.map(|(stage, _)| stage),
            error: failure.map(|(_, kind)| kind),
            timestamp: chrono::Utc::now(),
        });
    }
}

impl Drop for AccessRecord<'_> {
    fn drop(&mut self) {
        if !self.written {
            let status =
                StatusCode::from_u16(CLIENT_CLOSED_REQUEST).unwrap_or(StatusCode::BAD_REQUEST);
            let failed_at = self.tracker.failed_at();
            tracing::debug!("{} {} abandoned before {}", self.method, self.path, failed_at);
            self.sink.log(&AccessEvent {
                method: self.method.clone(),
                path: std::mem::take(&mut self.path),
                status,
                duration: self.started.elapsed(),
                stage: self.tracker.current(),
                failed_at: Some(failed_at),
                error: None,
                timestamp: chrono::Utc::now(),
            });
        }
    }
}
