use crate::error::{ErrorKind, FennecError};
use crate::http::{Request, Response};
use std::collections::HashMap;
use std::sync::Arc;

pub mod http;

pub use http::HttpExceptionFilter;

/// The ExceptionFilter trait
///
/// Filters turn errors raised during request processing into responses.
/// They must return a valid Response.
pub trait ExceptionFilter: Send + Sync + 'static {
    /// Catch an exception and return a response
    fn catch(&self, request: &Request, error: &FennecError) -> Response;
}

/// Adapter for closures registered through the application builder.
pub(crate) struct FnFilter<F>(pub(crate) F);

impl<F> ExceptionFilter for FnFilter<F>
where
    F: Fn(&Request, &FennecError) -> Response + Send + Sync + 'static,
{
    fn catch(&self, request: &Request, error: &FennecError) -> Response {
        (self.0)(request, error)
    }
}

/// Filters registered per [`ErrorKind`].
///
/// Lookup order: the filter for the error's exact kind, then the
/// fallback filter, then [`HttpExceptionFilter`].
#[derive(Clone, Default)]
pub struct ExceptionFilters {
    by_kind: HashMap<ErrorKind, Arc<dyn ExceptionFilter>>,
    fallback: Option<Arc<dyn ExceptionFilter>>,
}

impl ExceptionFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: ErrorKind, filter: impl ExceptionFilter) {
        self.by_kind.insert(kind, Arc::new(filter));
    }

    pub fn set_fallback(&mut self, filter: impl ExceptionFilter) {
        self.fallback = Some(Arc::new(filter));
    }

    pub fn catch(&self, request: &Request, error: &FennecError) -> Response {
        match self.by_kind.get(&error.kind()).or(self.fallback.as_ref()) {
            Some(filter) => filter.catch(request, error),
            None => HttpExceptionFilter.catch(request, error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn teapot(_: &Request, _: &FennecError) -> Response {
        Response::text(StatusCode::IM_A_TEAPOT, "teapot")
    }

    fn gone(_: &Request, _: &FennecError) -> Response {
        Response::empty(StatusCode::GONE)
    }

    #[test]
    fn test_lookup_order() {
        let request = Request::get("/");
        let forbidden = FennecError::forbidden("no");
        let bad = FennecError::bad_request("bad");

        let mut filters = ExceptionFilters::new();
        assert_eq!(filters.catch(&request, &forbidden).status(), StatusCode::FORBIDDEN);

        filters.set_fallback(FnFilter(gone));
        assert_eq!(filters.catch(&request, &bad).status(), StatusCode::GONE);

        filters.register(ErrorKind::Forbidden, FnFilter(teapot));
        assert_eq!(filters.catch(&request, &forbidden).status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(filters.catch(&request, &bad).status(), StatusCode::GONE);
    }
}
