use crate::error::FennecError;
use crate::exception::ExceptionFilter;
use crate::http::{Request, Response};

/// The built-in filter: renders the standard error envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpExceptionFilter;

impl ExceptionFilter for HttpExceptionFilter {
    fn catch(&self, request: &Request, error: &FennecError) -> Response {
        tracing::debug!(
            "Mapping {} on {} {} to {}",
            error.kind(),
            request.method(),
            request.path(),
            error.status()
        );
        error.to_response()
    }
}
