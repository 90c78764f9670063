use super::{Flow, Middleware, Outcome};
use crate::error::FennecError;
use crate::http::{HeaderName, HeaderValue, Request, StatusCode, header};
use async_trait::async_trait;

/// Adds hardening headers to every successful response. Headers already
/// set by the handler are left alone.
#[derive(Debug, Clone)]
pub struct SecurityHeadersMiddleware {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl Default for SecurityHeadersMiddleware {
    fn default() -> Self {
        Self {
            headers: vec![
                (header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
                (header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY")),
                (header::X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block")),
                (
                    header::REFERRER_POLICY,
                    HeaderValue::from_static("strict-origin-when-cross-origin"),
                ),
                (
                    header::CONTENT_SECURITY_POLICY,
                    HeaderValue::from_static("default-src 'self'"),
                ),
                (
                    header::STRICT_TRANSPORT_SECURITY,
                    HeaderValue::from_static("max-age=31536000; includeSubDomains"),
                ),
            ],
        }
    }
}

impl SecurityHeadersMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a default or add a custom header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        match self.headers.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name, value)),
        }
        self
    }

    pub fn without_header(mut self, name: &HeaderName) -> Self {
        self.headers.retain(|(n, _)| n != name);
        self
    }
}

#[async_trait]
impl Middleware for SecurityHeadersMiddleware {
    fn name(&self) -> &str {
        "security_headers"
    }

    async fn after(&self, _request: &Request, outcome: Outcome) -> Outcome {
        let mut response = outcome?;
        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            if !headers.contains_key(name) {
                headers.insert(name.clone(), value.clone());
            }
        }
        Ok(response)
    }
}

/// Rejects bodies larger than `max_size` with `413`, judged by the
/// declared `content-length` and the bytes actually received.
#[derive(Debug, Clone, Copy)]
pub struct RequestSizeLimitMiddleware {
    max_size: usize,
}

impl RequestSizeLimitMiddleware {
    pub fn new(max_size: usize) -> Self {
        Self { max_size }
    }
}

#[async_trait]
impl Middleware for RequestSizeLimitMiddleware {
    fn name(&self) -> &str {
        "request_size_limit"
    }

    async fn before(&self, request: &mut Request) -> Result<Flow, FennecError> {
        let declared = request
            .header("content-length")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if declared.max(request.body().len()) > self.max_size {
            return Err(FennecError::http(
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("Request too large. Maximum size: {} bytes", self.max_size),
            ));
        }
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Response;

    #[tokio::test]
    async fn test_defaults_are_added() {
        let middleware = SecurityHeadersMiddleware::new();
        let response = middleware
            .after(&Request::get("/"), Ok(Response::empty(StatusCode::OK)))
            .await
            .unwrap();
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
        assert_eq!(response.headers()["x-frame-options"], "DENY");
        assert_eq!(response.headers()["content-security-policy"], "default-src 'self'");
    }

    #[tokio::test]
    async fn test_custom_and_existing_headers() {
        let middleware = SecurityHeadersMiddleware::new()
            .with_header(header::X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN"))
            .with_header(
                HeaderName::from_static("x-powered-by"),
                HeaderValue::from_static("fennec"),
            );
        let handler_set = Response::empty(StatusCode::OK).with_header(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static("default-src *"),
        );

        let response = middleware
            .after(&Request::get("/"), Ok(handler_set))
            .await
            .unwrap();
        assert_eq!(response.headers()["x-frame-options"], "SAMEORIGIN");
        assert_eq!(response.headers()["x-powered-by"], "fennec");
        assert_eq!(response.headers()["content-security-policy"], "default-src *");
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let limit = RequestSizeLimitMiddleware::new(4);
        let mut small = Request::post("/").with_body("abc");
        assert!(limit.before(&mut small).await.is_ok());

        let mut large = Request::post("/").with_body("abcdef");
        let err = limit.before(&mut large).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
