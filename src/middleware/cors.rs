use super::{Flow, Middleware, Outcome};
use crate::config::Settings;
use crate::error::FennecError;
use crate::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode, header};
use async_trait::async_trait;

/// Cross-origin resource sharing.
///
/// Preflight `OPTIONS` requests are answered directly with `200`; every
/// other response from an allowed origin gets the `Access-Control-*`
/// headers on the way out.
#[derive(Debug, Clone)]
pub struct CorsMiddleware {
    allow_origins: Vec<String>,
    allow_methods: Vec<Method>,
    allow_headers: Vec<String>,
    allow_credentials: bool,
    max_age: u64,
}

impl Default for CorsMiddleware {
    fn default() -> Self {
        Self {
            allow_origins: vec!["*".to_string()],
            allow_methods: vec![
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::PATCH,
                Method::OPTIONS,
            ],
            allow_headers: vec!["Content-Type".to_string(), "Authorization".to_string()],
            allow_credentials: false,
            max_age: 600,
        }
    }
}

impl CorsMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::default().allow_origins(settings.allowed_origins.clone())
    }

    pub fn allow_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow_origins = origins.into_iter().map(Into::into).collect();
        self
    }

    pub fn allow_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.allow_methods = methods.into_iter().collect();
        self
    }

    pub fn allow_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow_headers = headers.into_iter().map(Into::into).collect();
        self
    }

    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.allow_credentials = allow;
        self
    }

    pub fn max_age(mut self, seconds: u64) -> Self {
        self.max_age = seconds;
        self
    }

    fn allows_any(&self) -> bool {
        self.allow_origins.iter().any(|o| o == "*")
    }

    fn is_origin_allowed(&self, origin: &str) -> bool {
        self.allows_any() || self.allow_origins.iter().any(|o| o == origin)
    }

    fn apply(&self, origin: Option<&str>, headers: &mut HeaderMap) {
        let Some(origin) = origin.filter(|o| !o.is_empty()) else {
            return;
        };
        if !self.is_origin_allowed(origin) {
            return;
        }

        let allow_origin = if self.allows_any() {
            HeaderValue::from_static("*")
        } else {
            match HeaderValue::from_str(origin) {
                Ok(value) => {
                    headers.append(header::VARY, HeaderValue::from_static("Origin"));
                    value
                }
                Err(_) => return,
            }
        };
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allow_origin);

        let methods = self
            .allow_methods
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        if let Ok(value) = HeaderValue::from_str(&methods) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, value);
        }
        if let Ok(value) = HeaderValue::from_str(&self.allow_headers.join(", ")) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, value);
        }
        if self.allow_credentials {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from(self.max_age));
    }
}

#[async_trait]
impl Middleware for CorsMiddleware {
    fn name(&self) -> &str {
        "cors"
    }

    async fn before(&self, request: &mut Request) -> Result<Flow, FennecError> {
        if request.method() != Method::OPTIONS {
            return Ok(Flow::Continue);
        }
        let mut response = Response::empty(StatusCode::OK);
        self.apply(request.header("origin"), response.headers_mut());
        Ok(Flow::Respond(response))
    }

    async fn after(&self, request: &Request, outcome: Outcome) -> Outcome {
        let mut response = outcome?;
        self.apply(request.header("origin"), response.headers_mut());
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_preflight_answers_directly() {
        let cors = CorsMiddleware::new();
        let mut request = Request::new(Method::OPTIONS, "/users").with_header("origin", "https://app.io");

        let Flow::Respond(response) = cors.before(&mut request).await.unwrap() else {
            panic!("preflight should short-circuit");
        };
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert_eq!(response.headers()["access-control-max-age"], "600");
    }

    #[tokio::test]
    async fn test_specific_origin_is_echoed() {
        let cors = CorsMiddleware::new().allow_origins(["https://app.io"]);
        let allowed = Request::get("/").with_header("origin", "https://app.io");
        let response = cors
            .after(&allowed, Ok(Response::empty(StatusCode::OK)))
            .await
            .unwrap();
        assert_eq!(response.headers()["access-control-allow-origin"], "https://app.io");
        assert_eq!(response.headers()["vary"], "Origin");

        let foreign = Request::get("/").with_header("origin", "https://evil.io");
        let response = cors
            .after(&foreign, Ok(Response::empty(StatusCode::OK)))
            .await
            .unwrap();
        assert!(response.headers().get("access-control-allow-origin").is_none());
    }

    #[tokio::test]
    async fn test_errors_pass_through() {
        let cors = CorsMiddleware::new();
        let request = Request::get("/").with_header("origin", "https://app.io");
        let outcome = cors.after(&request, Err(FennecError::forbidden("no"))).await;
        assert!(matches!(outcome, Err(FennecError::Forbidden(_))));
    }
}
