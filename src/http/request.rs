use crate::error::{FennecError, Result};
use axum::body::Bytes;
use axum::http::{Extensions, HeaderMap, HeaderName, HeaderValue, Method, header};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::OnceLock;

/// An inbound HTTP request.
///
/// Owned by exactly one in-flight dispatch. The JSON body is parsed at most
/// once and cached.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
    path_params: HashMap<String, String>,
    extensions: Extensions,
    remote_addr: Option<SocketAddr>,
    json_cache: OnceLock<Value>,
}

impl Request {
    /// Build a request from a method and a target such as `/users?page=2`.
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, parse_query(query)),
            None => (target, Vec::new()),
        };
        Self {
            method,
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            query,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            path_params: HashMap::new(),
            extensions: Extensions::new(),
            remote_addr: None,
            json_cache: OnceLock::new(),
        }
    }

    pub fn get(target: &str) -> Self {
        Self::new(Method::GET, target)
    }

    pub fn post(target: &str) -> Self {
        Self::new(Method::POST, target)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self.json_cache = OnceLock::new();
        self
    }

    /// Set a JSON body and the matching content type.
    pub fn with_json(mut self, value: &Value) -> Self {
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.with_body(value.to_string())
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn with_extension<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.extensions.insert(value);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query parameter by name; the last occurrence wins.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn query_all(&self, name: &str) -> Vec<&str> {
        self.query
            .iter()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
            .collect()
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Header value as text; header names are case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn path_params(&self) -> &HashMap<String, String> {
        &self.path_params
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    /// Convert a path parameter, e.g. `req.path_param_as::<u64>("id")`.
    pub fn path_param_as<T: FromStr>(&self, name: &str) -> Result<T> {
        let raw = self
            .path_param(name)
            .ok_or_else(|| FennecError::bad_request(format!("Missing path parameter '{name}'")))?;
        raw.parse::<T>()
            .map_err(|_| FennecError::bad_request(format!("Invalid path parameter '{name}': {raw}")))
    }

    pub(crate) fn set_path_params(&mut self, params: HashMap<String, String>) {
        self.path_params = params;
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Parsed JSON body. An empty body reads as `{}`.
    pub fn json(&self) -> Result<&Value> {
        if let Some(value) = self.json_cache.get() {
            return Ok(value);
        }
        let value = if self.body.iter().all(u8::is_ascii_whitespace) {
            Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_slice(&self.body)
                .map_err(|e| FennecError::bad_request(format!("Invalid JSON body: {e}")))?
        };
        Ok(self.json_cache.get_or_init(|| value))
    }

    /// Deserialize the JSON body without schema validation.
    pub fn json_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.json()?.clone())
            .map_err(|e| FennecError::bad_request(format!("Invalid JSON body: {e}")))
    }
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    match serde_urlencoded::from_str::<Vec<(String, String)>>(query) {
        Ok(pairs) => pairs,
        Err(e) => {
            tracing::debug!("Ignoring malformed query string '{}': {}", query, e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_is_decoded_and_last_value_wins() {
        let req = Request::get("/search?q=hello%20world&tag=a&tag=b");
        assert_eq!(req.path(), "/search");
        assert_eq!(req.query("q"), Some("hello world"));
        assert_eq!(req.query("tag"), Some("b"));
        assert_eq!(req.query_all("tag"), vec!["a", "b"]);
        assert_eq!(req.query("missing"), None);
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let req = Request::get("/").with_header("X-Request-Id", "abc");
        assert_eq!(req.header("x-request-id"), Some("abc"));
    }

    #[test]
    fn test_empty_body_parses_as_empty_object() {
        let req = Request::post("/users");
        assert_eq!(req.json().unwrap(), &json!({}));
    }

    #[test]
    fn test_malformed_json_is_bad_request() {
        let req = Request::post("/users").with_body("{not json");
        let err = req.json().unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_json_is_cached() {
        let req = Request::post("/users").with_json(&json!({"name": "Jo"}));
        let first = req.json().unwrap() as *const Value;
        let second = req.json().unwrap() as *const Value;
        assert_eq!(first, second);
    }

    #[test]
    fn test_path_param_conversion() {
        let mut req = Request::get("/users/42");
        req.set_path_params(HashMap::from([("id".to_string(), "42".to_string())]));
        assert_eq!(req.path_param_as::<u64>("id").unwrap(), 42);
        assert!(req.path_param_as::<u64>("other").is_err());

        req.set_path_params(HashMap::from([("id".to_string(), "abc".to_string())]));
        assert!(req.path_param_as::<u64>("id").is_err());
    }
}
