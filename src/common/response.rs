use crate::http::{IntoResponse, Response};
use axum::http::StatusCode;
use serde::Serialize;

/// Outcome marker carried in the envelope's `status` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Success,
    Error,
}

/// Standard API response wrapper
///
/// Every response body produced by the framework, success or failure,
/// has the same three keys: `status`, `data` and `message`. `data` is
/// `null` and `message` is empty when not set.
///
/// # Example
/// ```
/// use fennec::common::ApiResponse;
/// use fennec::http::StatusCode;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct User {
///     id: u64,
///     name: String,
/// }
///
/// fn get_user(id: u64) -> ApiResponse<User> {
///     if id == 1 {
///         ApiResponse::success(User { id: 1, name: "Test User".to_string() })
///     } else {
///         ApiResponse::error(StatusCode::NOT_FOUND, "User not found")
///     }
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: EnvelopeStatus,

    pub data: Option<T>,

    pub message: String,

    #[serde(skip)]
    pub http_status: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful response with data
    ///
    /// Defaults to HTTP 200 OK.
    pub fn success(data: T) -> Self {
        Self {
            status: EnvelopeStatus::Success,
            data: Some(data),
            message: String::new(),
            http_status: StatusCode::OK,
        }
    }

    /// Create an error response without data.
    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: EnvelopeStatus::Error,
            data: None,
            message: message.into(),
            http_status: status,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.http_status = status;
        self
    }
}

impl ApiResponse<()> {
    /// A success envelope with `data: null`.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: EnvelopeStatus::Success,
            data: None,
            message: message.into(),
            http_status: StatusCode::OK,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        // Use the stored http_status to provide accurate HTTP semantics
        Response::json(self.http_status, &self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn body_of<T: Serialize>(envelope: ApiResponse<T>) -> Value {
        serde_json::from_slice(envelope.into_response().body()).unwrap()
    }

    #[test]
    fn test_success_envelope_has_all_keys() {
        let body = body_of(ApiResponse::success(json!({"id": 1})));
        assert_eq!(body, json!({"status": "success", "data": {"id": 1}, "message": ""}));
    }

    #[test]
    fn test_error_envelope_has_null_data() {
        let envelope: ApiResponse<Value> = ApiResponse::error(StatusCode::NOT_FOUND, "missing");
        let response = envelope.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body, json!({"status": "error", "data": null, "message": "missing"}));
    }

    #[test]
    fn test_with_message_and_status() {
        let response = ApiResponse::success(json!([1, 2]))
            .with_message("created")
            .with_status(StatusCode::CREATED)
            .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
