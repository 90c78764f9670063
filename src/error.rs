use crate::common::ApiResponse;
use crate::http::{IntoResponse, Response};
use crate::validation::ValidationErrors;
use axum::http::{HeaderValue, Method, StatusCode, header};
use serde_json::{Value, json};
use strum_macros::{AsRefStr, Display, EnumIter};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FennecError>;

/// Type-erased error returned by dependency providers and user code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Stable tag for every [`FennecError`] variant.
///
/// Exception handlers are registered per kind, and the kind is what the
/// access log records for failed requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumIter)]
pub enum ErrorKind {
    RouteNotFound,
    MethodNotAllowed,
    BadRequest,
    ValidationFailed,
    DependencyFailed,
    DependencyNotFound,
    CircularDependency,
    Unauthorized,
    Forbidden,
    RateLimited,
    Http,
    HandlerPanic,
    Internal,
}

#[derive(Debug, Error)]
pub enum FennecError {
    #[error("No route matches {method} {path}")]
    RouteNotFound { method: Method, path: String },

    #[error("Method {method} not allowed for {path}")]
    MethodNotAllowed {
        method: Method,
        path: String,
        allowed: Vec<Method>,
    },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    ValidationFailed(#[from] ValidationErrors),

    #[error("Dependency '{name}' failed: {source}")]
    DependencyFailed {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("Dependency not found: {0}")]
    DependencyNotFound(String),

    #[error("Circular dependency detected: {}", cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// An error raised deliberately by a handler with its own status code.
    #[error("{message}")]
    Http {
        status: StatusCode,
        message: String,
        details: Option<Value>,
    },

    #[error("Handler panicked: {0}")]
    HandlerPanic(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl FennecError {
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
            details: None,
        }
    }

    /// Attach structured details; only meaningful for [`FennecError::Http`].
    pub fn with_details(self, details: Value) -> Self {
        match self {
            Self::Http {
                status, message, ..
            } => Self::Http {
                status,
                message,
                details: Some(details),
            },
            other => other,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::http(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(anyhow::anyhow!(message.into()))
    }

    /// Wrap a provider failure.
    ///
    /// A provider that rejects the request on purpose (a 401 from an auth
    /// dependency, a deliberate [`FennecError::Http`]) keeps its own error;
    /// everything else becomes [`FennecError::DependencyFailed`].
    pub(crate) fn from_provider(name: &str, source: BoxError) -> Self {
        match source.downcast::<FennecError>() {
            Ok(err) if !err.is_internal() => *err,
            Ok(err) => Self::DependencyFailed {
                name: name.to_string(),
                source: err,
            },
            Err(source) => Self::DependencyFailed {
                name: name.to_string(),
                source,
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RouteNotFound { .. } => ErrorKind::RouteNotFound,
            Self::MethodNotAllowed { .. } => ErrorKind::MethodNotAllowed,
            Self::BadRequest(_) => ErrorKind::BadRequest,
            Self::ValidationFailed(_) => ErrorKind::ValidationFailed,
            Self::DependencyFailed { .. } => ErrorKind::DependencyFailed,
            Self::DependencyNotFound(_) => ErrorKind::DependencyNotFound,
            Self::CircularDependency { .. } => ErrorKind::CircularDependency,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::RateLimited(_) => ErrorKind::RateLimited,
            Self::Http { .. } => ErrorKind::Http,
            Self::HandlerPanic(_) => ErrorKind::HandlerPanic,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::ValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Http { status, .. } => *status,
            Self::DependencyFailed { .. }
            | Self::DependencyNotFound(_)
            | Self::CircularDependency { .. }
            | Self::HandlerPanic(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the error hides an internal fault and must only be logged
    /// server-side.
    pub fn is_internal(&self) -> bool {
        self.status().is_server_error() && !matches!(self, Self::Http { .. })
    }

    /// The message shown to clients. Internal faults collapse to a generic
    /// text so nothing about the server leaks.
    pub fn client_message(&self) -> String {
        match self {
            Self::RouteNotFound { .. } => "Not Found".to_string(),
            Self::MethodNotAllowed { .. } => "Method Not Allowed".to_string(),
            Self::BadRequest(message)
            | Self::Unauthorized(message)
            | Self::Forbidden(message)
            | Self::RateLimited(message) => message.clone(),
            Self::ValidationFailed(_) => "Validation failed".to_string(),
            Self::Http { message, .. } => message.clone(),
            Self::DependencyFailed { .. }
            | Self::DependencyNotFound(_)
            | Self::CircularDependency { .. }
            | Self::HandlerPanic(_)
            | Self::Internal(_) => "Internal Server Error".to_string(),
        }
    }

    /// Structured payload rendered as the envelope's `data`.
    pub fn details(&self) -> Option<Value> {
        match self {
            Self::ValidationFailed(errors) => Some(json!({ "errors": errors.to_json() })),
            Self::Http { details, .. } => details.clone(),
            _ => None,
        }
    }

    /// Render the built-in error envelope for this error.
    pub fn to_response(&self) -> Response {
        let envelope: ApiResponse<Value> = ApiResponse {
            data: self.details(),
            ..ApiResponse::error(self.status(), self.client_message())
        };
        let mut response = envelope.into_response();
        if let Self::MethodNotAllowed { allowed, .. } = self {
            let allow = allowed
                .iter()
                .map(Method::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            if let Ok(value) = HeaderValue::from_str(&allow) {
                response.headers_mut().insert(header::ALLOW, value);
            }
        }
        response
    }
}

impl IntoResponse for FennecError {
    fn into_response(self) -> Response {
        self.to_response()
    }
}
