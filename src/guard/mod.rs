use crate::error::FennecError;
use crate::http::Request;
use async_trait::async_trait;
use serde::Serialize;

mod builtins;

pub use builtins::{Authenticated, RoleGuard};

/// Standard Result type for Guard
/// Ok(()) means allowed
/// Err(GuardError) means denied
pub type GuardResult = Result<(), GuardError>;

#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl From<GuardError> for FennecError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::Forbidden(message) => FennecError::Forbidden(message),
            GuardError::Unauthorized(message) => FennecError::Unauthorized(message),
        }
    }
}

/// The Guard trait
/// Implement this to protect routes. Guards run after routing and before
/// any dependency is resolved.
#[async_trait]
pub trait Guard: Send + Sync + 'static {
    async fn can_activate(&self, request: &Request) -> GuardResult;
}

/// The authenticated caller, stored in request extensions by
/// authentication middleware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub subject: String,
    pub roles: Vec<String>,
}

impl Principal {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            roles: Vec::new(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}
