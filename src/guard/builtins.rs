use super::{Guard, GuardError, GuardResult, Principal};
use crate::http::Request;
use async_trait::async_trait;

/// Rejects requests without a [`Principal`] (401).
#[derive(Debug, Clone, Copy, Default)]
pub struct Authenticated;

#[async_trait]
impl Guard for Authenticated {
    async fn can_activate(&self, request: &Request) -> GuardResult {
        match request.extensions().get::<Principal>() {
            Some(_) => Ok(()),
            None => Err(GuardError::Unauthorized("Authentication required".to_string())),
        }
    }
}

/// Requires a principal holding at least one of the listed roles.
/// Anonymous callers get 401, callers without a matching role get 403.
#[derive(Debug, Clone)]
pub struct RoleGuard {
    roles: Vec<String>,
}

impl RoleGuard {
    pub fn any<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Guard for RoleGuard {
    async fn can_activate(&self, request: &Request) -> GuardResult {
        let principal = request
            .extensions()
            .get::<Principal>()
            .ok_or_else(|| GuardError::Unauthorized("Authentication required".to_string()))?;

        if self.roles.iter().any(|role| principal.has_role(role)) {
            Ok(())
        } else {
            Err(GuardError::Forbidden(format!(
                "Requires one of the roles: {}",
                self.roles.join(", ")
            )))
        }
    }
}
