use super::{Flow, Middleware};
use crate::error::FennecError;
use crate::guard::{GuardError, Principal};
use crate::http::Request;
use async_trait::async_trait;
use std::sync::Arc;

/// Turns a bearer token into a [`Principal`].
#[async_trait]
pub trait TokenVerifier: Send + Sync + 'static {
    async fn verify(&self, token: &str) -> Result<Principal, GuardError>;
}

struct FnVerifier<F>(F);

#[async_trait]
impl<F> TokenVerifier for FnVerifier<F>
where
    F: Fn(&str) -> Option<Principal> + Send + Sync + 'static,
{
    async fn verify(&self, token: &str) -> Result<Principal, GuardError> {
        (self.0)(token).ok_or_else(|| GuardError::Unauthorized("Invalid token".to_string()))
    }
}

/// Reads `Authorization: Bearer <token>` and stores the verified
/// [`Principal`] in the request extensions.
///
/// When not `required`, requests without the header pass through
/// anonymously and route guards decide. A malformed header or a token the
/// verifier rejects is always `401`.
#[derive(Clone)]
pub struct BearerAuthMiddleware {
    verifier: Arc<dyn TokenVerifier>,
    required: bool,
}

impl BearerAuthMiddleware {
    pub fn new(verifier: impl TokenVerifier) -> Self {
        Self {
            verifier: Arc::new(verifier),
            required: false,
        }
    }

    pub fn from_fn<F>(verify: F) -> Self
    where
        F: Fn(&str) -> Option<Principal> + Send + Sync + 'static,
    {
        Self::new(FnVerifier(verify))
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }
}

#[async_trait]
impl Middleware for BearerAuthMiddleware {
    fn name(&self) -> &str {
        "bearer_auth"
    }

    async fn before(&self, request: &mut Request) -> Result<Flow, FennecError> {
        let Some(authorization) = request.header("authorization") else {
            if self.required {
                return Err(FennecError::unauthorized("Missing authorization header"));
            }
            return Ok(Flow::Continue);
        };

        let token = match authorization.split_once(' ') {
            Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
                token.trim().to_string()
            }
            _ => return Err(FennecError::unauthorized("Invalid authentication scheme")),
        };

        let principal = self.verifier.verify(&token).await?;
        tracing::debug!("Authenticated {}", principal.subject);
        request.extensions_mut().insert(principal);
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn middleware() -> BearerAuthMiddleware {
        BearerAuthMiddleware::from_fn(|token| {
            (token == "good").then(|| Principal::new("alice").with_role("admin"))
        })
    }

    #[tokio::test]
    async fn test_valid_token_sets_principal() {
        let mut request = Request::get("/").with_header("authorization", "Bearer good");
        middleware().before(&mut request).await.unwrap();
        let principal = request.extensions().get::<Principal>().unwrap();
        assert_eq!(principal.subject, "alice");
    }

    #[tokio::test]
    async fn test_rejections() {
        let mut bad_token = Request::get("/").with_header("authorization", "Bearer nope");
        assert!(matches!(
            middleware().before(&mut bad_token).await,
            Err(FennecError::Unauthorized(_))
        ));

        let mut basic = Request::get("/").with_header("authorization", "Basic dXNlcg==");
        assert!(matches!(
            middleware().before(&mut basic).await,
            Err(FennecError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_header() {
        let mut anonymous = Request::get("/");
        assert!(middleware().before(&mut anonymous).await.is_ok());
        assert!(anonymous.extensions().get::<Principal>().is_none());

        let mut anonymous = Request::get("/");
        assert!(middleware().required(true).before(&mut anonymous).await.is_err());
    }
}
