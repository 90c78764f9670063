use super::auth::TokenVerifier;
use crate::config::Settings;
use crate::error::FennecError;
use crate::guard::{GuardError, Principal};
use crate::http::Request;
use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

/// Default token lifetime.
const DEFAULT_EXPIRES_IN: Duration = Duration::from_secs(3600);

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Invalid token format")]
    InvalidFormat,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token expired")]
    Expired,

    #[error("Could not sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

impl From<JwtError> for GuardError {
    fn from(err: JwtError) -> Self {
        GuardError::Unauthorized(err.to_string())
    }
}

impl From<JwtError> for FennecError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Signing(source) => FennecError::Internal(source.into()),
            other => FennecError::Unauthorized(other.to_string()),
        }
    }
}

/// Payload carried by tokens issued through [`JwtHandler`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Application-defined claims.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            sub: subject.into(),
            roles: Vec::new(),
            exp: None,
            iat: None,
            extra: Map::new(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    pub fn principal(&self) -> Principal {
        self.roles
            .iter()
            .fold(Principal::new(self.sub.clone()), |principal, role| {
                principal.with_role(role.clone())
            })
    }
}

/// HMAC-signed JSON Web Tokens keyed by the application secret.
///
/// Doubles as the [`TokenVerifier`] behind [`super::BearerAuthMiddleware`].
///
/// # Example
/// ```
/// use fennec::middleware::{Claims, JwtHandler};
///
/// let jwt = JwtHandler::new("change-me");
/// let token = jwt.encode(Claims::new("ada").with_role("admin")).unwrap();
/// assert_eq!(jwt.decode(&token).unwrap().sub, "ada");
/// ```
#[derive(Clone)]
pub struct JwtHandler {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expires_in: Duration,
}

impl JwtHandler {
    pub fn new(secret: &str) -> Self {
        let algorithm = Algorithm::HS256;
        let mut validation = Validation::new(algorithm);
        // `exp` is checked when present but not demanded.
        validation.required_spec_claims.clear();
        validation.leeway = 0;
        Self {
            algorithm,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            expires_in: DEFAULT_EXPIRES_IN,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.secret_key)
    }

    pub fn expires_in(mut self, expires_in: Duration) -> Self {
        self.expires_in = expires_in;
        self
    }

    /// Sign `claims`, stamping `iat` and, unless already set, `exp`.
    pub fn encode(&self, mut claims: Claims) -> Result<String, JwtError> {
        let now = chrono::Utc::now().timestamp();
        claims.iat = Some(now);
        if claims.exp.is_none() {
            claims.exp = Some(now + self.expires_in.as_secs() as i64);
        }
        encode(&Header::new(self.algorithm), &claims, &self.encoding_key).map_err(JwtError::Signing)
    }

    pub fn decode(&self, token: &str) -> Result<Claims, JwtError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                JwtErrorKind::ExpiredSignature => JwtError::Expired,
                JwtErrorKind::InvalidSignature => JwtError::InvalidSignature,
                _ => JwtError::InvalidFormat,
            })
    }

    /// Claims of the bearer token on `request`.
    ///
    /// Meant for dependency providers that need the caller's identity.
    pub fn authenticate(&self, request: &Request) -> Result<Claims, FennecError> {
        let header = request
            .header("authorization")
            .ok_or_else(|| FennecError::unauthorized("Not authenticated"))?;
        let token = match header.split_once(' ') {
            Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => token.trim(),
            _ => return Err(FennecError::unauthorized("Invalid authorization header format")),
        };
        Ok(self.decode(token)?)
    }
}

#[async_trait]
impl TokenVerifier for JwtHandler {
    async fn verify(&self, token: &str) -> Result<Principal, GuardError> {
        let claims = self.decode(token).inspect_err(|e| {
            tracing::debug!("Rejected bearer token: {}", e);
        })?;
        Ok(claims.principal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{BearerAuthMiddleware, Middleware};

    #[test]
    fn test_encode_then_decode_keeps_claims() {
        let jwt = JwtHandler::new("secret");
        let token = jwt
            .encode(Claims::new("ada").with_role("admin").with_claim("team", "core"))
            .unwrap();
        assert_eq!(token.split('.').count(), 3);

        let claims = jwt.decode(&token).unwrap();
        assert_eq!(claims.sub, "ada");
        assert_eq!(claims.roles, vec!["admin"]);
        assert_eq!(claims.extra["team"], "core");
        assert!(claims.exp.unwrap() > claims.iat.unwrap());
    }

    #[test]
    fn test_rejections() {
        let jwt = JwtHandler::new("secret");
        let token = jwt.encode(Claims::new("ada")).unwrap();

        assert!(matches!(
            JwtHandler::new("other").decode(&token),
            Err(JwtError::InvalidSignature)
        ));
        assert!(matches!(jwt.decode("not-a-token"), Err(JwtError::InvalidFormat)));

        let mut stale = Claims::new("ada");
        stale.exp = Some(chrono::Utc::now().timestamp() - 60);
        let token = jwt.encode(stale).unwrap();
        assert!(matches!(jwt.decode(&token), Err(JwtError::Expired)));
    }

    #[test]
    fn test_authenticate_reads_bearer_header() {
        let jwt = JwtHandler::new("secret");
        let token = jwt.encode(Claims::new("ada")).unwrap();

        let request = Request::get("/me").with_header("authorization", &format!("Bearer {token}"));
        assert_eq!(jwt.authenticate(&request).unwrap().sub, "ada");

        let err = jwt.authenticate(&Request::get("/me")).unwrap_err();
        assert_eq!(err.client_message(), "Not authenticated");
    }

    #[tokio::test]
    async fn test_bearer_middleware_with_jwt() {
        let jwt = JwtHandler::new("secret");
        let token = jwt.encode(Claims::new("root").with_role("admin")).unwrap();
        let auth = BearerAuthMiddleware::new(jwt);

        let mut request = Request::get("/").with_header("authorization", &format!("Bearer {token}"));
        auth.before(&mut request).await.unwrap();
        let principal = request.extensions().get::<Principal>().unwrap();
        assert!(principal.has_role("admin"));

        let mut forged = Request::get("/").with_header("authorization", "Bearer a.b.c");
        assert!(matches!(
            auth.before(&mut forged).await,
            Err(FennecError::Unauthorized(_))
        ));
    }
}
