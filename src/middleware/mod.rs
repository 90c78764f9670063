//! Onion-model middleware.
//!
//! Each middleware has a pre-phase ([`Middleware::before`]) and a
//! post-phase ([`Middleware::after`]). Pre-phases run in registration
//! order, post-phases in reverse, so the first registered middleware wraps
//! everything else.
//!
//! # Example
//!
//! ```rust,ignore
//! struct Timing;
//!
//! #[async_trait]
//! impl Middleware for Timing {
//!     async fn before(&self, request: &mut Request) -> Result<Flow, FennecError> {
//!         request.extensions_mut().insert(Instant::now());
//!         Ok(Flow::Continue)
//!     }
//!
//!     async fn after(&self, request: &Request, outcome: Outcome) -> Outcome {
//!         if let Some(started) = request.extensions().get::<Instant>() {
//!             tracing::info!("took {:?}", started.elapsed());
//!         }
//!         outcome
//!     }
//! }
//! ```

use crate::error::FennecError;
use crate::http::{Request, Response};
use async_trait::async_trait;

mod auth;
mod chain;
mod cors;
mod jwt;
mod rate_limit;
mod security_headers;

pub use auth::{BearerAuthMiddleware, TokenVerifier};
pub use chain::MiddlewareChain;
pub use cors::CorsMiddleware;
pub use jwt::{Claims, JwtError, JwtHandler};
pub use rate_limit::{RateLimitMiddleware, RateLimitState};
pub use security_headers::{RequestSizeLimitMiddleware, SecurityHeadersMiddleware};

/// Result of everything downstream of a middleware.
pub type Outcome = Result<Response, FennecError>;

/// Decision taken by a pre-phase.
#[derive(Debug)]
pub enum Flow {
    /// Hand the request to the next link.
    Continue,
    /// Answer immediately; later links and the handler are skipped.
    Respond(Response),
}

#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn before(&self, _request: &mut Request) -> Result<Flow, FennecError> {
        Ok(Flow::Continue)
    }

    async fn after(&self, _request: &Request, outcome: Outcome) -> Outcome {
        outcome
    }
}
