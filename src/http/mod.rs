//! Transport-neutral request and response types.
//!
//! The dispatcher only ever sees these types; the axum bridge in
//! [`crate::application`] converts to and from them at the edge.

mod request;
mod response;

pub use axum::body::Bytes;
pub use axum::http::{Extensions, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
pub use request::Request;
pub use response::{IntoResponse, Response};
