//! Request body validation.
//!
//! A [`ModelSchema`] describes the fields a JSON body must carry. Building
//! a [`ValidatedModel`] either succeeds with every field coerced and
//! checked, or fails with a [`ValidationErrors`] listing every violation.

mod error;
mod model;
mod schema;

pub use error::{FieldViolation, LengthBound, ValidationErrors, Violation};
pub use model::{Model, ValidatedModel};
pub use schema::{
    FieldDecoder, FieldInfo, FieldSpec, FieldType, FieldValidator, ModelInfo, ModelSchema,
};
