use super::FieldType;
use serde_json::{Map, Value};
use std::fmt;
use strum_macros::Display;
use thiserror::Error;

/// Pseudo-field used when the body itself is unusable.
pub(crate) const BODY_FIELD: &str = "body";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum LengthBound {
    Minimum,
    Maximum,
}

/// A single reason a field was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Violation {
    #[error("Field is required")]
    MissingField,

    #[error("Expected {expected}, got {found}")]
    TypeMismatch {
        expected: FieldType,
        found: &'static str,
    },

    #[error("{bound} length is {limit}")]
    LengthViolation {
        bound: LengthBound,
        limit: usize,
        actual: usize,
    },

    #[error("Must be between {min} and {max}")]
    OutOfRange { min: i128, max: i128 },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("{0}")]
    Custom(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldViolation {
    pub field: String,
    pub violation: Violation,
}

/// Every violation found while constructing one model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationErrors {
    violations: Vec<FieldViolation>,
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed for {} field(s)", self.fields().len())
    }
}

impl std::error::Error for ValidationErrors {}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, violation: Violation) {
        self.violations.push(FieldViolation {
            field: field.into(),
            violation,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldViolation> {
        self.violations.iter()
    }

    /// Violations recorded against one field.
    pub fn field(&self, name: &str) -> Vec<&Violation> {
        self.violations
            .iter()
            .filter(|v| v.field == name)
            .map(|v| &v.violation)
            .collect()
    }

    /// Names of the offending fields, in the order they were first seen.
    pub fn fields(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for v in &self.violations {
            if !names.contains(&v.field.as_str()) {
                names.push(&v.field);
            }
        }
        names
    }

    /// `{"field": ["message", ...]}` for the client-facing envelope.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for v in &self.violations {
            let entry = map
                .entry(v.field.clone())
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(messages) = entry {
                messages.push(Value::String(v.violation.to_string()));
            }
        }
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_messages() {
        assert_eq!(Violation::MissingField.to_string(), "Field is required");
        assert_eq!(
            Violation::LengthViolation {
                bound: LengthBound::Minimum,
                limit: 2,
                actual: 1
            }
            .to_string(),
            "Minimum length is 2"
        );
        assert_eq!(
            Violation::TypeMismatch {
                expected: FieldType::Int,
                found: "string"
            }
            .to_string(),
            "Expected int, got string"
        );
    }

    #[test]
    fn test_to_json_groups_by_field() {
        let mut errors = ValidationErrors::new();
        errors.push("name", Violation::MissingField);
        errors.push("age", Violation::Custom("too young".into()));
        errors.push("age", Violation::Custom("odd".into()));

        assert_eq!(errors.fields(), vec!["name", "age"]);
        assert_eq!(
            errors.to_json(),
            json!({"name": ["Field is required"], "age": ["too young", "odd"]})
        );
        assert_eq!(errors.to_string(), "Validation failed for 2 field(s)");
    }
}
