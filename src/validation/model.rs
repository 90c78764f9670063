use super::error::BODY_FIELD;
use super::{ModelSchema, ValidationErrors, Violation};
use crate::error::{FennecError, Result};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// A body that passed schema validation.
///
/// Holds only declared fields, already coerced and defaulted.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedModel {
    model: String,
    values: Map<String, Value>,
    /// Wire name to struct key, for fields whose names differ.
    keys: Vec<(String, String)>,
}

impl ValidatedModel {
    pub(crate) fn new(model: String, values: Map<String, Value>, keys: Vec<(String, String)>) -> Self {
        Self {
            model,
            values,
            keys,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.values)
    }

    /// Deserialize into a typed struct.
    ///
    /// Anything serde still rejects is reported as a validation failure
    /// on the body.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        let mut values = self.values.clone();
        for (wire, key) in &self.keys {
            if let Some(value) = values.remove(wire) {
                values.insert(key.clone(), value);
            }
        }
        serde_json::from_value(Value::Object(values)).map_err(|e| {
            tracing::debug!("Validated {} body failed to deserialize: {}", self.model, e);
            let mut errors = ValidationErrors::new();
            errors.push(BODY_FIELD, Violation::InvalidValue(e.to_string()));
            FennecError::ValidationFailed(errors)
        })
    }
}

/// A typed request model, usually implemented with `#[derive(Model)]`.
pub trait Model: DeserializeOwned + Send + Sync + 'static {
    fn schema() -> ModelSchema;

    /// Validate a raw JSON value and build the typed model.
    fn from_json(value: &Value) -> Result<Self> {
        Self::schema().construct(value)?.deserialize()
    }
}
