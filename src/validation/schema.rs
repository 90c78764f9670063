use super::error::BODY_FIELD;
use super::{LengthBound, ValidatedModel, ValidationErrors, Violation};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};
use std::fmt;
use std::sync::Arc;
use strum_macros::{AsRefStr, Display};

/// Wire type of a model field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FieldType {
    String,
    Int,
    Float,
    Bool,
    List,
    Object,
    Any,
}

/// User-supplied check run after the built-in ones.
///
/// Returning `Ok(Some(value))` replaces the field's value, `Ok(None)`
/// keeps it, and `Err(reason)` rejects the field.
pub type FieldValidator =
    Arc<dyn Fn(&Value) -> std::result::Result<Option<Value>, String> + Send + Sync>;

/// Checks that a validated value deserializes into the field's Rust type.
pub type FieldDecoder = Arc<dyn Fn(&Value) -> std::result::Result<(), String> + Send + Sync>;

#[derive(Clone)]
pub struct FieldSpec {
    name: String,
    serde_name: Option<String>,
    ty: FieldType,
    required: bool,
    nullable: bool,
    default: Option<Value>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    range: Option<(i128, i128)>,
    validator: Option<FieldValidator>,
    decoder: Option<FieldDecoder>,
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name)
            .field("serde_name", &self.serde_name)
            .field("ty", &self.ty)
            .field("required", &self.required)
            .field("nullable", &self.nullable)
            .field("default", &self.default)
            .field("min_length", &self.min_length)
            .field("max_length", &self.max_length)
            .field("range", &self.range)
            .field("validator", &self.validator.is_some())
            .field("decoder", &self.decoder.is_some())
            .finish()
    }
}

impl FieldSpec {
    /// A required field of the given type.
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            serde_name: None,
            ty,
            required: true,
            nullable: false,
            default: None,
            min_length: None,
            max_length: None,
            range: None,
            validator: None,
            decoder: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Int)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Float)
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Bool)
    }

    pub fn list(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::List)
    }

    pub fn object(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Object)
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Accept an explicit `null`.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Value used when the field is absent. Implies the field is optional.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self.required = false;
        self
    }

    pub fn min_length(mut self, min: usize) -> Self {
        self.min_length = Some(min);
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    /// Inclusive bounds for an integer field.
    pub fn range(mut self, min: i128, max: i128) -> Self {
        self.range = Some((min, max));
        self
    }

    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> std::result::Result<Option<Value>, String> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Key the typed struct expects when it differs from the wire name.
    pub fn serde_name(mut self, name: impl Into<String>) -> Self {
        self.serde_name = Some(name.into());
        self
    }

    /// Reject values that pass the schema but would not deserialize as `T`.
    pub fn decodes_as<T: DeserializeOwned + 'static>(mut self) -> Self {
        self.decoder = Some(Arc::new(|value: &Value| {
            serde_json::from_value::<T>(value.clone())
                .map(|_| ())
                .map_err(|e| e.to_string())
        }));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key used when deserializing into the typed struct.
    pub fn key(&self) -> &str {
        self.serde_name.as_deref().unwrap_or(&self.name)
    }

    pub fn field_type(&self) -> FieldType {
        self.ty
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn describe(&self) -> FieldInfo {
        FieldInfo {
            name: self.name.clone(),
            ty: self.ty,
            required: self.required,
            nullable: self.nullable,
            min_length: self.min_length,
            max_length: self.max_length,
            minimum: self.range.map(|(min, _)| min),
            maximum: self.range.map(|(_, max)| max),
            default: self.default.clone(),
        }
    }

    /// Run every check for a present value, recording violations in
    /// `errors`. Returns the coerced value when the field is valid.
    fn check(&self, raw: &Value, errors: &mut ValidationErrors) -> Option<Value> {
        let value = match coerce(self.ty, raw) {
            Ok(value) => value,
            Err(violation) => {
                errors.push(&self.name, violation);
                return None;
            }
        };

        let mut valid = true;
        if let Some(actual) = measure(&value) {
            if let Some(limit) = self.min_length.filter(|min| actual < *min) {
                errors.push(
                    &self.name,
                    Violation::LengthViolation {
                        bound: LengthBound::Minimum,
                        limit,
                        actual,
                    },
                );
                valid = false;
            }
            if let Some(limit) = self.max_length.filter(|max| actual > *max) {
                errors.push(
                    &self.name,
                    Violation::LengthViolation {
                        bound: LengthBound::Maximum,
                        limit,
                        actual,
                    },
                );
                valid = false;
            }
        }
        if let (Some((min, max)), Some(actual)) = (self.range, as_integer(&value)) {
            if actual < min || actual > max {
                errors.push(&self.name, Violation::OutOfRange { min, max });
                valid = false;
            }
        }
        if !valid {
            return None;
        }

        let value = match &self.validator {
            Some(validator) => match validator(&value) {
                Ok(Some(replaced)) => replaced,
                Ok(None) => value,
                Err(reason) => {
                    errors.push(&self.name, Violation::Custom(reason));
                    return None;
                }
            },
            None => value,
        };

        if let Some(decoder) = &self.decoder {
            if let Err(reason) = decoder(&value) {
                errors.push(&self.name, Violation::InvalidValue(reason));
                return None;
            }
        }
        Some(value)
    }
}

/// Field metadata exposed through route introspection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: FieldType,
    pub required: bool,
    pub nullable: bool,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub minimum: Option<i128>,
    pub maximum: Option<i128>,
    pub default: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub fields: Vec<FieldInfo>,
}

/// Declarative description of a request body.
///
/// # Example
/// ```
/// use fennec::validation::{FieldSpec, ModelSchema};
/// use serde_json::json;
///
/// let schema = ModelSchema::new("CreateUser")
///     .field(FieldSpec::string("name").min_length(2))
///     .field(FieldSpec::int("age").default(18));
///
/// let model = schema.construct(&json!({"name": "Jo"})).unwrap();
/// assert_eq!(model.get("age"), Some(&json!(18)));
/// ```
#[derive(Debug, Clone)]
pub struct ModelSchema {
    name: String,
    fields: Vec<FieldSpec>,
}

impl ModelSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn describe(&self) -> ModelInfo {
        ModelInfo {
            name: self.name.clone(),
            fields: self.fields.iter().map(FieldSpec::describe).collect(),
        }
    }

    /// Validate `raw` against every field.
    ///
    /// All violations are collected before failing. Unknown keys are
    /// dropped from the result.
    pub fn construct(&self, raw: &Value) -> std::result::Result<ValidatedModel, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let Some(object) = raw.as_object() else {
            errors.push(
                BODY_FIELD,
                Violation::TypeMismatch {
                    expected: FieldType::Object,
                    found: json_type_name(raw),
                },
            );
            return Err(errors);
        };

        let mut values = Map::new();
        for spec in &self.fields {
            match object.get(&spec.name) {
                Some(Value::Null) if spec.nullable => {
                    values.insert(spec.name.clone(), Value::Null);
                }
                None | Some(Value::Null) => {
                    if spec.required {
                        errors.push(&spec.name, Violation::MissingField);
                    } else if let Some(default) = &spec.default {
                        values.insert(spec.name.clone(), default.clone());
                    }
                }
                Some(raw) => {
                    if let Some(value) = spec.check(raw, &mut errors) {
                        values.insert(spec.name.clone(), value);
                    }
                }
            }
        }

        if errors.is_empty() {
            let keys = self
                .fields
                .iter()
                .filter(|spec| spec.key() != spec.name)
                .map(|spec| (spec.name.clone(), spec.key().to_string()))
                .collect();
            Ok(ValidatedModel::new(self.name.clone(), values, keys))
        } else {
            Err(errors)
        }
    }
}

fn coerce(expected: FieldType, raw: &Value) -> std::result::Result<Value, Violation> {
    let coerced = match (expected, raw) {
        (FieldType::Any, value) => Some(value.clone()),
        (FieldType::String, Value::String(_)) => Some(raw.clone()),
        (FieldType::String, Value::Number(n)) => Some(Value::String(n.to_string())),
        (FieldType::String, Value::Bool(b)) => Some(Value::String(b.to_string())),
        (FieldType::Int, Value::Number(n)) => coerce_int(n),
        (FieldType::Int, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),
        (FieldType::Float, Value::Number(n)) => n.as_f64().and_then(Number::from_f64).map(Value::Number),
        (FieldType::Float, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        (FieldType::Bool, Value::Bool(_)) => Some(raw.clone()),
        (FieldType::Bool, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(Value::Bool(true)),
            "false" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
        (FieldType::List, Value::Array(_)) => Some(raw.clone()),
        (FieldType::Object, Value::Object(_)) => Some(raw.clone()),
        _ => None,
    };
    coerced.ok_or(Violation::TypeMismatch {
        expected,
        found: json_type_name(raw),
    })
}

fn coerce_int(n: &Number) -> Option<Value> {
    if n.is_i64() || n.is_u64() {
        return Some(Value::Number(n.clone()));
    }
    let f = n.as_f64()?;
    (f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64).then(|| Value::from(f as i64))
}

fn as_integer(value: &Value) -> Option<i128> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(i128::from)
            .or_else(|| n.as_u64().map(i128::from)),
        _ => None,
    }
}

/// Length used by `min_length`/`max_length`; `None` for unsized values.
fn measure(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        Value::Object(map) => Some(map.len()),
        _ => None,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_schema() -> ModelSchema {
        ModelSchema::new("CreateUser")
            .field(FieldSpec::string("name").min_length(2).max_length(50))
            .field(FieldSpec::string("email"))
            .field(FieldSpec::int("age").default(18))
    }

    #[test]
    fn test_valid_body() {
        let model = user_schema()
            .construct(&json!({"name": "Jane", "email": "j@x.com", "age": 30, "extra": true}))
            .unwrap();
        assert_eq!(model.get("name"), Some(&json!("Jane")));
        assert_eq!(model.get("age"), Some(&json!(30)));
        assert_eq!(model.get("extra"), None);
    }

    #[test]
    fn test_all_violations_are_reported() {
        let errors = user_schema().construct(&json!({"name": "J"})).unwrap_err();

        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors.field("name"),
            vec![&Violation::LengthViolation {
                bound: LengthBound::Minimum,
                limit: 2,
                actual: 1
            }]
        );
        assert_eq!(errors.field("email"), vec![&Violation::MissingField]);
    }

    #[test]
    fn test_default_fills_absent_field() {
        let model = user_schema()
            .construct(&json!({"name": "Jo", "email": "j@x.com"}))
            .unwrap();
        assert_eq!(model.get("age"), Some(&json!(18)));
    }

    #[test]
    fn test_coercion() {
        let schema = ModelSchema::new("Coerce")
            .field(FieldSpec::int("count"))
            .field(FieldSpec::float("ratio"))
            .field(FieldSpec::bool("active"))
            .field(FieldSpec::string("label"));

        let model = schema
            .construct(&json!({"count": "42", "ratio": "0.5", "active": "true", "label": 7}))
            .unwrap();
        assert_eq!(model.get("count"), Some(&json!(42)));
        assert_eq!(model.get("ratio"), Some(&json!(0.5)));
        assert_eq!(model.get("active"), Some(&json!(true)));
        assert_eq!(model.get("label"), Some(&json!("7")));
    }

    #[test]
    fn test_type_mismatch() {
        let schema = ModelSchema::new("Tags").field(FieldSpec::list("tags"));
        let errors = schema.construct(&json!({"tags": "a,b"})).unwrap_err();
        assert_eq!(
            errors.field("tags"),
            vec![&Violation::TypeMismatch {
                expected: FieldType::List,
                found: "string"
            }]
        );

        let errors = ModelSchema::new("Age")
            .field(FieldSpec::int("age"))
            .construct(&json!({"age": "thirty"}))
            .unwrap_err();
        assert_eq!(errors.fields(), vec!["age"]);
    }

    #[test]
    fn test_null_handling() {
        let schema = ModelSchema::new("Profile")
            .field(FieldSpec::string("bio").optional().nullable())
            .field(FieldSpec::string("name"));

        let model = schema.construct(&json!({"bio": null, "name": "Jo"})).unwrap();
        assert_eq!(model.get("bio"), Some(&Value::Null));

        let errors = schema.construct(&json!({"name": null})).unwrap_err();
        assert_eq!(errors.field("name"), vec![&Violation::MissingField]);
    }

    #[test]
    fn test_custom_validator_runs_after_builtin_checks() {
        let schema = ModelSchema::new("Signup").field(
            FieldSpec::string("username")
                .min_length(3)
                .validator(|value| match value.as_str() {
                    Some("admin") => Err("Username is reserved".to_string()),
                    Some(name) => Ok(Some(json!(name.to_lowercase()))),
                    None => Ok(None),
                }),
        );

        let model = schema.construct(&json!({"username": "JaneDoe"})).unwrap();
        assert_eq!(model.get("username"), Some(&json!("janedoe")));

        let errors = schema.construct(&json!({"username": "admin"})).unwrap_err();
        assert_eq!(
            errors.field("username"),
            vec![&Violation::Custom("Username is reserved".into())]
        );

        // too short: the validator is not consulted
        let errors = schema.construct(&json!({"username": "ab"})).unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_integer_range() {
        let schema = ModelSchema::new("Small").field(FieldSpec::int("age").range(0, 255));

        let errors = schema.construct(&json!({"age": 300})).unwrap_err();
        assert_eq!(
            errors.field("age"),
            vec![&Violation::OutOfRange { min: 0, max: 255 }]
        );
        assert!(schema.construct(&json!({"age": -1})).is_err());
        assert_eq!(schema.construct(&json!({"age": "255"})).unwrap().get("age"), Some(&json!(255)));
    }

    #[test]
    fn test_decoder_rejects_values_the_type_cannot_hold() {
        #[derive(Debug, serde::Deserialize)]
        #[serde(rename_all = "lowercase")]
        enum Role {
            Admin,
            Member,
        }

        let schema = ModelSchema::new("Invite")
            .field(FieldSpec::string("role").decodes_as::<Role>());

        assert!(schema.construct(&json!({"role": "member"})).is_ok());
        let errors = schema.construct(&json!({"role": "owner"})).unwrap_err();
        assert!(matches!(errors.field("role")[..], [Violation::InvalidValue(_)]));
    }

    #[test]
    fn test_non_object_body() {
        let errors = user_schema().construct(&json!([1, 2])).unwrap_err();
        assert_eq!(errors.fields(), vec!["body"]);
    }

    #[test]
    fn test_describe() {
        let info = user_schema().describe();
        assert_eq!(info.name, "CreateUser");
        assert_eq!(info.fields.len(), 3);
        assert_eq!(info.fields[0].min_length, Some(2));
        assert!(!info.fields[2].required);

        let json = serde_json::to_value(&info.fields[2]).unwrap();
        assert_eq!(json["type"], "int");
        assert_eq!(json["default"], 18);
    }
}
