use fennec::FennecError;
use fennec::Model;
use fennec::validation::{FieldType, Model as _, Violation};
use serde::Deserialize;
use serde_json::{Value, json};

fn no_admins(value: &Value) -> Result<Option<Value>, String> {
    match value.as_str() {
        Some(name) if name.eq_ignore_ascii_case("admin") => Err("Reserved username".to_string()),
        Some(name) => Ok(Some(Value::String(name.to_lowercase()))),
        None => Ok(None),
    }
}

#[derive(Debug, Deserialize, Model)]
#[model(name = "SignupRequest")]
struct Signup {
    #[field(min_length = 3, max_length = 16, validator = no_admins)]
    username: String,
    #[field(rename = "emailAddress")]
    #[serde(rename = "emailAddress")]
    email: String,
    #[field(default = 18)]
    age: i64,
    nickname: Option<String>,
    #[field(max_length = 3)]
    tags: Vec<String>,
    newsletter: bool,
}

#[test]
fn test_schema_shape() {
    let info = Signup::schema().describe();
    assert_eq!(info.name, "SignupRequest");

    let names: Vec<&str> = info.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["username", "emailAddress", "age", "nickname", "tags", "newsletter"]
    );

    let types: Vec<FieldType> = info.fields.iter().map(|f| f.ty).collect();
    assert_eq!(
        types,
        vec![
            FieldType::String,
            FieldType::String,
            FieldType::Int,
            FieldType::String,
            FieldType::List,
            FieldType::Bool,
        ]
    );

    assert!(info.fields[0].required);
    assert!(!info.fields[2].required);
    assert_eq!(info.fields[2].default, Some(json!(18)));
    assert!(info.fields[3].nullable);
    assert_eq!(info.fields[0].min_length, Some(3));
}

#[test]
fn test_valid_body_is_coerced_defaulted_and_transformed() {
    let signup = Signup::from_json(&json!({
        "username": "Ferris",
        "emailAddress": "ferris@example.com",
        "tags": ["rust"],
        "newsletter": "true",
        "unknown": 1,
    }))
    .unwrap();

    assert_eq!(signup.username, "ferris");
    assert_eq!(signup.email, "ferris@example.com");
    assert_eq!(signup.age, 18);
    assert_eq!(signup.nickname, None);
    assert_eq!(signup.tags, vec!["rust"]);
    assert!(signup.newsletter);
}

#[test]
fn test_every_violation_is_reported() {
    let err = Signup::from_json(&json!({
        "username": "admin",
        "age": "old",
        "tags": ["a", "b", "c", "d"],
        "newsletter": false,
        "nickname": null,
    }))
    .unwrap_err();

    let FennecError::ValidationFailed(errors) = err else {
        panic!("expected validation failure, got {err}");
    };
    assert_eq!(errors.fields(), vec!["username", "emailAddress", "age", "tags"]);
    assert_eq!(
        errors.field("username"),
        vec![&Violation::Custom("Reserved username".to_string())]
    );
    assert_eq!(errors.field("emailAddress"), vec![&Violation::MissingField]);
}

#[test]
fn test_length_checked_before_custom_validator() {
    let err = Signup::from_json(&json!({
        "username": "ab",
        "emailAddress": "x@y.z",
        "tags": [],
        "newsletter": true,
    }))
    .unwrap_err();

    let FennecError::ValidationFailed(errors) = err else {
        panic!("expected validation failure, got {err}");
    };
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.iter().next().unwrap().violation.to_string(), "Minimum length is 3");
}

#[derive(Debug, Deserialize, Model)]
struct Profile {
    age: u8,
    #[field(rename = "userName")]
    user_name: String,
    #[serde(default)]
    shoe_size: Option<u16>,
}

#[test]
fn test_fixed_width_integer_is_bounded() {
    let info = Profile::schema().describe();
    assert_eq!(info.fields[0].minimum, Some(0));
    assert_eq!(info.fields[0].maximum, Some(255));

    let err = Profile::from_json(&json!({"age": 300, "userName": "Jane"})).unwrap_err();
    assert_eq!(err.status(), fennec::http::StatusCode::UNPROCESSABLE_ENTITY);
    let FennecError::ValidationFailed(errors) = err else {
        panic!("expected validation failure, got {err}");
    };
    assert_eq!(
        errors.field("age"),
        vec![&Violation::OutOfRange { min: 0, max: 255 }]
    );

    let err = Profile::from_json(&json!({"age": 30, "userName": "Jane", "shoe_size": -4}))
        .unwrap_err();
    let FennecError::ValidationFailed(errors) = err else {
        panic!("expected validation failure, got {err}");
    };
    assert_eq!(errors.fields(), vec!["shoe_size"]);
}

#[test]
fn test_field_rename_reaches_the_struct() {
    let profile = Profile::from_json(&json!({"age": 30, "userName": "Jane"})).unwrap();
    assert_eq!(profile.user_name, "Jane");
    assert_eq!(profile.age, 30);
    assert_eq!(profile.shoe_size, None);

    let err = Profile::from_json(&json!({"age": 30, "user_name": "Jane"})).unwrap_err();
    let FennecError::ValidationFailed(errors) = err else {
        panic!("expected validation failure, got {err}");
    };
    assert_eq!(errors.field("userName"), vec![&Violation::MissingField]);
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
enum Plan {
    Free,
    Pro,
}

#[derive(Debug, Deserialize, Model)]
#[serde(rename_all = "camelCase")]
struct Subscription {
    billing_email: String,
    plan: Plan,
}

#[test]
fn test_serde_rename_all_drives_wire_names() {
    let names: Vec<String> = Subscription::schema()
        .describe()
        .fields
        .into_iter()
        .map(|f| f.name)
        .collect();
    assert_eq!(names, vec!["billingEmail", "plan"]);

    let sub = Subscription::from_json(&json!({"billingEmail": "a@b.c", "plan": "pro"})).unwrap();
    assert_eq!(sub.plan, Plan::Pro);

    let err = Subscription::from_json(&json!({"billingEmail": "a@b.c", "plan": "gold"}))
        .unwrap_err();
    let FennecError::ValidationFailed(errors) = err else {
        panic!("expected validation failure, got {err}");
    };
    assert!(matches!(errors.field("plan")[..], [Violation::InvalidValue(_)]));
}
