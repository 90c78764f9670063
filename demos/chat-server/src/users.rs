use crate::database::DbSession;
use fennec::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const TABLE: &str = "users";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub age: i64,
}

#[derive(Debug, Deserialize, Model)]
pub struct CreateUser {
    #[field(min_length = 2, max_length = 50)]
    pub name: String,
    #[field(validator = check_email)]
    pub email: String,
    #[field(default = 18)]
    pub age: i64,
}

fn check_email(value: &Value) -> std::result::Result<Option<Value>, String> {
    match value.as_str() {
        Some(email) if email.contains('@') => Ok(Some(Value::String(email.trim().to_lowercase()))),
        _ => Err("Invalid email address".to_string()),
    }
}

fn load(db: &DbSession, id: &str) -> Result<User> {
    let row = db
        .get(TABLE, id)
        .ok_or_else(|| FennecError::not_found(format!("User {id} not found")))?;
    serde_json::from_str(&row).map_err(|e| FennecError::internal(e.to_string()))
}

async fn list_users(cx: RequestContext) -> Result<ApiResponse<Vec<User>>> {
    let db = cx.dependency::<DbSession>("db")?;
    let mut users: Vec<User> = db
        .scan(TABLE)
        .iter()
        .filter_map(|row| serde_json::from_str(row).ok())
        .collect();
    if let Some(limit) = cx.query("limit").and_then(|l| l.parse::<usize>().ok()) {
        users.truncate(limit);
    }
    Ok(ApiResponse::success(users))
}

async fn get_user(cx: RequestContext) -> Result<ApiResponse<User>> {
    let db = cx.dependency::<DbSession>("db")?;
    let id = cx.param("id").unwrap_or_default();
    Ok(ApiResponse::success(load(&db, id)?))
}

async fn create_user(cx: RequestContext) -> Result<ApiResponse<User>> {
    let db = cx.dependency::<DbSession>("db")?;
    let input: CreateUser = cx.body()?;
    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        name: input.name,
        email: input.email,
        age: input.age,
    };
    let row = serde_json::to_string(&user).map_err(|e| FennecError::internal(e.to_string()))?;
    db.insert(TABLE, &user.id, row);

    let email = user.email.clone();
    cx.background().add("welcome-email", async move {
        tracing::info!("Sending welcome email to {}", email);
        Ok(())
    });

    Ok(ApiResponse::success(user)
        .with_message("User created")
        .with_status(StatusCode::CREATED))
}

async fn delete_user(cx: RequestContext) -> Result<ApiResponse<()>> {
    let db = cx.dependency::<DbSession>("db")?;
    let id = cx.param("id").unwrap_or_default();
    db.remove(TABLE, id)
        .ok_or_else(|| FennecError::not_found(format!("User {id} not found")))?;
    Ok(ApiResponse::message("User deleted"))
}

pub fn router() -> Router {
    Router::new("/users")
        .route(Route::get("", list_users).depends_on("db").name("list_users"))
        .route(
            Route::post("", create_user)
                .model::<CreateUser>()
                .depends_on("db")
                .name("create_user"),
        )
        .route(Route::get("/{id}", get_user).depends_on("db").name("get_user"))
        .route(
            Route::delete("/{id}", delete_user)
                .depends_on("db")
                .guard(RoleGuard::any(["admin"]))
                .name("delete_user"),
        )
}
