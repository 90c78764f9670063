use fennec::prelude::*;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::OnceLock;

mod database;
mod users;

use database::{Database, DbSession};

async fn health(cx: RequestContext) -> Result<Value> {
    let settings = cx.service::<Settings>()?;
    Ok(json!({ "status": "healthy", "debug": settings.debug }))
}

async fn routes(cx: RequestContext) -> Result<Value> {
    let index = cx.service::<RouteIndex>()?;
    Ok(json!(index.0.get()))
}

/// Route metadata for the `/routes` endpoint, filled in once the
/// application is built.
struct RouteIndex(OnceLock<Vec<fennec::RouteInfo>>);

/// Shared password for the demo login; real apps check a user store.
const DEMO_PASSWORD: &str = "fennec";

#[derive(Debug, Deserialize, Model)]
struct Login {
    #[field(min_length = 3, max_length = 32)]
    username: String,
    #[field(min_length = 1)]
    password: String,
}

async fn issue_token(cx: RequestContext) -> Result<Value> {
    let login: Login = cx.body()?;
    if login.password != DEMO_PASSWORD {
        return Err(FennecError::unauthorized("Invalid credentials"));
    }
    let mut claims = Claims::new(login.username.as_str());
    if login.username == "admin" {
        claims = claims.with_role("admin");
    }
    let token = cx.service::<JwtHandler>()?.encode(claims)?;
    Ok(json!({ "access_token": token, "token_type": "bearer" }))
}

async fn me(cx: RequestContext) -> Result<Value> {
    let claims = cx.dependency::<Claims>("current_user")?;
    Ok(json!({ "user": claims.sub, "roles": claims.roles }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fennec::logging::init();

    let settings = Settings::from_env()?;
    settings.validate()?;

    let db = Arc::new(Database::new());
    let db_provider = {
        let db = Arc::clone(&db);
        scoped(
            move |_cx: DependencyContext| {
                let db = Arc::clone(&db);
                async move { db.session() }
            },
            |session: Arc<DbSession>| async move { session.release() },
        )
    };

    let jwt = JwtHandler::from_settings(&settings);
    let current_user = {
        let jwt = jwt.clone();
        provider_fn(move |cx: DependencyContext| {
            let jwt = jwt.clone();
            async move { jwt.authenticate(cx.request()) }
        })
    };

    let index = Arc::new(RouteIndex(OnceLock::new()));
    let app = Application::builder()
        .title("Fennec Chat")
        .settings(settings.clone())
        .middleware(SecurityHeadersMiddleware::new())
        .middleware(CorsMiddleware::from_settings(&settings))
        .middleware(RateLimitMiddleware::from_settings(&settings.rate_limit))
        .middleware(BearerAuthMiddleware::new(jwt.clone()).required(false))
        .dependency("db", db_provider)
        .dependency("current_user", current_user)
        .service(jwt)
        .get("/health", health)
        .route(Route::post("/auth/token", issue_token).model::<Login>())
        .route(Route::get("/me", me).depends_on("current_user"))
        .get("/routes", routes)
        .include_router(users::router(), "/api/v1")
        .websocket("/ws/chat/{room}", ChatSession::new())
        .websocket("/ws/lobby", Lobby)
        .service_arc(Arc::clone(&index))
        .on_startup("database", {
            let db = Arc::clone(&db);
            move || {
                let db = Arc::clone(&db);
                async move { db.connect().await }
            }
        })
        .on_shutdown("database", {
            let db = Arc::clone(&db);
            move || {
                let db = Arc::clone(&db);
                async move { db.disconnect().await }
            }
        })
        .build()?;

    let listing = app.routes();
    for route in &listing {
        tracing::info!("{:>6} {}", route.method, route.path);
    }
    let _ = index.0.set(listing);
    app.serve().await
}
