use axum::body::{Body, to_bytes};
use axum::http::{Request as HttpRequest, header};
use fennec::config::Settings;
use fennec::prelude::*;
use serde_json::{Value, json};
use tower::ServiceExt;

async fn echo(cx: RequestContext) -> fennec::Result<Value> {
    let name = cx.query("name").unwrap_or("world").to_string();
    Ok(json!({ "hello": name, "body": cx.json()?.clone() }))
}

fn app(settings: Settings) -> Application {
    Application::builder()
        .settings(settings)
        .get("/hello", echo)
        .post("/hello", echo)
        .websocket("/ws/chat/{room}", ChatSession::new())
        .build()
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_get_with_query_through_router() {
    let router = app(Settings::default()).into_router();

    let response = router
        .oneshot(HttpRequest::get("/hello?name=fennec").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"hello": "fennec", "body": {}}));
}

#[tokio::test]
async fn test_post_json_body_through_router() {
    let router = app(Settings::default()).into_router();

    let request = HttpRequest::post("/hello")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"x": 1}"#))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(body_json(response).await["body"], json!({"x": 1}));
}

#[tokio::test]
async fn test_errors_keep_status_and_headers() {
    let router = app(Settings::default()).into_router();

    let response = router
        .clone()
        .oneshot(HttpRequest::get("/missing").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["status"], "error");

    let response = router
        .oneshot(HttpRequest::delete("/hello").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()[header::ALLOW], "GET, POST");
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let settings = Settings {
        max_request_size: 8,
        ..Settings::default()
    };
    let router = app(settings).into_router();

    let request = HttpRequest::post("/hello")
        .body(Body::from(r#"{"far": "too long for the limit"}"#))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_plain_get_on_websocket_path_is_not_routed_over_http() {
    let router = app(Settings::default()).into_router();

    let response = router
        .oneshot(HttpRequest::get("/ws/chat/rust").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
