#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use maayegue_progression::db::ProgressStore;
use maayegue_progression::gamification::Engine;

pub async fn create_test_app() -> Router {
    let store = ProgressStore::in_memory().await.unwrap();
    maayegue_progression::create_app_with_store(Some(store), Engine::default())
}

pub fn create_app_without_store() -> Router {
    maayegue_progression::create_app_with_store(None, Engine::default())
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(
        app,
        Request::builder().uri(uri).body(Body::empty()).unwrap(),
    )
    .await
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

pub async fn post_raw(app: &Router, uri: &str, body: &'static str) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap(),
    )
    .await
}

pub async fn post_empty(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

pub async fn create_learner(app: &Router, user_id: &str, username: &str) {
    let (status, _) = post_json(
        app,
        "/api/learners",
        serde_json::json!({ "userId": user_id, "username": username }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}
