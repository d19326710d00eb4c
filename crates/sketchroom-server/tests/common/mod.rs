#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use sketchroom_core::MemoryStore;
use sketchroom_server::{build_app, AppState, ServerConfig};

/// Build a test `ServerConfig` bound to an ephemeral port.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..ServerConfig::default()
    }
}

/// State over a fresh in-memory store.
pub fn test_state() -> AppState {
    AppState::with_store(test_config(), Arc::new(MemoryStore::new()))
}

/// Build the full application router exactly as `main.rs` does.
pub fn build_test_app() -> (Router, AppState) {
    let state = test_state();
    (build_app(state.clone()), state)
}

/// Who a request acts as.
pub enum As<'a> {
    Guest,
    User(&'a str, &'a str),
}

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    who: As<'_>,
    body: Option<Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let As::User(id, name) = who {
        builder = builder.header("x-user-id", id).header("x-user-name", name);
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, As::Guest, None).await
}

pub async fn post_json(app: &Router, uri: &str, who: As<'_>, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, who, Some(body)).await
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Create a room as `alice` and return its id.
pub async fn create_room(app: &Router, body: Value) -> String {
    let response = post_json(app, "/api/rooms", As::User("alice", "Alice"), body).await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    let json = body_json(response).await;
    json["roomId"].as_str().unwrap().to_string()
}
