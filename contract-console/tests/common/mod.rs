//! Shared helpers for console integration tests.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use contract_console::config::SessionSettings;
use contract_console::services::ApiClient;
use contract_console::startup::build_router;
use contract_console::AppState;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;
use wiremock::MockServer;

/// Console router talking to a mock analysis service.
pub fn console(server: &MockServer) -> Router {
    let api = Arc::new(ApiClient::with_client(reqwest::Client::new(), server.uri()));
    build_router(AppState::new(api, SessionSettings::default()))
}

pub fn user(id: i64, role: &str, company_id: Option<i64>, vendor_id: Option<i64>) -> Value {
    json!({
        "id": id,
        "email": format!("user{id}@corp.com"),
        "full_name": format!("User {id}"),
        "role": role,
        "company_id": company_id,
        "vendor_id": vendor_id,
    })
}

pub fn login_body(token: &str, user: Value) -> Value {
    json!({ "access_token": token, "token_type": "bearer", "user": user })
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_form(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// `name=value` of the session cookie set by a response.
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("console_session="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

pub fn location(response: &Response<Body>) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}
