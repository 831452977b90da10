pub mod app;
pub mod auth;
pub mod metrics;
pub mod proxy;
pub mod views;

use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect, Response},
};

fn is_htmx(headers: &HeaderMap) -> bool {
    headers.contains_key("hx-request")
}

/// htmx requests are told where to go with `HX-Redirect`; plain form posts
/// get a 303.
pub(crate) fn redirect(headers: &HeaderMap, target: &str) -> Response {
    if is_htmx(headers) {
        if let Ok(value) = HeaderValue::from_str(target) {
            return (StatusCode::OK, [("hx-redirect", value)]).into_response();
        }
    }
    Redirect::to(target).into_response()
}
