use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{any, get, post},
    Router,
};
use console_core::middleware::{
    metrics::metrics_middleware, security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use time::Duration;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::handlers::{
    app::{health_check, index},
    auth::{login_handler, login_page, logout_handler, register_handler, register_page},
    metrics::metrics,
    proxy::proxy_handler,
    views::{session_summary, view_handler},
};
use crate::middleware::session::session_context_middleware;
use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    let settings = &state.session_settings;
    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store.clone())
        .with_name(settings.cookie_name.clone())
        .with_secure(settings.secure_cookie)
        .with_expiry(Expiry::OnInactivity(Duration::hours(
            settings.inactivity_hours,
        )));

    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/login", get(login_page).post(login_handler))
        .route("/register", get(register_page).post(register_handler))
        .route("/logout", post(logout_handler))
        .route("/view/:view", get(view_handler))
        .route("/session", get(session_summary))
        .route("/api/*path", any(proxy_handler))
        .nest_service("/static", ServeDir::new("contract-console/static"))
        // Restore runs inside the session layer so the record is loaded.
        .layer(from_fn_with_state(
            session_store,
            session_context_middleware,
        ))
        .layer(session_layer)
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
