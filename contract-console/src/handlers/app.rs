use crate::middleware::session::ConsoleSession;
use axum::response::{IntoResponse, Redirect};

/// Land on the entry view of whoever is (or is not) signed in.
pub async fn index(session: ConsoleSession) -> impl IntoResponse {
    let resolution = session.resolution();
    Redirect::to(&resolution.entry_view.path())
}

pub async fn health_check() -> &'static str {
    "OK"
}
