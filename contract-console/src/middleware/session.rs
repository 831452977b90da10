use crate::authz::{AuthorizationRouter, Resolution};
use crate::session::{BrowserSession, CredentialStore, SessionContext};
use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, Request},
    middleware::Next,
    response::Response,
};
use console_core::error::AppError;
use std::sync::Arc;
use tower_sessions::{MemoryStore, Session};

/// Session context backed by the browser's session record.
pub type SessionHandle = Arc<SessionContext<BrowserSession>>;

/// Restore the session once, before any handler runs, and make it available
/// to the request.
pub async fn session_context_middleware(
    State(store): State<MemoryStore>,
    session: Session,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let backend = BrowserSession::new(session, store);
    let context = SessionContext::restore(CredentialStore::new(backend)).await;
    request.extensions_mut().insert::<SessionHandle>(Arc::new(context));

    next.run(request).await
}

/// Extractor for the restored session of the current request.
#[derive(Clone)]
pub struct ConsoleSession(pub SessionHandle);

impl ConsoleSession {
    /// Re-resolved on every call; there is no cached resolution to go stale.
    pub fn resolution(&self) -> Resolution {
        AuthorizationRouter::resolve(&self.0.state())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ConsoleSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionHandle>()
            .cloned()
            .map(ConsoleSession)
            .ok_or_else(|| {
                tracing::error!("Session context missing; session middleware not installed");
                AppError::InternalError(anyhow::anyhow!("session context unavailable"))
            })
    }
}
