//! The one path by which console code reaches the analysis service.
//!
//! Every authenticated call goes through [`ApiClient::request`], which
//! attaches the session's bearer credential and ends the session when the
//! service rejects it.

use crate::config::AnalysisServiceSettings;
use crate::models::Credential;
use crate::session::{SessionContext, StorageBackend};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use console_core::observability::TracedClientExt;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

const UNKNOWN_ERROR: &str = "Unknown error";

#[derive(Debug, Error)]
pub enum ApiError {
    /// The service answered 401. The session has already been ended.
    #[error("credential rejected by the analysis service")]
    Unauthorized,

    #[error("{message}")]
    Request { status: StatusCode, message: String },

    /// The issuing session was logged out (or replaced) while the request
    /// was in flight; the response was discarded.
    #[error("session ended before the response arrived")]
    SessionEnded,

    #[error("request to analysis service failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

pub enum RequestBody {
    Empty,
    Json(Value),
    /// URL-encoded form fields.
    Form(Vec<(String, String)>),
    /// Content type and boundary are set by reqwest.
    Multipart(reqwest::multipart::Form),
}

pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(settings: AnalysisServiceSettings) -> Self {
        Self::with_client(Client::new(), settings.url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Issue a call on behalf of `session`.
    ///
    /// The bearer header is attached when the session is authenticated. A
    /// 401 ends the session and yields [`ApiError::Unauthorized`]; any other
    /// non-2xx yields [`ApiError::Request`] with the service's message. A
    /// 2xx body is decoded as `T` (an empty body decodes as JSON `null`).
    /// Responses that arrive after the session's credential was replaced or
    /// removed yield [`ApiError::SessionEnded`] and leave the session alone.
    pub async fn request<T, B>(
        &self,
        session: &SessionContext<B>,
        method: Method,
        path: &str,
        body: RequestBody,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: StorageBackend,
    {
        let credential = session.credential();
        let response = self
            .dispatch(method.clone(), path, body, credential.as_ref())
            .await?;

        // A response for a credential that is no longer current must not
        // touch the session, not even on 401.
        if let Some(credential) = &credential {
            if !session.is_current(credential).await {
                tracing::debug!(%method, path, "Discarding response for an ended session");
                return Err(ApiError::SessionEnded);
            }
        }

        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!(%method, path, "Credential rejected by analysis service, ending session");
            metrics::counter!("console_credential_rejections_total").increment(1);
            session.logout().await;
            return Err(ApiError::Unauthorized);
        }

        read_json(response).await
    }

    pub async fn get<T, B>(&self, session: &SessionContext<B>, path: &str) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: StorageBackend,
    {
        self.request(session, Method::GET, path, RequestBody::Empty)
            .await
    }

    pub async fn post_json<T, B, P>(
        &self,
        session: &SessionContext<B>,
        path: &str,
        payload: &P,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: StorageBackend,
        P: Serialize + ?Sized,
    {
        let body = RequestBody::Json(serde_json::to_value(payload)?);
        self.request(session, Method::POST, path, body).await
    }

    pub async fn patch_json<T, B, P>(
        &self,
        session: &SessionContext<B>,
        path: &str,
        payload: &P,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: StorageBackend,
        P: Serialize + ?Sized,
    {
        let body = RequestBody::Json(serde_json::to_value(payload)?);
        self.request(session, Method::PATCH, path, body).await
    }

    pub async fn delete<T, B>(&self, session: &SessionContext<B>, path: &str) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: StorageBackend,
    {
        self.request(session, Method::DELETE, path, RequestBody::Empty)
            .await
    }

    pub async fn upload<T, B>(
        &self,
        session: &SessionContext<B>,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: StorageBackend,
    {
        self.request(session, Method::POST, path, RequestBody::Multipart(form))
            .await
    }

    /// Send a request without any session handling. Used directly only by
    /// the authentication exchanges, which run before a credential exists.
    pub(crate) async fn dispatch(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        credential: Option<&Credential>,
    ) -> Result<reqwest::Response, ApiError> {
        let url = self.url(path);
        let mut request = self.client.traced_request(method.clone(), &url);

        if let Some(credential) = credential {
            request = request.bearer_auth(credential.expose());
        }

        request = match body {
            RequestBody::Empty => request,
            RequestBody::Json(value) => request.json(&value),
            RequestBody::Form(fields) => request.form(&fields),
            RequestBody::Multipart(form) => request.multipart(form),
        };

        request.send().await.map_err(|e| {
            tracing::error!(%method, url = %url, error = %e, "Failed to reach analysis service");
            ApiError::Transport(e)
        })
    }
}

/// Decode a 2xx body, or turn a non-2xx into [`ApiError::Request`].
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ApiError> {
    let status = response.status();
    let bytes = response.bytes().await?;

    if !status.is_success() {
        let message = error_message(status, &bytes);
        tracing::debug!(status = status.as_u16(), message = %message, "Analysis service returned an error");
        return Err(ApiError::Request { status, message });
    }

    if bytes.is_empty() {
        return Ok(serde_json::from_slice(b"null")?);
    }
    Ok(serde_json::from_slice(&bytes)?)
}

/// Human-readable message for a failed call.
///
/// The service reports errors as `{"detail": ...}` where `detail` is a string
/// or a list of validation errors each carrying `msg`.
pub fn error_message(status: StatusCode, body: &[u8]) -> String {
    match serde_json::from_slice::<Value>(body) {
        Ok(value) => detail_message(&value).unwrap_or_else(|| {
            format!(
                "API Error: {}",
                status.canonical_reason().unwrap_or(status.as_str())
            )
        }),
        Err(_) => UNKNOWN_ERROR.to_string(),
    }
}

fn detail_message(value: &Value) -> Option<String> {
    match value.get("detail")? {
        Value::String(detail) if !detail.is_empty() => Some(detail.clone()),
        Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            }
        }
        _ => None,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            // Full reload: the console re-resolves from the unauthenticated
            // surface.
            ApiError::Unauthorized | ApiError::SessionEnded => {
                let mut response = StatusCode::SEE_OTHER.into_response();
                let headers = response.headers_mut();
                headers.insert(header::LOCATION, HeaderValue::from_static("/"));
                headers.insert("hx-refresh", HeaderValue::from_static("true"));
                response
            }
            ApiError::Request { status, message } => {
                (status, Json(serde_json::json!({ "detail": message }))).into_response()
            }
            ApiError::Transport(_) => (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "detail": "Analysis service unavailable" })),
            )
                .into_response(),
            ApiError::Decode(e) => {
                tracing::error!(error = %e, "Undecodable response from analysis service");
                (
                    StatusCode::BAD_GATEWAY,
                    Json(serde_json::json!({ "detail": "Unexpected response from analysis service" })),
                )
                    .into_response()
            }
        }
    }
}
