//! Browser calls to the analysis service, forwarded with the session's
//! credential.

use crate::authz::api_guard::{is_forwardable, required_capability};
use crate::middleware::session::ConsoleSession;
use crate::services::{ApiError, RequestBody};
use crate::AppState;
use anyhow::anyhow;
use axum::{
    extract::{FromRequest, Multipart, Path, RawQuery, Request, State},
    http::{header, Method},
    response::{IntoResponse, Response},
    Form, Json,
};
use console_core::error::AppError;
use serde_json::Value;

const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

pub async fn proxy_handler(
    State(state): State<AppState>,
    session: ConsoleSession,
    method: Method,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    request: Request,
) -> Response {
    if !session.0.is_authenticated() {
        return ApiError::Unauthorized.into_response();
    }

    if !is_forwardable(&path) {
        tracing::warn!(%method, path = %path, "Refusing API path that does not name a single route");
        return AppError::BadRequest(anyhow!("unsupported API path")).into_response();
    }

    if let Some(required) = required_capability(&method, &path) {
        if !session.resolution().can(required) {
            tracing::warn!(
                %method,
                path = %path,
                capability = required.as_str(),
                "Refusing remote action outside the session's capabilities"
            );
            return AppError::Forbidden(anyhow!("{} is not available to this account", required.as_str()))
                .into_response();
        }
    }

    let target = match query.filter(|q| !q.is_empty()) {
        Some(query) => format!("/{}?{}", path.trim_start_matches('/'), query),
        None => format!("/{}", path.trim_start_matches('/')),
    };

    let body = match read_body(request, &state).await {
        Ok(body) => body,
        Err(e) => return e.into_response(),
    };

    match state
        .api_client
        .request::<Value, _>(&session.0, method, &target, body)
        .await
    {
        Ok(value) => Json(value).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn read_body(request: Request, state: &AppState) -> Result<RequestBody, AppError> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, state)
            .await
            .map_err(|e| AppError::BadRequest(anyhow!(e.body_text())))?;
        return Ok(RequestBody::Multipart(into_upload_form(multipart).await?));
    }

    if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(fields) = Form::<Vec<(String, String)>>::from_request(request, state)
            .await
            .map_err(|e| AppError::BadRequest(anyhow!(e.body_text())))?;
        return Ok(RequestBody::Form(fields));
    }

    let bytes = axum::body::to_bytes(request.into_body(), MAX_BODY_BYTES)
        .await
        .map_err(|e| AppError::BadRequest(anyhow!("unreadable request body: {e}")))?;

    if bytes.is_empty() {
        return Ok(RequestBody::Empty);
    }

    let value = serde_json::from_slice::<Value>(&bytes)
        .map_err(|e| AppError::BadRequest(anyhow!("request body is not valid JSON: {e}")))?;
    Ok(RequestBody::Json(value))
}

/// Re-encode an incoming upload field by field. reqwest picks a fresh
/// boundary and content type.
async fn into_upload_form(
    mut multipart: Multipart,
) -> Result<reqwest::multipart::Form, AppError> {
    let mut form = reqwest::multipart::Form::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(anyhow!(e.body_text())))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let mime = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(anyhow!(e.body_text())))?;

        let mut part = reqwest::multipart::Part::bytes(bytes.to_vec());
        if let Some(file_name) = file_name {
            part = part.file_name(file_name);
        }
        if let Some(mime) = mime {
            part = part
                .mime_str(&mime)
                .map_err(|e| AppError::BadRequest(anyhow!("invalid part content type: {e}")))?;
        }
        form = form.part(name, part);
    }

    Ok(form)
}
