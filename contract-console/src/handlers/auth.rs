use super::redirect;
use crate::middleware::session::ConsoleSession;
use crate::models::{Credential, Identity, NewMemberAccount, NewVendorAccount};
use crate::services::{ApiError, AuthError, Registration};
use crate::AppState;
use askama::Template;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use tower_sessions::Session;
use validator::{Validate, ValidationErrors};

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub error: Option<String>,
    pub notice: Option<String>,
}

#[derive(Template)]
#[template(path = "register.html")]
pub struct RegisterTemplate {
    pub error: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Enter your password"))]
    pub password: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    #[default]
    Manager,
    Vendor,
}

#[derive(Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "Enter your full name"))]
    pub full_name: String,
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Choose a password"))]
    pub password: String,
    #[serde(default)]
    pub account_type: AccountType,
    #[serde(default)]
    pub company_id: String,
    #[serde(default)]
    pub invite_code: String,
}

enum Account {
    Member(NewMemberAccount),
    Vendor(NewVendorAccount),
}

impl RegisterRequest {
    fn into_account(self) -> Result<Account, &'static str> {
        match self.account_type {
            AccountType::Manager => {
                let company_id = self
                    .company_id
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| "Select the company you belong to")?;
                Ok(Account::Member(NewMemberAccount::manager(
                    self.full_name,
                    self.email,
                    self.password,
                    company_id,
                )))
            }
            AccountType::Vendor => {
                let invite_code = self.invite_code.trim();
                if invite_code.is_empty() {
                    return Err("Enter the invite code you received");
                }
                Ok(Account::Vendor(NewVendorAccount {
                    invite_code: invite_code.to_string(),
                    full_name: self.full_name,
                    email: self.email,
                    password: self.password,
                }))
            }
        }
    }
}

fn first_message(errors: &ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|errors| errors.iter())
        .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "Please check your inputs".to_string())
}

fn login_failed(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        LoginTemplate {
            error: Some(message.into()),
            notice: None,
        },
    )
        .into_response()
}

fn registration_failed(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        RegisterTemplate {
            error: Some(message.into()),
        },
    )
        .into_response()
}

/// Start a fresh session for a newly authenticated user.
///
/// A session that is already signed in is ended first. The session id is
/// rotated so an id handed out before sign-in never carries the credential.
async fn begin_session(
    record: &Session,
    session: &ConsoleSession,
    credential: Credential,
    identity: Identity,
) {
    if let Some(previous) = session.0.identity() {
        tracing::info!(
            user_id = previous.id,
            "Signing in over an existing session, ending it first"
        );
        session.0.logout().await;
    }

    if let Err(e) = record.cycle_id().await {
        tracing::warn!(error = %e, "Failed to rotate session id");
    }

    session.0.login(credential, identity).await;
}

pub async fn login_page(session: ConsoleSession) -> Response {
    if session.0.is_authenticated() {
        return Redirect::to("/").into_response();
    }
    LoginTemplate {
        error: None,
        notice: None,
    }
    .into_response()
}

pub async fn register_page(session: ConsoleSession) -> Response {
    if session.0.is_authenticated() {
        return Redirect::to("/").into_response();
    }
    RegisterTemplate { error: None }.into_response()
}

pub async fn login_handler(
    State(state): State<AppState>,
    record: Session,
    session: ConsoleSession,
    headers: HeaderMap,
    Form(payload): Form<LoginRequest>,
) -> Response {
    if let Err(errors) = payload.validate() {
        return login_failed(StatusCode::UNPROCESSABLE_ENTITY, first_message(&errors));
    }

    match state
        .auth_client
        .login(&payload.email, &payload.password)
        .await
    {
        Ok((credential, identity)) => {
            begin_session(&record, &session, credential, identity).await;
            redirect(&headers, "/")
        }
        Err(AuthError::Api(ApiError::Transport(_))) => login_failed(
            StatusCode::BAD_GATEWAY,
            "The analysis service is unavailable, try again shortly",
        ),
        Err(e) => {
            tracing::info!(email = %payload.email, error = %e, "Login refused");
            login_failed(StatusCode::UNPROCESSABLE_ENTITY, "Invalid email or password")
        }
    }
}

pub async fn register_handler(
    State(state): State<AppState>,
    record: Session,
    session: ConsoleSession,
    headers: HeaderMap,
    Form(payload): Form<RegisterRequest>,
) -> Response {
    if let Err(errors) = payload.validate() {
        return registration_failed(StatusCode::UNPROCESSABLE_ENTITY, first_message(&errors));
    }

    let account = match payload.into_account() {
        Ok(account) => account,
        Err(message) => return registration_failed(StatusCode::UNPROCESSABLE_ENTITY, message),
    };

    let outcome = match &account {
        Account::Member(account) => state.auth_client.register(account).await,
        Account::Vendor(account) => state.auth_client.register_vendor(account).await,
    };

    match outcome {
        Ok(Registration::SignedIn(credential, identity)) => {
            begin_session(&record, &session, credential, identity).await;
            redirect(&headers, "/")
        }
        Ok(Registration::Created(identity)) => {
            tracing::info!(user_id = identity.id, role = %identity.role, "Account registered");
            LoginTemplate {
                error: None,
                notice: Some("Account created! Please sign in.".to_string()),
            }
            .into_response()
        }
        Err(AuthError::Api(ApiError::Request { status, message })) => {
            tracing::info!(status = status.as_u16(), message = %message, "Registration refused");
            registration_failed(StatusCode::UNPROCESSABLE_ENTITY, message)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Registration failed");
            registration_failed(
                StatusCode::BAD_GATEWAY,
                "Registration failed. Please check your inputs.",
            )
        }
    }
}

pub async fn logout_handler(session: ConsoleSession, headers: HeaderMap) -> Response {
    session.0.logout().await;
    redirect(&headers, "/")
}
