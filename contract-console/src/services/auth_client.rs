//! Login and registration exchanges with the analysis service.

use super::gateway::{read_json, ApiClient, ApiError, RequestBody};
use crate::models::{
    Credential, Identity, IdentityError, IdentityRecord, LoginResponse, NewMemberAccount,
    NewVendorAccount, RegisterResponse,
};
use axum::http::Method;
use std::sync::Arc;
use thiserror::Error;

pub const LOGIN_PATH: &str = "/auth/login";
pub const REGISTER_PATH: &str = "/auth/register";
pub const REGISTER_VENDOR_PATH: &str = "/auth/register/vendor";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The service issued an identity the console will not accept.
    #[error("identity rejected: {0}")]
    InvalidIdentity(#[from] IdentityError),
}

/// Outcome of a registration exchange.
#[derive(Debug)]
pub enum Registration {
    SignedIn(Credential, Identity),
    Created(Identity),
}

pub struct AuthClient {
    api: Arc<ApiClient>,
}

impl AuthClient {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    /// Exchange email and password for a credential.
    ///
    /// The form field is named `username` even though it carries the email.
    /// A 401 here means wrong credentials and comes back as
    /// [`ApiError::Request`]; there is no session to end yet.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(Credential, Identity), AuthError> {
        let form = vec![
            ("username".to_string(), email.to_string()),
            ("password".to_string(), password.to_string()),
        ];

        let response = self
            .api
            .dispatch(Method::POST, LOGIN_PATH, RequestBody::Form(form), None)
            .await?;
        let login: LoginResponse = read_json(response).await?;

        let identity = accept_identity(login.user)?;
        metrics::counter!("console_logins_total").increment(1);
        Ok((login.access_token, identity))
    }

    pub async fn register(&self, account: &NewMemberAccount) -> Result<Registration, AuthError> {
        self.register_at(REGISTER_PATH, serde_json::to_value(account).map_err(ApiError::from)?)
            .await
    }

    pub async fn register_vendor(
        &self,
        account: &NewVendorAccount,
    ) -> Result<Registration, AuthError> {
        self.register_at(
            REGISTER_VENDOR_PATH,
            serde_json::to_value(account).map_err(ApiError::from)?,
        )
        .await
    }

    async fn register_at(
        &self,
        path: &str,
        payload: serde_json::Value,
    ) -> Result<Registration, AuthError> {
        let response = self
            .api
            .dispatch(Method::POST, path, RequestBody::Json(payload), None)
            .await?;

        match read_json::<RegisterResponse>(response).await? {
            RegisterResponse::Session(login) => {
                let identity = accept_identity(login.user)?;
                Ok(Registration::SignedIn(login.access_token, identity))
            }
            RegisterResponse::Account(record) => Ok(Registration::Created(accept_identity(record)?)),
        }
    }
}

fn accept_identity(record: IdentityRecord) -> Result<Identity, IdentityError> {
    let user_id = record.id;
    Identity::try_from(record).map_err(|e| {
        tracing::warn!(user_id, error = %e, "Authorization anomaly: identity refused at sign-in");
        metrics::counter!("console_authz_anomalies_total").increment(1);
        e
    })
}
