//! Login and registration exchange payloads.

use super::identity::{Credential, IdentityRecord};
use serde::{Deserialize, Serialize};

/// Response of `POST /auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub access_token: Credential,
    #[serde(default)]
    pub token_type: Option<String>,
    pub user: IdentityRecord,
}

/// Registration through a tenant (company) the user joins as manager.
#[derive(Serialize)]
pub struct NewMemberAccount {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub role: &'static str,
    pub company_id: Option<i64>,
}

impl NewMemberAccount {
    pub fn manager(full_name: String, email: String, password: String, company_id: i64) -> Self {
        Self {
            full_name,
            email,
            password,
            role: "manager",
            company_id: Some(company_id),
        }
    }
}

/// Registration of a vendor user through an invite code.
#[derive(Serialize)]
pub struct NewVendorAccount {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub invite_code: String,
}

/// Registration either signs the user straight in or only creates the
/// account.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RegisterResponse {
    Session(LoginResponse),
    Account(IdentityRecord),
}
