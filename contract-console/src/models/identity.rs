//! Authenticated principal and bearer credential.

use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The closed set of console roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    CompanyAdmin,
    Manager,
    Vendor,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::SuperAdmin,
        Role::CompanyAdmin,
        Role::Manager,
        Role::Vendor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::CompanyAdmin => "company_admin",
            Role::Manager => "manager",
            Role::Vendor => "vendor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(Role::SuperAdmin),
            "company_admin" => Ok(Role::CompanyAdmin),
            "manager" => Ok(Role::Manager),
            "vendor" => Ok(Role::Vendor),
            other => Err(IdentityError::UnknownRole(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("unknown role '{0}'")]
    UnknownRole(String),

    #[error("vendor identity has no vendor_id")]
    MissingVendorAffiliation,

    #[error("{0} identity has no company_id")]
    MissingCompanyAffiliation(Role),

    #[error("{0} identity carries an affiliation it must not have")]
    UnexpectedAffiliation(Role),
}

/// Identity as it appears on the wire and in the session store, before the
/// role and affiliation rules are checked.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityRecord {
    pub id: i64,
    pub email: String,
    pub full_name: String,
    pub role: String,
    #[serde(default)]
    pub vendor_id: Option<i64>,
    #[serde(default)]
    pub company_id: Option<i64>,
}

/// The authenticated principal.
///
/// Deserialisation only succeeds for one of the four known roles with the
/// affiliation that role requires: `vendor` is scoped by `vendor_id`,
/// `company_admin` and `manager` by `company_id`, and `super_admin` by
/// neither.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "IdentityRecord")]
pub struct Identity {
    pub id: i64,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<i64>,
}

impl Identity {
    pub fn validate(&self) -> Result<(), IdentityError> {
        match self.role {
            Role::Vendor => {
                if self.vendor_id.is_none() {
                    return Err(IdentityError::MissingVendorAffiliation);
                }
                if self.company_id.is_some() {
                    return Err(IdentityError::UnexpectedAffiliation(self.role));
                }
            }
            Role::CompanyAdmin | Role::Manager => {
                if self.company_id.is_none() {
                    return Err(IdentityError::MissingCompanyAffiliation(self.role));
                }
                if self.vendor_id.is_some() {
                    return Err(IdentityError::UnexpectedAffiliation(self.role));
                }
            }
            Role::SuperAdmin => {
                if self.vendor_id.is_some() || self.company_id.is_some() {
                    return Err(IdentityError::UnexpectedAffiliation(self.role));
                }
            }
        }
        Ok(())
    }

    /// Display name, falling back to the local part of the email.
    pub fn display_name(&self) -> &str {
        let name = self.full_name.trim();
        if name.is_empty() {
            self.email.split('@').next().unwrap_or("User")
        } else {
            name
        }
    }
}

impl TryFrom<IdentityRecord> for Identity {
    type Error = IdentityError;

    fn try_from(record: IdentityRecord) -> Result<Self, Self::Error> {
        let identity = Identity {
            id: record.id,
            email: record.email,
            full_name: record.full_name,
            role: record.role.parse()?,
            vendor_id: record.vendor_id,
            company_id: record.company_id,
        };
        identity.validate()?;
        Ok(identity)
    }
}

/// Opaque bearer credential issued by the analysis service.
///
/// The console never decodes it; it is only ever attached to outbound
/// requests or written to the session store.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct Credential(Secret<String>);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Secret::new(value.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for Credential {}
