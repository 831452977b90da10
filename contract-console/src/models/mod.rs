pub mod auth;
pub mod identity;

pub use auth::{LoginResponse, NewMemberAccount, NewVendorAccount, RegisterResponse};
pub use identity::{Credential, Identity, IdentityError, IdentityRecord, Role};
