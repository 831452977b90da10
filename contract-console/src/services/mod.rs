pub mod auth_client;
pub mod gateway;

pub use auth_client::{AuthClient, AuthError, Registration};
pub use gateway::{ApiClient, ApiError, RequestBody};
