pub mod context;
pub mod store;

pub use context::{SessionContext, SessionState};
pub use store::{BrowserSession, CredentialStore, MemoryStorage, StorageBackend, StoreError};
