//! Persistence of the bearer credential and the identity it belongs to.
//!
//! Everything the console keeps about a signed-in user lives under two
//! string entries: `token` (the opaque credential) and `user` (the identity
//! as JSON). The backing store is pluggable so the same rules apply to the
//! browser session record and to the in-memory store used by tests.

use crate::models::{Credential, Identity};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use serde_json::Value;
use tower_sessions::{MemoryStore, Session, SessionStore};

pub const CREDENTIAL_KEY: &str = "token";
pub const IDENTITY_KEY: &str = "user";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("failed to serialize identity: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// String key-value storage that survives page reloads.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set_item(&self, key: &str, value: String) -> Result<(), StoreError>;
    async fn remove_item(&self, key: &str) -> Result<(), StoreError>;

    /// Read `key` as last persisted, bypassing anything the current request
    /// holds in memory.
    async fn get_durable(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.get_item(key).await
    }
}

/// Process-local storage. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<DashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set_item(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// The browser's session record, addressed by its cookie.
///
/// Entries are read and written through the request's copy of the record,
/// which the session layer saves when the response leaves. Durable reads go
/// to the store and see what concurrent requests on the same cookie saved.
#[derive(Clone)]
pub struct BrowserSession {
    session: Session,
    store: MemoryStore,
}

impl BrowserSession {
    pub fn new(session: Session, store: MemoryStore) -> Self {
        Self { session, store }
    }
}

#[async_trait]
impl StorageBackend for BrowserSession {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.session
            .get::<String>(key)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn set_item(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.session
            .insert(key, value)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        self.session
            .remove_value(key)
            .await
            .map(|_| ())
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn get_durable(&self, key: &str) -> Result<Option<String>, StoreError> {
        // Never saved: this request's copy is the only one.
        let Some(id) = self.session.id() else {
            return self.get_item(key).await;
        };

        let record = self
            .store
            .load(&id)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(record
            .and_then(|mut record| record.data.remove(key))
            .and_then(|value| match value {
                Value::String(value) => Some(value),
                _ => None,
            }))
    }
}

/// The only writer of session entries.
///
/// The credential and identity are written and cleared as a pair; a load
/// never yields one without the other.
pub struct CredentialStore<B> {
    backend: B,
}

impl<B: StorageBackend> CredentialStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Persist the pair, credential first. If the identity cannot be written
    /// the credential is removed again before the error is returned.
    pub async fn save(&self, credential: &Credential, identity: &Identity) -> Result<(), StoreError> {
        let serialized = serde_json::to_string(identity)?;

        self.backend
            .set_item(CREDENTIAL_KEY, credential.expose().to_string())
            .await?;

        if let Err(e) = self.backend.set_item(IDENTITY_KEY, serialized).await {
            tracing::error!(error = %e, "Failed to persist identity, rolling back credential");
            self.clear().await;
            return Err(e);
        }

        Ok(())
    }

    /// Read the persisted pair.
    ///
    /// A half-present pair or an identity that does not parse is cleared and
    /// reported as no session at all.
    pub async fn load(&self) -> Option<(Credential, Identity)> {
        let token = self.read(CREDENTIAL_KEY).await;
        let user = self.read(IDENTITY_KEY).await;

        match (token, user) {
            (None, None) => None,
            (Some(token), Some(user)) => match serde_json::from_str::<Identity>(&user) {
                Ok(identity) => Some((Credential::new(token), identity)),
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding malformed persisted identity");
                    self.clear().await;
                    None
                }
            },
            _ => {
                tracing::warn!("Discarding incomplete persisted session");
                self.clear().await;
                None
            }
        }
    }

    /// The credential as currently persisted, which another request on the
    /// same session may have replaced or removed since this one loaded.
    pub async fn persisted_credential(&self) -> Option<Credential> {
        match self.backend.get_durable(CREDENTIAL_KEY).await {
            Ok(token) => token.map(Credential::new),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read persisted credential");
                None
            }
        }
    }

    /// Remove both entries. Backend failures are logged, never raised.
    pub async fn clear(&self) {
        for key in [CREDENTIAL_KEY, IDENTITY_KEY] {
            if let Err(e) = self.backend.remove_item(key).await {
                tracing::error!(key, error = %e, "Failed to remove session entry");
            }
        }
    }

    async fn read(&self, key: &str) -> Option<String> {
        match self.backend.get_item(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to read session entry");
                None
            }
        }
    }
}
