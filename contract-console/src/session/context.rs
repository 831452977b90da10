//! Single in-memory view of who is signed in.

use super::store::{CredentialStore, StorageBackend};
use crate::models::{Credential, Identity};
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated {
        identity: Identity,
        credential: Credential,
    },
}

impl SessionState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::Authenticated { identity, .. } => Some(identity),
            SessionState::Unauthenticated => None,
        }
    }

    pub fn credential(&self) -> Option<&Credential> {
        match self {
            SessionState::Authenticated { credential, .. } => Some(credential),
            SessionState::Unauthenticated => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated { .. })
    }
}

/// Session state mirrored to a [`CredentialStore`].
///
/// Only [`SessionContext::restore`] constructs one, so the restoration
/// attempt has always completed before anything can read the state or issue
/// an authenticated request with it. Consumers that must re-evaluate on
/// every transition hold a receiver from [`SessionContext::subscribe`].
pub struct SessionContext<B> {
    store: CredentialStore<B>,
    state: watch::Sender<SessionState>,
}

impl<B: StorageBackend> SessionContext<B> {
    pub async fn restore(store: CredentialStore<B>) -> Self {
        let initial = match store.load().await {
            Some((credential, identity)) => {
                tracing::debug!(user_id = identity.id, role = %identity.role, "Session restored");
                SessionState::Authenticated {
                    identity,
                    credential,
                }
            }
            None => SessionState::Unauthenticated,
        };

        let (state, _) = watch::channel(initial);
        Self { store, state }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.state.borrow().identity().cloned()
    }

    pub fn credential(&self) -> Option<Credential> {
        self.state.borrow().credential().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Enter the Authenticated state with a pair obtained from a successful
    /// authentication exchange. The pair is not validated here.
    ///
    /// If the store refuses the pair the session still holds it in memory;
    /// it will not survive a reload.
    pub async fn login(&self, credential: Credential, identity: Identity) {
        if let Err(e) = self.store.save(&credential, &identity).await {
            tracing::error!(user_id = identity.id, error = %e, "Failed to persist session");
        }

        tracing::info!(
            user_id = identity.id,
            email = %identity.email,
            role = %identity.role,
            "User logged in"
        );

        self.state.send_replace(SessionState::Authenticated {
            identity,
            credential,
        });
    }

    /// Clear the store and return to Unauthenticated. Safe in any state.
    pub async fn logout(&self) {
        self.store.clear().await;

        let previous = self.state.send_replace(SessionState::Unauthenticated);
        if let Some(identity) = previous.identity() {
            tracing::info!(user_id = identity.id, "User logged out");
        }
    }

    /// Whether this session still holds exactly `credential`.
    pub fn holds(&self, credential: &Credential) -> bool {
        self.state.borrow().credential() == Some(credential)
    }

    /// Whether `credential` is still the session's credential both here and
    /// in the store. Another request on the same session may have signed out
    /// or signed in again since this context was restored.
    pub async fn is_current(&self, credential: &Credential) -> bool {
        self.holds(credential)
            && self.store.persisted_credential().await.as_ref() == Some(credential)
    }
}
