//! Persistence of the session's [`CredentialPair`].
//!
//! [`TokenStore`] keeps an in-memory copy of the pair for synchronous checks
//! and mirrors it to a [`SecretStore`] under [`SESSION_KEY`]. Storage failures
//! never surface to callers: an unreadable backend is the same as "logged out".

use std::sync::Arc;

use parking_lot::RwLock;

use crate::model::CredentialPair;
use crate::store::{Secret, SecretStore};

/// Storage key holding the serialized session pair.
pub const SESSION_KEY: &str = "tripwatch/session";

pub struct TokenStore {
    backend: Arc<dyn SecretStore>,
    cached: RwLock<Option<CredentialPair>>,
}

impl TokenStore {
    /// Create a token store over `backend`.
    ///
    /// Nothing is read until [`load`](Self::load) is called.
    pub fn new(backend: Arc<dyn SecretStore>) -> Self {
        Self {
            backend,
            cached: RwLock::new(None),
        }
    }

    /// Persist `pair`, replacing whatever was stored before.
    pub async fn save(&self, pair: &CredentialPair) {
        *self.cached.write() = Some(pair.clone());

        let serialized = match serde_json::to_string(pair) {
            Ok(json) => Secret::new(json),
            Err(e) => {
                tracing::warn!("Failed to serialize credentials: {}", e);
                return;
            }
        };

        if let Err(e) = self.backend.set(SESSION_KEY, &serialized).await {
            tracing::warn!(
                "Failed to persist credentials ({}); session will not survive a restart",
                e
            );
        }
    }

    /// Read the persisted pair.
    ///
    /// A record that does not parse as a complete pair is deleted and reported
    /// as absent.
    pub async fn load(&self) -> Option<CredentialPair> {
        let loaded = match self.backend.get(SESSION_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<CredentialPair>(raw.expose()) {
                Ok(pair) if pair.is_complete() => Some(pair),
                Ok(_) => {
                    tracing::warn!("Stored credentials are incomplete, clearing");
                    self.delete_record().await;
                    None
                }
                Err(e) => {
                    tracing::warn!("Stored credentials are corrupt ({}), clearing", e);
                    self.delete_record().await;
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Credential storage unavailable: {}", e);
                None
            }
        };

        *self.cached.write() = loaded.clone();
        loaded
    }

    /// Forget the pair, in memory and on disk. Idempotent.
    pub async fn clear(&self) {
        *self.cached.write() = None;
        self.delete_record().await;
    }

    /// Access credential currently held in memory. Performs no I/O.
    pub fn current(&self) -> Option<Secret> {
        self.cached.read().as_ref().map(|pair| pair.access_token.clone())
    }

    /// Refresh credential currently held in memory.
    pub fn refresh_credential(&self) -> Option<Secret> {
        self.cached.read().as_ref().map(|pair| pair.refresh_token.clone())
    }

    /// Whether a pair is held in memory.
    pub fn has_session(&self) -> bool {
        self.cached.read().is_some()
    }

    async fn delete_record(&self) {
        if let Err(e) = self.backend.delete(SESSION_KEY).await {
            tracing::warn!("Failed to delete stored credentials: {}", e);
        }
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("has_session", &self.has_session())
            .finish()
    }
}
