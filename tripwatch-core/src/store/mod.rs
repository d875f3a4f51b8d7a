//! Secret storage abstraction.
//!
//! This module provides:
//! - [`Secret`] - A wrapper for sensitive values that prevents accidental logging
//! - [`SecretStore`] - Trait for secret storage backends
//! - [`MemoryStore`] - In-memory implementation for tests and throwaway sessions
//! - [`FileStore`] - JSON file in the client's data directory
//! - [`KeyringStore`] - OS keyring implementation (with `keyring-store` feature)
//! - [`create_store`] - Helper to select a backend by [`StoreKind`]
//!
//! The session record lives under a single key, see
//! [`SESSION_KEY`](crate::tokens::SESSION_KEY).

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

mod file;
#[cfg(feature = "keyring-store")]
mod keyring;
mod memory;

pub use file::FileStore;
#[cfg(feature = "keyring-store")]
pub use keyring::KeyringStore;
pub use memory::MemoryStore;

/// A secret value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose).
/// Debug and Display implementations show `[REDACTED]` instead of the value,
/// and the buffer is wiped when the secret is dropped.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the secret holds no characters.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

/// Error type for secret store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The storage backend encountered an error.
    #[error("backend error: {message}")]
    BackendError { message: String },

    /// Reading or writing the backing file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The keyring backend is not available.
    #[error("keyring not available: {message}")]
    KeyringUnavailable { message: String },
}

/// Abstraction over secret storage backends.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Retrieve a secret by key.
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    async fn get(&self, key: &str) -> Result<Option<Secret>, StoreError>;

    /// Store a secret at the given key.
    ///
    /// Overwrites any existing value.
    async fn set(&self, key: &str, secret: &Secret) -> Result<(), StoreError>;

    /// Delete a secret by key.
    ///
    /// Returns `Ok(())` even if the key didn't exist.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Check if a key exists without retrieving the value.
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key).await?.is_some())
    }
}

/// Which backend persists the session record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Process-local; nothing survives a restart.
    Memory,
    /// `credentials.json` in the data directory.
    #[default]
    File,
    /// Platform keyring.
    Keyring,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            "keyring" => Ok(Self::Keyring),
            _ => Err(format!("unknown storage backend: {}", s)),
        }
    }
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::File => write!(f, "file"),
            Self::Keyring => write!(f, "keyring"),
        }
    }
}

/// Create a secret store for the requested backend.
///
/// # Backend Selection Logic
///
/// - `Keyring`: attempts a [`KeyringStore`]; falls back to [`FileStore`] with a
///   warning if the keyring is unavailable or the feature is disabled
/// - `File`: a [`FileStore`] at `data_dir/credentials.json`
/// - `Memory`: a [`MemoryStore`]
pub fn create_store(kind: StoreKind, data_dir: &Path) -> Box<dyn SecretStore> {
    match kind {
        StoreKind::Memory => {
            tracing::debug!("Using in-memory secret storage");
            Box::new(MemoryStore::new())
        }
        StoreKind::File => file_store(data_dir),
        StoreKind::Keyring => {
            #[cfg(feature = "keyring-store")]
            match KeyringStore::try_new("tripwatch") {
                Ok(store) => {
                    tracing::info!("Using OS keyring for secret storage");
                    return Box::new(store);
                }
                Err(e) => {
                    tracing::warn!(
                        "Keyring unavailable ({}), falling back to file storage",
                        e
                    );
                }
            }

            #[cfg(not(feature = "keyring-store"))]
            tracing::warn!(
                "Keyring storage requested but keyring-store feature not enabled. \
                 Using file storage."
            );

            file_store(data_dir)
        }
    }
}

fn file_store(data_dir: &Path) -> Box<dyn SecretStore> {
    let path = data_dir.join("credentials.json");
    tracing::debug!("Using file secret storage at {:?}", path);
    Box::new(FileStore::new(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_debug_redacted() {
        let secret = Secret::new("super-secret");
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_secret_display_redacted() {
        let secret = Secret::new("super-secret");
        let display = format!("{}", secret);
        assert!(!display.contains("super-secret"));
        assert!(display.contains("REDACTED"));
    }

    #[test]
    fn test_secret_serializes_as_plain_string() {
        let json = serde_json::to_string(&Secret::new("abc")).unwrap();
        assert_eq!(json, "\"abc\"");

        let back: Secret = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(back.expose(), "abc");
    }

    #[test]
    fn test_store_kind_parse() {
        assert_eq!("memory".parse::<StoreKind>().unwrap(), StoreKind::Memory);
        assert_eq!("FILE".parse::<StoreKind>().unwrap(), StoreKind::File);
        assert_eq!("keyring".parse::<StoreKind>().unwrap(), StoreKind::Keyring);
        assert!("vault".parse::<StoreKind>().is_err());
    }

    #[tokio::test]
    async fn test_create_store_memory() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = create_store(StoreKind::Memory, dir.path());

        store.set("test-key", &Secret::new("test")).await.unwrap();
        let retrieved = store.get("test-key").await.unwrap();
        assert_eq!(retrieved.unwrap().expose(), "test");
    }

    #[tokio::test]
    async fn test_create_store_file_writes_into_data_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = create_store(StoreKind::File, dir.path());

        store.set("test-key", &Secret::new("test")).await.unwrap();
        assert!(dir.path().join("credentials.json").exists());
    }
}
