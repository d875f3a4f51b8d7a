//! # Tripwatch Core
//!
//! Client library for the Tripwatch trip-safety API.
//!
//! This crate provides:
//! - [`ApiClient`] - the authenticated request pipeline: bearer credentials,
//!   single-flight refresh with one retry on 401, normalized [`ApiError`]s
//! - [`Session`] - login, registration, logout and the current user
//! - [`Resources`] - saved locations, trusted contacts, trips and alerts
//! - [`TokenStore`] over pluggable [`SecretStore`] backends
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tripwatch_core::{ApiClient, ClientConfig, MemoryStore, Session};
//!
//! async fn whoami() -> Result<(), tripwatch_core::TripwatchError> {
//!     let store = Arc::new(MemoryStore::new());
//!     let client = Arc::new(ApiClient::new(&ClientConfig::default(), store)?);
//!     let session = Session::new(client);
//!
//!     session.login("ada@example.com", "correct horse").await?;
//!     let me = session.current_user().await?;
//!     println!("{} <{}>", me.name, me.email);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod refresh;
pub mod resources;
pub mod session;
pub mod store;
pub mod tokens;

// Re-export commonly used types at crate root
pub use client::{ApiClient, ApiRequest};

pub use config::ClientConfig;

pub use error::{ApiError, TripwatchError};

pub use model::{
    CredentialPair,
    LocationUpdate,
    NewSavedLocation,
    NewTrip,
    NewTrustedContact,
    RegisterRequest,
    UserProfile,
};

pub use refresh::RefreshCoordinator;

pub use resources::{Resource, Resources};

pub use session::Session;

pub use store::{
    FileStore,
    MemoryStore,
    Secret,
    SecretStore,
    StoreError,
    StoreKind,
    create_store,
};

#[cfg(feature = "keyring-store")]
pub use store::KeyringStore;

pub use tokens::TokenStore;
