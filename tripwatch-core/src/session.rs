//! Login, registration and logout on top of [`ApiClient`].

use std::sync::Arc;

use reqwest::StatusCode;

use crate::client::{ApiClient, ApiRequest};
use crate::error::ApiError;
use crate::model::{CredentialPair, RegisterRequest, UserProfile};

pub const LOGIN_PATH: &str = "/api/v1/auth/login";
pub const REGISTER_PATH: &str = "/api/v1/auth/register";
pub const CURRENT_USER_PATH: &str = "/api/v1/users/me";

/// Session operations for the rest of the application.
///
/// A session exists while a credential pair is held; there is no separate
/// session record.
#[derive(Debug, Clone)]
pub struct Session {
    client: Arc<ApiClient>,
}

impl Session {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    /// Load persisted credentials, returning whether a session is active.
    pub async fn restore(&self) -> bool {
        self.client.tokens().load().await.is_some()
    }

    /// Synchronous check against the in-memory credential.
    pub fn is_authenticated(&self) -> bool {
        self.client.tokens().current().is_some()
    }

    /// Exchange email and password for a credential pair and keep it.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), ApiError> {
        let request = ApiRequest::post(LOGIN_PATH)
            .with_query("email", email)
            .with_query("password", password)
            .public();

        let pair: CredentialPair = self.client.execute(request).await?;
        self.accept(pair).await?;
        tracing::info!("Logged in as {}", email);
        Ok(())
    }

    /// Create an account and keep the credential pair issued for it.
    ///
    /// An existing account surfaces as a 409 [`ApiError`]; see
    /// [`ApiError::is_conflict`].
    pub async fn register(&self, form: &RegisterRequest) -> Result<(), ApiError> {
        let request = ApiRequest::post(REGISTER_PATH).with_json(form)?.public();

        let pair: CredentialPair = self.client.execute(request).await?;
        self.accept(pair).await?;
        tracing::info!("Registered account for {}", form.email);
        Ok(())
    }

    /// Drop the stored credentials. No backend call is made.
    pub async fn logout(&self) {
        self.client.tokens().clear().await;
        tracing::info!("Logged out");
    }

    /// Fetch the authenticated user.
    ///
    /// A 401 means the stored session is no longer valid and the caller should
    /// [`logout`](Self::logout).
    pub async fn current_user(&self) -> Result<UserProfile, ApiError> {
        self.client.get(CURRENT_USER_PATH).await
    }

    async fn accept(&self, pair: CredentialPair) -> Result<(), ApiError> {
        if !pair.is_complete() {
            return Err(ApiError::invalid_response(StatusCode::OK));
        }
        self.client.tokens().save(&pair).await;
        Ok(())
    }
}
