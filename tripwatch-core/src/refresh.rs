//! Single-flight exchange of the refresh credential for a new pair.
//!
//! Concurrent authorization failures must not each call the refresh endpoint:
//! the backend rotates refresh tokens, so a second exchange racing the first
//! would present an already-spent token and log the user out. The first
//! caller becomes the leader and performs the exchange; everyone arriving
//! while it runs subscribes to the leader's outcome.

use std::sync::Arc;

use parking_lot::Mutex;
use reqwest::header::ACCEPT;
use tokio::sync::watch;
use url::Url;

use crate::model::CredentialPair;
use crate::store::Secret;
use crate::tokens::TokenStore;

/// Path of the refresh endpoint, relative to the base URL.
pub const REFRESH_PATH: &str = "/api/v1/auth/refresh";

enum RefreshState {
    Idle,
    /// Resolves to `Some(outcome)` once the leader finishes.
    InFlight(watch::Receiver<Option<bool>>),
}

enum Role {
    Leader(watch::Sender<Option<bool>>, Secret),
    Follower(watch::Receiver<Option<bool>>),
}

pub struct RefreshCoordinator {
    http: reqwest::Client,
    refresh_url: Url,
    tokens: Arc<TokenStore>,
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    pub fn new(http: reqwest::Client, refresh_url: Url, tokens: Arc<TokenStore>) -> Self {
        Self {
            http,
            refresh_url,
            tokens,
            state: Mutex::new(RefreshState::Idle),
        }
    }

    /// Obtain and persist a new credential pair.
    ///
    /// Returns `true` when a new pair was stored. Returns `false` without any
    /// network call when no refresh credential is held, and `false` after
    /// clearing the stored pair when the exchange fails. A caller waiting on
    /// a leader that was cancelled takes over the exchange itself.
    pub async fn refresh(&self) -> bool {
        loop {
            let role = {
                let mut state = self.state.lock();
                match &*state {
                    RefreshState::InFlight(rx) => Role::Follower(rx.clone()),
                    RefreshState::Idle => {
                        let Some(refresh_token) = self.tokens.refresh_credential() else {
                            tracing::debug!("No refresh credential held, skipping refresh");
                            return false;
                        };
                        let (tx, rx) = watch::channel(None);
                        *state = RefreshState::InFlight(rx);
                        Role::Leader(tx, refresh_token)
                    }
                }
            };

            match role {
                Role::Leader(tx, refresh_token) => return self.lead(tx, refresh_token).await,
                Role::Follower(mut rx) => {
                    tracing::debug!("Refresh already in flight, waiting for its outcome");
                    match rx.wait_for(Option::is_some).await {
                        Ok(outcome) => {
                            let outcome = *outcome;
                            return outcome.unwrap_or(false);
                        }
                        Err(_) => {
                            tracing::debug!("Refresh leader went away without an outcome");
                        }
                    }
                }
            }
        }
    }

    /// Whether an exchange is currently running.
    pub fn in_flight(&self) -> bool {
        matches!(*self.state.lock(), RefreshState::InFlight(_))
    }

    async fn lead(&self, tx: watch::Sender<Option<bool>>, refresh_token: Secret) -> bool {
        let guard = InFlightGuard {
            state: &self.state,
            tx,
        };

        let outcome = match self.exchange(&refresh_token).await {
            Some(pair) => {
                self.tokens.save(&pair).await;
                tracing::info!("Refreshed session credentials");
                true
            }
            None => {
                self.tokens.clear().await;
                false
            }
        };

        // No receivers is fine: nobody else was waiting.
        let _ = guard.tx.send(Some(outcome));
        outcome
    }

    async fn exchange(&self, refresh_token: &Secret) -> Option<CredentialPair> {
        let response = match self
            .http
            .post(self.refresh_url.clone())
            .query(&[("refreshToken", refresh_token.expose())])
            .header(ACCEPT, "application/json")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Token refresh request failed: {}", e);
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Token refresh rejected with status {}", status);
            return None;
        }

        match response.json::<CredentialPair>().await {
            Ok(pair) if pair.is_complete() => Some(pair),
            Ok(_) => {
                tracing::warn!("Token refresh returned an incomplete credential pair");
                None
            }
            Err(e) => {
                tracing::warn!("Token refresh returned an unreadable body: {}", e);
                None
            }
        }
    }
}

/// Returns the coordinator to `Idle` however the leader exits.
///
/// The state is reset before `tx` is dropped, so a follower woken by a
/// closed channel never finds the dead exchange still marked in flight.
struct InFlightGuard<'a> {
    state: &'a Mutex<RefreshState>,
    tx: watch::Sender<Option<bool>>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        *self.state.lock() = RefreshState::Idle;
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refresh_url", &self.refresh_url.as_str())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn coordinator(url: &str) -> (RefreshCoordinator, Arc<TokenStore>) {
        let tokens = Arc::new(TokenStore::new(Arc::new(MemoryStore::new())));
        let coordinator = RefreshCoordinator::new(
            reqwest::Client::new(),
            Url::parse(url).unwrap(),
            tokens.clone(),
        );
        (coordinator, tokens)
    }

    #[tokio::test]
    async fn test_no_refresh_credential_returns_false() {
        // Port 9 is discard; the call must not be attempted at all.
        let (coordinator, _tokens) = coordinator("http://127.0.0.1:9/api/v1/auth/refresh");

        assert!(!coordinator.refresh().await);
        assert!(!coordinator.in_flight());
    }

    #[tokio::test]
    async fn test_transport_failure_clears_credentials() {
        let (coordinator, tokens) = coordinator("http://127.0.0.1:9/api/v1/auth/refresh");
        tokens.save(&CredentialPair::new("a1", "r1")).await;

        assert!(!coordinator.refresh().await);
        assert!(tokens.current().is_none());
        assert!(!coordinator.in_flight());
    }
}
