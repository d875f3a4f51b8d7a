//! Authenticated request pipeline.
//!
//! [`ApiClient`] attaches the session's bearer credential to outgoing calls,
//! recovers from an expired access credential with one refresh-and-retry, and
//! turns every failure into an [`ApiError`].
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use tripwatch_core::{ApiClient, ApiRequest, ClientConfig, MemoryStore};
//!
//! let client = ApiClient::new(&ClientConfig::default(), Arc::new(MemoryStore::new()))?;
//! let alerts: serde_json::Value = client.execute(ApiRequest::get("/api/v1/alerts")).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ApiError, TripwatchError};
use crate::model::bearer;
use crate::refresh::{REFRESH_PATH, RefreshCoordinator};
use crate::store::{Secret, SecretStore};
use crate::tokens::TokenStore;

/// Retries allowed per logical call after a recovered 401.
const MAX_AUTH_RETRIES: u8 = 1;

/// One logical API call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    requires_auth: bool,
    allow_retry: bool,
}

impl ApiRequest {
    /// Create a request for `path`, relative to the configured base URL.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            requires_auth: true,
            allow_retry: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append a query-string parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Attach a JSON body.
    pub fn with_json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body).map_err(|e| {
            tracing::error!("Failed to serialize request body: {}", e);
            ApiError::new(0, format!("Could not encode request: {}", e))
        })?;
        self.body = Some(value);
        Ok(self)
    }

    /// Send without credentials and never attempt a refresh.
    pub fn public(mut self) -> Self {
        self.requires_auth = false;
        self
    }

    /// Surface a 401 as-is instead of refreshing and retrying.
    pub fn without_retry(mut self) -> Self {
        self.allow_retry = false;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn requires_auth(&self) -> bool {
        self.requires_auth
    }
}

/// HTTP client for the Tripwatch API.
///
/// Cheap to share behind an [`Arc`]; all state is internally synchronized.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    tokens: Arc<TokenStore>,
    refresher: RefreshCoordinator,
}

impl ApiClient {
    /// Build a client for `config`, persisting credentials in `store`.
    pub fn new(config: &ClientConfig, store: Arc<dyn SecretStore>) -> Result<Self, TripwatchError> {
        let base_url = config.parsed_base_url()?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| TripwatchError::Config {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        let tokens = Arc::new(TokenStore::new(store));
        let refresher = RefreshCoordinator::new(
            http.clone(),
            endpoint_url(&base_url, REFRESH_PATH),
            tokens.clone(),
        );

        Ok(Self {
            http,
            base_url,
            tokens,
            refresher,
        })
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn refresher(&self) -> &RefreshCoordinator {
        &self.refresher
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Perform `request` and decode the response body as `T`.
    ///
    /// At most two HTTP calls are made: the original and, after a 401 that a
    /// refresh recovered, one retry carrying the new credential.
    pub async fn execute<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let mut retries_left = if request.allow_retry { MAX_AUTH_RETRIES } else { 0 };

        loop {
            let sent = if request.requires_auth {
                self.tokens.current()
            } else {
                None
            };

            let response = self.send(&request, sent.as_ref()).await?;
            let status = response.status();

            if status == StatusCode::UNAUTHORIZED && request.requires_auth && retries_left > 0 {
                retries_left -= 1;
                tracing::debug!(
                    "{} {} returned 401, attempting credential refresh",
                    request.method,
                    request.path
                );

                if self.recover_authorization(sent.as_ref()).await {
                    continue;
                }
                return Err(ApiError::session_expired());
            }

            return read_response(status, response).await;
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(ApiRequest::get(path)).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(ApiRequest::post(path).with_json(body)?).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(ApiRequest::put(path).with_json(body)?).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(ApiRequest::delete(path)).await
    }

    /// Decide whether a 401 for the credential `sent` can be retried.
    ///
    /// If another call already replaced that credential, the retry uses the
    /// replacement without a second exchange.
    async fn recover_authorization(&self, sent: Option<&Secret>) -> bool {
        if let (Some(sent), Some(current)) = (sent, self.tokens.current()) {
            if &current != sent {
                tracing::debug!("Credential was refreshed concurrently, retrying");
                return true;
            }
        }

        self.refresher.refresh().await
    }

    async fn send(
        &self,
        request: &ApiRequest,
        credential: Option<&Secret>,
    ) -> Result<reqwest::Response, ApiError> {
        let url = endpoint_url(&self.base_url, &request.path);
        tracing::debug!("{} {}", request.method, url.path());

        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json");

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(credential) = credential {
            builder = builder.header(AUTHORIZATION, bearer(credential));
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        builder.send().await.map_err(|e| {
            tracing::warn!("{} {} failed: {}", request.method, request.path, e);
            ApiError::network()
        })
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("tokens", &self.tokens)
            .field("refresher", &self.refresher)
            .finish()
    }
}

async fn read_response<T: DeserializeOwned>(
    status: StatusCode,
    response: reqwest::Response,
) -> Result<T, ApiError> {
    let body = response.bytes().await.map_err(|e| {
        tracing::warn!("Failed to read response body: {}", e);
        ApiError::network()
    })?;

    if !status.is_success() {
        return Err(ApiError::from_response(status, &body));
    }

    if body.iter().all(u8::is_ascii_whitespace) {
        return empty_result(status);
    }

    serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!("Response with status {} did not decode: {}", status, e);
        ApiError::invalid_response(status)
    })
}

/// The value standing in for a body-less success: `{}` where `T` accepts an
/// object, otherwise `null`.
fn empty_result<T: DeserializeOwned>(status: StatusCode) -> Result<T, ApiError> {
    let empty_object = serde_json::Value::Object(serde_json::Map::new());
    serde_json::from_value(empty_object)
        .or_else(|_| serde_json::from_value(serde_json::Value::Null))
        .map_err(|_| ApiError::invalid_response(status))
}

/// Join `path` onto `base`, keeping any path prefix the base URL carries.
pub(crate) fn endpoint_url(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    let joined = format!(
        "{}/{}",
        base.path().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    url.set_path(&joined);
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_endpoint_url_keeps_prefix() {
        let base = Url::parse("https://api.example.com/backend/").unwrap();
        assert_eq!(
            endpoint_url(&base, "/api/v1/users/me").as_str(),
            "https://api.example.com/backend/api/v1/users/me"
        );

        let bare = Url::parse("http://localhost:8080").unwrap();
        assert_eq!(
            endpoint_url(&bare, "api/v1/trips").as_str(),
            "http://localhost:8080/api/v1/trips"
        );
    }

    #[test]
    fn test_request_defaults() {
        let request = ApiRequest::get("/api/v1/users/me");
        assert!(request.requires_auth());
        assert!(request.allow_retry);

        let public = ApiRequest::post("/api/v1/auth/login").public().without_retry();
        assert!(!public.requires_auth());
        assert!(!public.allow_retry);
    }

    #[test]
    fn test_empty_result_shapes() {
        let value: serde_json::Value = empty_result(StatusCode::OK).unwrap();
        assert_eq!(value, serde_json::json!({}));

        let map: HashMap<String, String> = empty_result(StatusCode::OK).unwrap();
        assert!(map.is_empty());

        let () = empty_result(StatusCode::NO_CONTENT).unwrap();

        let none: Option<u32> = empty_result(StatusCode::NO_CONTENT).unwrap();
        assert!(none.is_none());

        let err = empty_result::<u32>(StatusCode::OK).unwrap_err();
        assert_eq!(err.status, 200);
    }

    #[test]
    fn test_client_rejects_bad_base_url() {
        let config = ClientConfig::new("not a url");
        let result = ApiClient::new(&config, Arc::new(crate::store::MemoryStore::new()));
        assert!(matches!(result, Err(TripwatchError::Config { .. })));
    }
}
