//! Error types shared across the crate.
//!
//! - [`ApiError`] - the normalized shape of every failed request
//! - [`TripwatchError`] - top-level error for embedding applications

use std::collections::BTreeMap;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::StoreError;

/// Message surfaced when a 401 could not be recovered by a refresh.
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please login again.";

/// Message surfaced when no HTTP response was received.
pub const NETWORK_ERROR_MESSAGE: &str = "Network error. Please check your connection.";

/// Message surfaced when a successful response carried a body we could not decode.
pub const INVALID_RESPONSE_MESSAGE: &str = "Unexpected response from server.";

/// Normalized request failure.
///
/// Every failure leaving [`ApiClient`](crate::ApiClient) has this shape,
/// whatever its origin. `status` is the HTTP status of the final response, or
/// `0` when no response was received at all.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("{message}")]
pub struct ApiError {
    pub status: u16,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<BTreeMap<String, String>>,
}

impl ApiError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            field_errors: None,
        }
    }

    /// Transport-level failure: no response was received.
    pub fn network() -> Self {
        Self::new(0, NETWORK_ERROR_MESSAGE)
    }

    /// Unrecoverable authorization failure.
    pub fn session_expired() -> Self {
        Self::new(StatusCode::UNAUTHORIZED.as_u16(), SESSION_EXPIRED_MESSAGE)
    }

    pub(crate) fn invalid_response(status: StatusCode) -> Self {
        Self::new(status.as_u16(), INVALID_RESPONSE_MESSAGE)
    }

    /// Build an error from a non-2xx response.
    ///
    /// Uses the backend's `{status, message, errors?}` body when it parses and
    /// carries a message, otherwise the status line. The HTTP status always wins
    /// over the status echoed in the body.
    pub(crate) fn from_response(status: StatusCode, body: &[u8]) -> Self {
        match serde_json::from_slice::<ErrorBody>(body) {
            Ok(parsed) if !parsed.message.trim().is_empty() => Self {
                status: status.as_u16(),
                message: parsed.message,
                field_errors: parsed.errors.map(flatten_field_errors),
            },
            _ => Self::new(status.as_u16(), status_line(status)),
        }
    }

    pub fn with_field_errors(mut self, field_errors: BTreeMap<String, String>) -> Self {
        self.field_errors = Some(field_errors);
        self
    }

    pub fn is_network(&self) -> bool {
        self.status == 0
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED.as_u16()
    }

    /// 409, e.g. registering an email that already has an account.
    pub fn is_conflict(&self) -> bool {
        self.status == StatusCode::CONFLICT.as_u16()
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    /// Message for a single form field, if the backend reported one.
    pub fn field_error(&self, field: &str) -> Option<&str> {
        self.field_errors
            .as_ref()
            .and_then(|errors| errors.get(field))
            .map(String::as_str)
    }
}

/// Error body sent by the backend.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Option<BTreeMap<String, serde_json::Value>>,
}

fn flatten_field_errors(errors: BTreeMap<String, serde_json::Value>) -> BTreeMap<String, String> {
    errors
        .into_iter()
        .map(|(field, value)| {
            let message = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (field, message)
        })
        .collect()
}

fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("Request failed: {} {}", status.as_u16(), reason),
        None => format!("Request failed with status {}", status.as_u16()),
    }
}

/// Top-level error type for applications embedding the client.
#[derive(Debug, Error)]
pub enum TripwatchError {
    /// A request to the backend failed.
    #[error("api error: {0}")]
    Api(#[from] ApiError),

    /// Error from secret storage operations.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}
