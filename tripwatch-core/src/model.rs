//! Domain model types exchanged with the Tripwatch backend.
//!
//! - [`CredentialPair`] - access and refresh credentials issued at login
//! - [`UserProfile`] - the authenticated user
//! - [`RegisterRequest`] - account registration form
//! - [`NewSavedLocation`], [`NewTrustedContact`], [`NewTrip`], [`LocationUpdate`]
//!   - request bodies for the resource endpoints

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::Secret;

/// Bearer credentials issued by the backend.
///
/// Both halves are required. A pair with an empty half is treated as absent
/// everywhere it is read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPair {
    /// Short-lived token attached to API calls.
    pub access_token: Secret,

    /// Longer-lived token exchanged for a new pair.
    pub refresh_token: Secret,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: Secret::new(access_token),
            refresh_token: Secret::new(refresh_token),
        }
    }

    /// Whether both halves carry a value.
    pub fn is_complete(&self) -> bool {
        !self.access_token.is_empty() && !self.refresh_token.is_empty()
    }

    /// `Authorization` header value for the access token.
    pub fn authorization_header(&self) -> String {
        bearer(&self.access_token)
    }
}

pub(crate) fn bearer(token: &Secret) -> String {
    format!("Bearer {}", token.expose())
}

/// The authenticated user as returned by `GET /api/v1/users/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Registration form sent to `POST /api/v1/auth/register`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub password: Secret,
}

impl RegisterRequest {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        phone_number: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            phone_number: phone_number.into(),
            password: Secret::new(password),
        }
    }
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("phone_number", &self.phone_number)
            .finish_non_exhaustive()
    }
}

/// A named place the user trusts (home, work, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSavedLocation {
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// A person notified when a trip raises an alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTrustedContact {
    pub name: String,
    pub phone_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Start of a monitored trip between two saved locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTrip {
    pub origin_location_id: i64,
    pub destination_location_id: i64,
}

/// A position report for an active trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdate {
    pub latitude: f64,
    pub longitude: f64,
    pub recorded_at: DateTime<Utc>,
}

impl LocationUpdate {
    /// A position recorded now.
    pub fn now(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            recorded_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_pair_wire_format() {
        let pair: CredentialPair =
            serde_json::from_str(r#"{"accessToken":"a1","refreshToken":"r1"}"#).unwrap();

        assert_eq!(pair.access_token.expose(), "a1");
        assert_eq!(pair.refresh_token.expose(), "r1");
        assert!(pair.is_complete());
        assert_eq!(pair.authorization_header(), "Bearer a1");
    }

    #[test]
    fn test_credential_pair_requires_both_halves() {
        let missing = serde_json::from_str::<CredentialPair>(r#"{"accessToken":"a1"}"#);
        assert!(missing.is_err());

        let empty = CredentialPair::new("a1", "");
        assert!(!empty.is_complete());
    }

    #[test]
    fn test_credential_pair_debug_redacts() {
        let debug = format!("{:?}", CredentialPair::new("a1-secret", "r1-secret"));
        assert!(!debug.contains("a1-secret"));
        assert!(!debug.contains("r1-secret"));
    }

    #[test]
    fn test_register_request_serializes_camel_case() {
        let request = RegisterRequest::new("Ada", "ada@example.com", "+15550100", "hunter22");
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["phoneNumber"], "+15550100");
        assert_eq!(json["password"], "hunter22");
        assert!(!format!("{:?}", request).contains("hunter22"));
    }

    #[test]
    fn test_user_profile_optional_fields() {
        let user: UserProfile =
            serde_json::from_str(r#"{"id":7,"name":"Ada","email":"ada@example.com"}"#).unwrap();

        assert_eq!(user.id, 7);
        assert!(user.phone_number.is_none());
        assert!(user.created_at.is_none());
    }
}
