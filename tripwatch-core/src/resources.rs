//! Authenticated CRUD endpoints for saved locations, trusted contacts, trips
//! and alerts.
//!
//! Records come back as JSON documents; their shape is owned by the backend.

use std::sync::Arc;

use serde_json::Value;

use crate::client::{ApiClient, ApiRequest};
use crate::error::ApiError;
use crate::model::{LocationUpdate, NewSavedLocation, NewTrip, NewTrustedContact};

/// Collections exposed under `/api/v1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Locations,
    Contacts,
    Trips,
    Alerts,
}

impl Resource {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Locations => "/api/v1/locations",
            Self::Contacts => "/api/v1/contacts",
            Self::Trips => "/api/v1/trips",
            Self::Alerts => "/api/v1/alerts",
        }
    }

    pub fn item_path(&self, id: i64) -> String {
        format!("{}/{}", self.path(), id)
    }
}

/// Typed access to the resource endpoints.
#[derive(Debug, Clone)]
pub struct Resources {
    client: Arc<ApiClient>,
}

impl Resources {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    pub async fn list(&self, resource: Resource) -> Result<Vec<Value>, ApiError> {
        self.client.get(resource.path()).await
    }

    pub async fn fetch(&self, resource: Resource, id: i64) -> Result<Value, ApiError> {
        self.client.get(&resource.item_path(id)).await
    }

    pub async fn remove(&self, resource: Resource, id: i64) -> Result<(), ApiError> {
        self.client
            .execute::<Value>(ApiRequest::delete(resource.item_path(id)))
            .await
            .map(|_| ())
    }

    pub async fn add_location(&self, location: &NewSavedLocation) -> Result<Value, ApiError> {
        self.client.post(Resource::Locations.path(), location).await
    }

    pub async fn add_contact(&self, contact: &NewTrustedContact) -> Result<Value, ApiError> {
        self.client.post(Resource::Contacts.path(), contact).await
    }

    pub async fn start_trip(&self, trip: &NewTrip) -> Result<Value, ApiError> {
        self.client.post(Resource::Trips.path(), trip).await
    }

    /// Report a position for an active trip. The response may carry alerts
    /// raised by this update.
    pub async fn update_location(
        &self,
        trip_id: i64,
        update: &LocationUpdate,
    ) -> Result<Value, ApiError> {
        let path = format!("{}/location", Resource::Trips.item_path(trip_id));
        self.client.post(&path, update).await
    }

    pub async fn end_trip(&self, trip_id: i64) -> Result<Value, ApiError> {
        let path = format!("{}/end", Resource::Trips.item_path(trip_id));
        self.client.execute(ApiRequest::post(path)).await
    }

    pub async fn acknowledge_alert(&self, alert_id: i64) -> Result<Value, ApiError> {
        let path = format!("{}/acknowledge", Resource::Alerts.item_path(alert_id));
        self.client.execute(ApiRequest::post(path)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_paths() {
        assert_eq!(Resource::Locations.path(), "/api/v1/locations");
        assert_eq!(Resource::Contacts.item_path(3), "/api/v1/contacts/3");
        assert_eq!(Resource::Trips.item_path(12), "/api/v1/trips/12");
        assert_eq!(Resource::Alerts.path(), "/api/v1/alerts");
    }
}
