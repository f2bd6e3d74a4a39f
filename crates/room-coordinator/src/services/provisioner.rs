//! Room API client.
//!
//! Allocates new video rooms through the external room API. Each call is
//! authorized with a freshly signed management token.
//!
//! # Security
//!
//! - The management token is built per request and never logged
//! - Timeouts prevent hanging connections
//! - Error bodies from the room API are logged, not returned to clients

use crate::auth::{AccessClaims, TokenIssuer};
use crate::errors::RoomError;
use crate::observability::metrics;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, instrument, warn};

/// Default timeout for room API requests in seconds.
const ROOM_API_TIMEOUT_SECS: u64 = 10;

/// Description attached to every provisioned room.
const ROOM_DESCRIPTION: &str = "Random video chat room";

/// Allocates new rooms in the external video service.
#[async_trait::async_trait]
pub trait RoomProvisioner: Send + Sync {
    /// Create a room and return its id.
    ///
    /// # Errors
    ///
    /// Returns `RoomError::ExternalService` if the room cannot be created.
    async fn create_room(&self) -> Result<String, RoomError>;
}

/// Body of `POST /rooms`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateRoomRequest {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
}

/// The part of the room API response we use.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRoomResponse {
    pub id: String,
}

/// HTTP client for the room API.
pub struct HttpRoomProvisioner {
    client: Client,
    base_url: String,
    access_key: String,
    template_id: Option<String>,
    issuer: Arc<dyn TokenIssuer>,
}

impl HttpRoomProvisioner {
    /// Create a new room API client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Room API base URL (e.g., "https://api.100ms.live/v2")
    /// * `access_key` - App access key placed in management claims
    /// * `template_id` - Room template, omitted from requests when `None`
    /// * `issuer` - Signs the management token
    ///
    /// # Errors
    ///
    /// Returns `RoomError::Internal` if the HTTP client cannot be built.
    pub fn new(
        base_url: String,
        access_key: String,
        template_id: Option<String>,
        issuer: Arc<dyn TokenIssuer>,
    ) -> Result<Self, RoomError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(ROOM_API_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| {
                error!(target: "rc.services.provisioner", error = %e, "Failed to build HTTP client");
                RoomError::Internal
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_key,
            template_id,
            issuer,
        })
    }

    async fn request_room(&self) -> Result<String, RoomError> {
        let management_token = self
            .issuer
            .issue(&AccessClaims::management(self.access_key.clone()))?;

        let body = CreateRoomRequest {
            name: format!("room-{}", chrono::Utc::now().timestamp_millis()),
            description: ROOM_DESCRIPTION.to_string(),
            template_id: self.template_id.clone(),
        };

        let response = self
            .client
            .post(format!("{}/rooms", self.base_url))
            .bearer_auth(management_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(target: "rc.services.provisioner", error = %e, "Room API request failed");
                RoomError::ExternalService("Failed to create room: room API unreachable".to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(
                target: "rc.services.provisioner",
                status = %status,
                body = %error_body,
                "Room API rejected room creation"
            );
            return Err(RoomError::ExternalService(format!(
                "Failed to create room: room API returned {}",
                status.as_u16()
            )));
        }

        let created: CreateRoomResponse = response.json().await.map_err(|e| {
            error!(target: "rc.services.provisioner", error = %e, "Failed to parse room API response");
            RoomError::ExternalService("Failed to create room: invalid room API response".to_string())
        })?;

        if created.id.trim().is_empty() {
            error!(target: "rc.services.provisioner", "Room API returned an empty room id");
            return Err(RoomError::ExternalService(
                "Failed to create room: invalid room API response".to_string(),
            ));
        }

        Ok(created.id)
    }
}

#[async_trait::async_trait]
impl RoomProvisioner for HttpRoomProvisioner {
    #[instrument(skip_all, name = "rc.services.create_room")]
    async fn create_room(&self) -> Result<String, RoomError> {
        let start = Instant::now();
        let result = self.request_room().await;

        let status = if result.is_ok() { "success" } else { "error" };
        metrics::record_room_provision(status, start.elapsed());

        result
    }
}

/// Mock room provisioners for testing.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock provisioner handing out sequential room ids.
    pub struct MockRoomProvisioner {
        prefix: String,
        call_count: AtomicUsize,
        return_error: bool,
    }

    impl MockRoomProvisioner {
        /// Create a mock returning `mock-room-1`, `mock-room-2`, ...
        pub fn sequential() -> Self {
            Self::with_prefix("mock-room")
        }

        /// Create a mock returning `{prefix}-1`, `{prefix}-2`, ...
        pub fn with_prefix(prefix: impl Into<String>) -> Self {
            Self {
                prefix: prefix.into(),
                call_count: AtomicUsize::new(0),
                return_error: false,
            }
        }

        /// Create a mock that always fails.
        pub fn failing() -> Self {
            Self {
                prefix: String::new(),
                call_count: AtomicUsize::new(0),
                return_error: true,
            }
        }

        /// Get the number of calls made.
        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl RoomProvisioner for MockRoomProvisioner {
        async fn create_room(&self) -> Result<String, RoomError> {
            let count = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;

            if self.return_error {
                return Err(RoomError::ExternalService(
                    "Failed to create room: mock room API error".to_string(),
                ));
            }

            Ok(format!("{}-{count}", self.prefix))
        }
    }

    #[cfg(test)]
    #[allow(clippy::unwrap_used, clippy::expect_used)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_mock_sequential() {
            let mock = MockRoomProvisioner::sequential();

            assert_eq!(mock.create_room().await.unwrap(), "mock-room-1");
            assert_eq!(mock.create_room().await.unwrap(), "mock-room-2");
            assert_eq!(mock.call_count(), 2);
        }

        #[tokio::test]
        async fn test_mock_failing() {
            let mock = MockRoomProvisioner::failing();

            assert!(matches!(
                mock.create_room().await,
                Err(RoomError::ExternalService(_))
            ));
            assert_eq!(mock.call_count(), 1);
        }
    }
}
