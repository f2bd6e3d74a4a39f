//! Test server harness for E2E testing
//!
//! Provides `TestRoomServer` for spawning real room coordinator instances in
//! tests, and `build_test_app` for driving the router in-process.

use axum::Router;
use common::secret::SecretString;
use metrics_exporter_prometheus::PrometheusBuilder;
use room_coordinator::auth::jwt::mock::StaticIdentityVerifier;
use room_coordinator::auth::{Hs256TokenIssuer, IdentityVerifier};
use room_coordinator::config::Config;
use room_coordinator::repositories::{InMemoryRoomRegistry, RoomRegistry};
use room_coordinator::routes::{self, AppState};
use room_coordinator::services::provisioner::mock::MockRoomProvisioner;
use room_coordinator::services::{LeaveCoordinator, MatchMaker, MatchSettings, RoomProvisioner};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Signing secret used by test servers.
pub const TEST_APP_SECRET: &str = "rc-test-app-secret";

/// Access key used by test servers.
pub const TEST_ACCESS_KEY: &str = "rc-test-access-key";

/// Collaborators and settings for a test app.
///
/// The default uses an in-memory registry, a sequential mock provisioner and
/// a verifier that accepts any bearer token as its own user id.
pub struct TestServerOptions {
    pub registry: Arc<dyn RoomRegistry>,
    pub provisioner: Arc<dyn RoomProvisioner>,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub capacity: u32,
    pub max_conflict_retries: u32,
}

impl Default for TestServerOptions {
    fn default() -> Self {
        Self {
            registry: Arc::new(InMemoryRoomRegistry::new()),
            provisioner: Arc::new(MockRoomProvisioner::sequential()),
            verifier: Arc::new(StaticIdentityVerifier::token_is_user()),
            capacity: 2,
            max_conflict_retries: 3,
        }
    }
}

/// Build a configuration for tests.
pub fn test_config(capacity: u32, max_conflict_retries: u32) -> Result<Config, anyhow::Error> {
    let vars = HashMap::from([
        ("APP_SECRET".to_string(), TEST_APP_SECRET.to_string()),
        ("APP_ACCESS_KEY".to_string(), TEST_ACCESS_KEY.to_string()),
        ("BIND_HOST".to_string(), "127.0.0.1".to_string()),
        ("PORT".to_string(), "0".to_string()),
        ("IDENTITY_PROJECT_ID".to_string(), "rc-test-project".to_string()),
        ("ROOM_CAPACITY".to_string(), capacity.to_string()),
        (
            "MAX_CONFLICT_RETRIES".to_string(),
            max_conflict_retries.to_string(),
        ),
    ]);

    Config::from_vars(&vars).map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))
}

/// Build the real router around the given collaborators.
pub fn build_test_app(options: TestServerOptions) -> Result<(Router, Arc<AppState>), anyhow::Error> {
    let config = test_config(options.capacity, options.max_conflict_retries)?;

    let issuer = Arc::new(Hs256TokenIssuer::new(
        &SecretString::from(TEST_APP_SECRET),
        Duration::from_secs(config.token_ttl_seconds),
    ));

    let matchmaker = Arc::new(MatchMaker::new(
        options.registry.clone(),
        options.provisioner,
        issuer.clone(),
        MatchSettings {
            capacity: config.room_capacity,
            max_conflict_retries: config.max_conflict_retries,
            access_key: config.app_access_key.clone(),
        },
    ));
    let leave_coordinator = Arc::new(LeaveCoordinator::new(
        options.registry,
        config.max_conflict_retries,
    ));

    let state = Arc::new(AppState {
        config,
        matchmaker,
        leave_coordinator,
        issuer,
        verifier: options.verifier,
    });

    // A handle from an uninstalled recorder; tests never share the global one
    let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

    Ok((routes::build_routes(state.clone(), metrics_handle), state))
}

/// Test harness for spawning the room coordinator in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_join_flow_e2e() -> Result<()> {
///     let server = TestRoomServer::spawn().await?;
///     let client = reqwest::Client::new();
///
///     let response = client
///         .post(format!("{}/join-randomroom", server.url()))
///         .bearer_auth("alice")
///         .send()
///         .await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestRoomServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    registry: Arc<dyn RoomRegistry>,
    _handle: JoinHandle<()>,
}

impl TestRoomServer {
    /// Spawn a server with the default test collaborators.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with(TestServerOptions::default()).await
    }

    /// Spawn a server with custom collaborators.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Start the HTTP server in the background
    pub async fn spawn_with(options: TestServerOptions) -> Result<Self, anyhow::Error> {
        let registry = options.registry.clone();
        let (app, state) = build_test_app(options)?;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            state,
            registry,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.state.config
    }

    /// Get the registry the server writes to.
    pub fn registry(&self) -> &Arc<dyn RoomRegistry> {
        &self.registry
    }
}

impl Drop for TestRoomServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}
