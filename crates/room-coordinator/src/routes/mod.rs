//! HTTP routes for the room coordinator.
//!
//! Defines the Axum router and application state.

use crate::auth::{IdentityVerifier, TokenIssuer};
use crate::config::Config;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_auth, AuthState};
use crate::services::{LeaveCoordinator, MatchMaker};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Request timeout applied to every route.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    pub matchmaker: Arc<MatchMaker>,

    pub leave_coordinator: Arc<LeaveCoordinator>,

    /// Signs management tokens.
    pub issuer: Arc<dyn TokenIssuer>,

    /// Verifies bearer identity tokens on protected routes.
    pub verifier: Arc<dyn IdentityVerifier>,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/` - Liveness text - public
/// - `/metrics` - Prometheus metrics - public
/// - `/join-randomroom` - Join a room - requires authentication
/// - `/leave-room` - Leave a room - requires authentication
/// - `/generate-management-token` - Management token - requires authentication
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = Arc::new(AuthState {
        verifier: state.verifier.clone(),
    });

    let public_routes = Router::new().route("/", get(handlers::health_check));

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let protected_routes = Router::new()
        .route("/join-randomroom", post(handlers::join_random_room))
        .route("/leave-room", post(handlers::leave_room))
        .route(
            "/generate-management-token",
            post(handlers::generate_management_token),
        )
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TraceLayer - Log request details (innermost)
    // 2. TimeoutLayer - Timeout the request
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(middleware::from_fn(http_metrics_middleware))
}
