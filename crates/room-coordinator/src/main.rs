//! Room Coordinator
//!
//! Entry point for the random video-chat matchmaking service.

use room_coordinator::auth::{Hs256TokenIssuer, JwksClient, JwtIdentityVerifier};
use room_coordinator::config::Config;
use room_coordinator::observability::metrics::init_metrics_recorder;
use room_coordinator::repositories::{InMemoryRoomRegistry, PgRoomRegistry, RoomRegistry};
use room_coordinator::routes::{self, AppState};
use room_coordinator::services::{
    HttpRoomProvisioner, LeaveCoordinator, MatchMaker, MatchSettings,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "room_coordinator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Room Coordinator");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        room_capacity = config.room_capacity,
        max_conflict_retries = config.max_conflict_retries,
        persistent_registry = config.database_url.is_some(),
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to install metrics recorder: {}", e);
        e
    })?;

    let registry = connect_registry(&config).await?;

    let issuer = Arc::new(Hs256TokenIssuer::new(
        &config.app_secret,
        Duration::from_secs(config.token_ttl_seconds),
    ));

    let provisioner = Arc::new(HttpRoomProvisioner::new(
        config.room_api_url.clone(),
        config.app_access_key.clone(),
        config.room_template_id.clone(),
        issuer.clone(),
    )?);

    let jwks_client = Arc::new(JwksClient::new(config.identity_jwks_url.clone()));
    let verifier = Arc::new(JwtIdentityVerifier::new(
        jwks_client,
        config.identity_project_id.clone(),
        Duration::from_secs(config.jwt_clock_skew_seconds.unsigned_abs()),
    ));

    let settings = MatchSettings {
        capacity: config.room_capacity,
        max_conflict_retries: config.max_conflict_retries,
        access_key: config.app_access_key.clone(),
    };
    let matchmaker = Arc::new(MatchMaker::new(
        registry.clone(),
        provisioner,
        issuer.clone(),
        settings,
    ));
    let leave_coordinator = Arc::new(LeaveCoordinator::new(
        registry,
        config.max_conflict_retries,
    ));

    let bind_address = config.bind_address.clone();

    let state = Arc::new(AppState {
        config,
        matchmaker,
        leave_coordinator,
        issuer,
        verifier,
    });

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Room Coordinator listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Room Coordinator shutdown complete");

    Ok(())
}

/// PostgreSQL registry when `DATABASE_URL` is set, in-memory otherwise.
async fn connect_registry(
    config: &Config,
) -> Result<Arc<dyn RoomRegistry>, Box<dyn std::error::Error>> {
    let Some(database_url) = &config.database_url else {
        warn!("DATABASE_URL not set, using in-memory room registry (state is lost on restart)");
        return Ok(Arc::new(InMemoryRoomRegistry::new()));
    };

    info!("Connecting to database...");
    let db_url_with_timeout = add_query_timeout(database_url, 5);
    let db_pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&db_url_with_timeout)
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {}", e);
            e
        })?;

    sqlx::migrate!("../../migrations")
        .run(&db_pool)
        .await
        .map_err(|e| {
            error!("Failed to run database migrations: {}", e);
            e
        })?;

    info!("Database connection established");

    Ok(Arc::new(PgRoomRegistry::new(db_pool)))
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Adds statement_timeout to the database URL.
fn add_query_timeout(url: &str, timeout_secs: u32) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!(
        "{}{}options=-c%20statement_timeout%3D{}s",
        url, separator, timeout_secs
    )
}
