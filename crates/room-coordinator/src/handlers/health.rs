//! Liveness handler.

use tracing::instrument;

/// Text returned by `GET /`.
pub const LIVENESS_MESSAGE: &str = "Token Generation Server is running!";

/// Handler for GET /
///
/// Liveness only; does not touch the registry or external services.
#[instrument(skip_all, name = "rc.health.live")]
pub async fn health_check() -> &'static str {
    LIVENESS_MESSAGE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check_returns_liveness_text() {
        assert_eq!(health_check().await, LIVENESS_MESSAGE);
    }
}
