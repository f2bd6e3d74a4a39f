//! Authentication middleware for protected routes.
//!
//! Extracts the Bearer token from the Authorization header, verifies it with
//! the identity verifier, and injects the caller into request extensions.

use crate::auth::{AuthenticatedUser, IdentityVerifier};
use crate::errors::RoomError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub verifier: Arc<dyn IdentityVerifier>,
}

/// Authentication middleware that verifies identity tokens.
///
/// # Authorization Header Format
///
/// ```text
/// Authorization: Bearer <token>
/// ```
///
/// # Response
///
/// - Returns 401 Unauthorized with WWW-Authenticate header if the token is missing or invalid
/// - Continues to the next handler with [`AuthenticatedUser`] in extensions otherwise
#[instrument(skip_all, name = "rc.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, RoomError> {
    let auth_header = req
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "rc.middleware.auth", "Missing Authorization header");
            RoomError::Auth("No token provided".to_string())
        })?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            tracing::debug!(target: "rc.middleware.auth", "Invalid Authorization header format");
            RoomError::Auth("No token provided".to_string())
        })?;

    let user: AuthenticatedUser = state.verifier.verify(token).await?;

    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}
