//! Management token handler.

use crate::auth::{AccessClaims, AuthenticatedUser};
use crate::errors::RoomError;
use crate::models::ManagementTokenResponse;
use crate::routes::AppState;
use axum::{extract::State, Extension, Json};
use std::sync::Arc;
use tracing::{info, instrument};

/// Handler for POST /generate-management-token
///
/// Signs a management token for operators calling the room API directly.
///
/// # Response
///
/// - 200 OK: `{token}`
/// - 401 Unauthorized: Invalid or missing token
/// - 500 Internal Server Error: Signing failed
#[instrument(skip_all, name = "rc.handlers.management_token")]
pub async fn generate_management_token(
    State(state): State<Arc<AppState>>,
    Extension(_user): Extension<AuthenticatedUser>,
) -> Result<Json<ManagementTokenResponse>, RoomError> {
    let token = state.issuer.issue(&AccessClaims::management(
        state.config.app_access_key.as_str(),
    ))?;

    info!(target: "rc.handlers.tokens", "Issued management token");

    Ok(Json(ManagementTokenResponse { token }))
}
