//! Room handlers.
//!
//! - `POST /join-randomroom` - Join the oldest open room or a new one
//! - `POST /leave-room` - Leave a room
//!
//! Both require an authenticated caller; the user id always comes from the
//! verified identity, never from the request body.

use crate::auth::AuthenticatedUser;
use crate::errors::RoomError;
use crate::models::{JoinRoomResponse, LeaveRoomRequest, LeaveRoomResponse};
use crate::routes::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Message returned on a successful leave.
pub const LEAVE_SUCCESS_MESSAGE: &str = "User successfully left the room";

/// Handler for POST /join-randomroom
///
/// # Response
///
/// - 200 OK: `{roomID, participants, token}`
/// - 400 Bad Request: `{roomid, error}` if the user is already in a room
/// - 401 Unauthorized: Invalid or missing token
/// - 500 Internal Server Error: `{error, details}` on provisioning or registry failure
#[instrument(skip_all, name = "rc.handlers.join_room")]
pub async fn join_random_room(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<JoinRoomResponse>, RoomError> {
    let joined = state.matchmaker.join(&user.user_id).await?;

    Ok(Json(JoinRoomResponse {
        room_id: joined.room_id,
        participants: joined.participants,
        token: joined.token,
    }))
}

/// Handler for POST /leave-room
///
/// Body: `{"roomId": "..."}`
///
/// # Response
///
/// - 200 OK: `{message, success: true, roomID}`
/// - 400 Bad Request: Missing `roomId` or caller is not a participant
/// - 401 Unauthorized: Invalid or missing token
/// - 404 Not Found: Room does not exist
/// - 500 Internal Server Error: Registry failure
#[instrument(skip_all, name = "rc.handlers.leave_room")]
pub async fn leave_room(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<LeaveRoomRequest>, JsonRejection>,
) -> Result<Json<LeaveRoomResponse>, RoomError> {
    let request = payload
        .map(|Json(request)| request)
        .unwrap_or_else(|rejection| {
            debug!(target: "rc.handlers.rooms", error = %rejection, "Leave request body rejected");
            LeaveRoomRequest::default()
        });

    let room_id = request
        .validate()
        .map_err(|msg| RoomError::Validation(msg.to_string()))?;

    let left = state
        .leave_coordinator
        .leave(&user.user_id, room_id)
        .await?;

    Ok(Json(LeaveRoomResponse {
        message: LEAVE_SUCCESS_MESSAGE.to_string(),
        success: true,
        room_id: left.room_id,
    }))
}
