//! Room coordinator error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl. Client
//! facing bodies carry an `error` string, plus `roomid` for membership
//! conflicts and `details` for server-side failures. Database details are
//! logged and replaced with a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Room coordinator error type.
///
/// Maps to HTTP status codes:
/// - Auth: 401 Unauthorized
/// - Validation, AlreadyMember, NotAMember: 400 Bad Request
/// - RoomNotFound: 404 Not Found
/// - ConflictExhausted, ExternalService, Database, Internal: 500
#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Unauthorized: {0}")]
    Auth(String),

    #[error("{0}")]
    Validation(String),

    #[error("User is already in room {room_id}")]
    AlreadyMember { room_id: String },

    #[error("User is not a participant of this room")]
    NotAMember,

    #[error("Room not found")]
    RoomNotFound,

    #[error("Room is busy: {0}")]
    ConflictExhausted(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error")]
    Internal,
}

impl RoomError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            RoomError::Auth(_) => 401,
            RoomError::Validation(_) | RoomError::AlreadyMember { .. } | RoomError::NotAMember => {
                400
            }
            RoomError::RoomNotFound => 404,
            RoomError::ConflictExhausted(_)
            | RoomError::ExternalService(_)
            | RoomError::Database(_)
            | RoomError::Internal => 500,
        }
    }

    /// Short outcome label used by the join/leave counters.
    pub fn outcome(&self) -> &'static str {
        match self {
            RoomError::Auth(_) => "unauthorized",
            RoomError::Validation(_) => "invalid",
            RoomError::AlreadyMember { .. } => "already_member",
            RoomError::NotAMember => "not_a_member",
            RoomError::RoomNotFound => "room_not_found",
            RoomError::ConflictExhausted(_) => "conflict_exhausted",
            RoomError::ExternalService(_) => "external_error",
            RoomError::Database(_) => "database_error",
            RoomError::Internal => "internal_error",
        }
    }
}

impl IntoResponse for RoomError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let body = match &self {
            RoomError::Auth(reason) => json!({ "error": format!("Unauthorized: {reason}") }),
            RoomError::Validation(reason) => json!({ "error": reason }),
            RoomError::AlreadyMember { room_id } => json!({
                "roomid": room_id,
                "error": "User is already in a room",
            }),
            RoomError::NotAMember | RoomError::RoomNotFound => {
                json!({ "error": self.to_string() })
            }
            RoomError::ConflictExhausted(details) => {
                tracing::warn!(target: "rc.errors", details = %details, "Registry conflict retries exhausted");
                json!({
                    "error": "Room is busy, please retry",
                    "details": details,
                })
            }
            RoomError::ExternalService(details) => {
                tracing::error!(target: "rc.errors", details = %details, "External service call failed");
                json!({
                    "error": "External service request failed",
                    "details": details,
                })
            }
            RoomError::Database(err) => {
                // Log actual error server-side, return generic message to client
                tracing::error!(target: "rc.database", error = %err, "Database operation failed");
                json!({
                    "error": "Database operation failed",
                    "details": "An internal database error occurred",
                })
            }
            RoomError::Internal => json!({ "error": "An internal error occurred" }),
        };

        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) =
                "Bearer realm=\"room-coordinator\", error=\"invalid_token\"".parse()
            {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}

/// Convert sqlx errors to RoomError
impl From<sqlx::Error> for RoomError {
    fn from(err: sqlx::Error) -> Self {
        RoomError::Database(err.to_string())
    }
}
