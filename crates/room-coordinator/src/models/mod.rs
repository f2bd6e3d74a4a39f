//! Room coordinator models.
//!
//! Contains the room record and the HTTP request/response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default room capacity (one-on-one video chat).
pub const DEFAULT_ROOM_CAPACITY: u32 = 2;

/// Violations of the room record invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomInvariantError {
    #[error("room id must not be empty")]
    EmptyRoomId,

    #[error("room capacity must be greater than 0")]
    ZeroCapacity,

    #[error("room has {participants} participants but capacity {capacity}")]
    OverCapacity { participants: usize, capacity: u32 },

    #[error("participant ids must be unique and non-empty")]
    InvalidParticipants,

    #[error("is_full flag does not match participant count")]
    InconsistentFullFlag,
}

/// A capacity-bounded set of participants sharing one video session.
///
/// Participants are kept in join order so responses are stable, but the
/// list is treated as a set: adding an existing member is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Room identifier allocated by the room API.
    pub room_id: String,

    /// User ids currently in the room.
    pub participants: Vec<String>,

    /// Maximum number of participants.
    pub capacity: u32,

    /// Whether the room stopped accepting joins.
    pub is_full: bool,

    /// When the room record was created.
    pub created_at: DateTime<Utc>,
}

impl Room {
    /// Create a room holding its first participant.
    pub fn new(
        room_id: impl Into<String>,
        first_participant: impl Into<String>,
        capacity: u32,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut room = Self {
            room_id: room_id.into(),
            participants: vec![first_participant.into()],
            capacity,
            is_full: false,
            created_at,
        };
        room.is_full = room.reached_capacity();
        room
    }

    /// Returns true if `user_id` is a participant.
    pub fn contains(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p == user_id)
    }

    /// Returns true once the participant count reaches capacity.
    pub fn reached_capacity(&self) -> bool {
        self.participants.len() >= self.capacity as usize
    }

    /// Add a participant and recompute `is_full`.
    ///
    /// Returns false if the user was already a participant.
    pub fn add_participant(&mut self, user_id: &str) -> bool {
        if self.contains(user_id) {
            return false;
        }
        self.participants.push(user_id.to_string());
        self.is_full = self.reached_capacity();
        true
    }

    /// Remove a participant.
    ///
    /// Leaving always frees a slot, so `is_full` is cleared rather than
    /// recomputed. Returns false if the user was not a participant.
    pub fn remove_participant(&mut self, user_id: &str) -> bool {
        let before = self.participants.len();
        self.participants.retain(|p| p != user_id);
        if self.participants.len() == before {
            return false;
        }
        self.is_full = false;
        true
    }

    /// Check the invariants every committed room must satisfy.
    ///
    /// A room marked full must be at capacity. The converse is not enforced.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), RoomInvariantError> {
        if self.room_id.trim().is_empty() {
            return Err(RoomInvariantError::EmptyRoomId);
        }
        if self.capacity == 0 {
            return Err(RoomInvariantError::ZeroCapacity);
        }
        if self.participants.len() > self.capacity as usize {
            return Err(RoomInvariantError::OverCapacity {
                participants: self.participants.len(),
                capacity: self.capacity,
            });
        }

        let mut seen = std::collections::HashSet::with_capacity(self.participants.len());
        if self
            .participants
            .iter()
            .any(|p| p.is_empty() || !seen.insert(p.as_str()))
        {
            return Err(RoomInvariantError::InvalidParticipants);
        }

        if self.is_full && !self.reached_capacity() {
            return Err(RoomInvariantError::InconsistentFullFlag);
        }

        Ok(())
    }
}

// ============================================================================
// HTTP API Models
// ============================================================================

/// Response for `POST /join-randomroom`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRoomResponse {
    /// Room the user is now a member of.
    #[serde(rename = "roomID")]
    pub room_id: String,

    /// Current participants of the room.
    pub participants: Vec<String>,

    /// Participant-scoped access token for the room.
    pub token: String,
}

/// Request body for `POST /leave-room`.
///
/// `roomId` is optional at the type level so a missing field is reported
/// as a validation error instead of a JSON rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeaveRoomRequest {
    #[serde(rename = "roomId", default)]
    pub room_id: Option<String>,
}

impl LeaveRoomRequest {
    /// Returns the trimmed room id.
    ///
    /// # Errors
    ///
    /// Returns an error message if `roomId` is missing or blank.
    pub fn validate(&self) -> Result<&str, &'static str> {
        match self.room_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err("roomId is required"),
        }
    }
}

/// Response for `POST /leave-room`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveRoomResponse {
    pub message: String,
    pub success: bool,
    #[serde(rename = "roomID")]
    pub room_id: String,
}

/// Response for `POST /generate-management-token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagementTokenResponse {
    pub token: String,
}
