//! Leaving rooms.
//!
//! Removes a participant in one optimistic transaction. The room record is
//! deleted when its last participant leaves; otherwise it is reopened.

use crate::errors::RoomError;
use crate::models::Room;
use crate::observability::metrics;
use crate::repositories::{run_room_transaction, RoomChange, RoomRegistry, TxDecision, TxOutcome};
use std::sync::Arc;
use tracing::{info, instrument};

/// A successful leave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeftRoom {
    pub room_id: String,
    /// True if the user was the last participant.
    pub room_deleted: bool,
    pub remaining: Vec<String>,
}

enum Step {
    Left(Vec<String>),
    Deleted,
    NotMember,
}

pub struct LeaveCoordinator {
    registry: Arc<dyn RoomRegistry>,
    max_conflict_retries: u32,
}

impl LeaveCoordinator {
    pub fn new(registry: Arc<dyn RoomRegistry>, max_conflict_retries: u32) -> Self {
        Self {
            registry,
            max_conflict_retries,
        }
    }

    /// Remove `user_id` from `room_id`.
    ///
    /// # Errors
    ///
    /// - `RoomError::RoomNotFound` if the room does not exist
    /// - `RoomError::NotAMember` if the user is not a participant
    /// - `RoomError::ConflictExhausted` if every commit attempt conflicted
    /// - `RoomError::Database` on registry failures
    #[instrument(skip_all, name = "rc.service.leave", fields(room_id = %room_id))]
    pub async fn leave(&self, user_id: &str, room_id: &str) -> Result<LeftRoom, RoomError> {
        let result = self.remove_participant(user_id, room_id).await;

        match &result {
            Ok(left) => {
                metrics::record_leave(if left.room_deleted { "deleted" } else { "left" });
                info!(
                    target: "rc.service.leave",
                    room_id = %left.room_id,
                    remaining = left.remaining.len(),
                    room_deleted = left.room_deleted,
                    "User left room"
                );
            }
            Err(e) => metrics::record_leave(e.outcome()),
        }

        result
    }

    async fn remove_participant(&self, user_id: &str, room_id: &str) -> Result<LeftRoom, RoomError> {
        let outcome = run_room_transaction(
            self.registry.as_ref(),
            room_id,
            self.max_conflict_retries,
            "leave",
            |room: &Room| {
                if !room.contains(user_id) {
                    return TxDecision::Abort(Step::NotMember);
                }
                let mut next = room.clone();
                next.remove_participant(user_id);
                if next.participants.is_empty() {
                    TxDecision::Commit(RoomChange::Delete, Step::Deleted)
                } else {
                    let remaining = next.participants.clone();
                    TxDecision::Commit(RoomChange::Update(next), Step::Left(remaining))
                }
            },
        )
        .await?;

        match outcome {
            TxOutcome::Committed(Step::Deleted) => Ok(LeftRoom {
                room_id: room_id.to_string(),
                room_deleted: true,
                remaining: Vec::new(),
            }),
            TxOutcome::Committed(Step::Left(remaining)) => Ok(LeftRoom {
                room_id: room_id.to_string(),
                room_deleted: false,
                remaining,
            }),
            TxOutcome::Committed(Step::NotMember) | TxOutcome::Aborted(_) => {
                Err(RoomError::NotAMember)
            }
            TxOutcome::Missing => Err(RoomError::RoomNotFound),
            TxOutcome::Exhausted => Err(RoomError::ConflictExhausted(format!(
                "room stayed contended after {} retries",
                self.max_conflict_retries
            ))),
        }
    }
}
