//! Matchmaking.
//!
//! Places a user into the oldest room that still has space, or into a newly
//! provisioned room when none does. Flow:
//! 1. Reject users the membership index already places in a room
//! 2. Try open rooms in `(created_at, room_id)` order, one optimistic
//!    transaction each
//! 3. Provision a new room if no candidate accepted the user
//! 4. Re-read the room and sign a participant token

use crate::auth::{AccessClaims, TokenIssuer};
use crate::errors::RoomError;
use crate::models::{Room, DEFAULT_ROOM_CAPACITY};
use crate::observability::metrics;
use crate::repositories::{
    run_room_transaction, RegistryError, RoomChange, RoomFilter, RoomRegistry, TxDecision,
    TxOutcome,
};
use crate::services::provisioner::RoomProvisioner;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Default number of commit retries per candidate room.
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

/// Process-wide matchmaking settings.
#[derive(Debug, Clone)]
pub struct MatchSettings {
    pub capacity: u32,
    pub max_conflict_retries: u32,
    /// Access key placed in participant claims.
    pub access_key: String,
}

impl MatchSettings {
    pub fn new(access_key: impl Into<String>) -> Self {
        Self {
            capacity: DEFAULT_ROOM_CAPACITY,
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
            access_key: access_key.into(),
        }
    }
}

/// A successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedRoom {
    pub room_id: String,
    pub participants: Vec<String>,
    pub token: String,
    /// True if the room was provisioned for this join.
    pub created: bool,
}

/// Result of one candidate transaction.
enum Attempt {
    /// Committed; carries the participants written.
    Joined(Vec<String>),
    /// Candidate filled up or vanished.
    Skipped,
    /// Candidate already lists the user.
    AlreadyIn,
}

pub struct MatchMaker {
    registry: Arc<dyn RoomRegistry>,
    provisioner: Arc<dyn RoomProvisioner>,
    issuer: Arc<dyn TokenIssuer>,
    settings: MatchSettings,
}

impl MatchMaker {
    pub fn new(
        registry: Arc<dyn RoomRegistry>,
        provisioner: Arc<dyn RoomProvisioner>,
        issuer: Arc<dyn TokenIssuer>,
        settings: MatchSettings,
    ) -> Self {
        Self {
            registry,
            provisioner,
            issuer,
            settings,
        }
    }

    /// Place `user_id` in a room and sign a participant token for it.
    ///
    /// # Errors
    ///
    /// - `RoomError::AlreadyMember` if the user is in a room already
    /// - `RoomError::ConflictExhausted` if open rooms stayed contended
    /// - `RoomError::ExternalService` if provisioning or signing fails
    /// - `RoomError::Database` on registry failures
    #[instrument(skip_all, name = "rc.service.join")]
    pub async fn join(&self, user_id: &str) -> Result<JoinedRoom, RoomError> {
        let result = self.place_user(user_id).await;

        match &result {
            Ok(joined) => {
                metrics::record_join(if joined.created { "created" } else { "joined" });
                info!(
                    target: "rc.service.matchmaker",
                    room_id = %joined.room_id,
                    participants = joined.participants.len(),
                    created = joined.created,
                    "User joined room"
                );
            }
            Err(e) => metrics::record_join(e.outcome()),
        }

        result
    }

    async fn place_user(&self, user_id: &str) -> Result<JoinedRoom, RoomError> {
        if let Some(room_id) = self.registry.membership(user_id).await? {
            debug!(target: "rc.service.matchmaker", room_id = %room_id, "User already indexed to a room");
            return Err(RoomError::AlreadyMember { room_id });
        }

        let (room_id, participants, created) = match self.join_open_room(user_id).await? {
            Some((room_id, participants)) => (room_id, participants, false),
            None => {
                let room = self.create_room(user_id).await?;
                (room.room_id, room.participants, true)
            }
        };

        // Other users may have joined between the commit and now.
        let participants = match self.registry.get(&room_id).await? {
            Some(current) => current.room.participants,
            None => participants,
        };

        let token = self.issuer.issue(&AccessClaims::participant(
            self.settings.access_key.as_str(),
            room_id.as_str(),
            user_id,
        ))?;

        Ok(JoinedRoom {
            room_id,
            participants,
            token,
            created,
        })
    }

    /// Try every open room in order. Returns `None` if provisioning should
    /// follow.
    async fn join_open_room(
        &self,
        user_id: &str,
    ) -> Result<Option<(String, Vec<String>)>, RoomError> {
        let candidates = self.registry.scan(RoomFilter::Open).await?;
        let mut contended = 0usize;

        for candidate in candidates {
            let room_id = candidate.room.room_id;

            let outcome = run_room_transaction(
                self.registry.as_ref(),
                &room_id,
                self.settings.max_conflict_retries,
                "join",
                |room: &Room| {
                    if room.contains(user_id) {
                        return TxDecision::Abort(Attempt::AlreadyIn);
                    }
                    if room.is_full || room.reached_capacity() {
                        return TxDecision::Abort(Attempt::Skipped);
                    }
                    let mut next = room.clone();
                    next.add_participant(user_id);
                    let participants = next.participants.clone();
                    TxDecision::Commit(RoomChange::Update(next), Attempt::Joined(participants))
                },
            )
            .await;

            match outcome {
                Ok(TxOutcome::Committed(Attempt::Joined(participants))) => {
                    return Ok(Some((room_id, participants)));
                }
                Ok(TxOutcome::Committed(_)) => {}
                Ok(TxOutcome::Aborted(Attempt::AlreadyIn)) => {
                    return Err(RoomError::AlreadyMember { room_id });
                }
                Ok(TxOutcome::Aborted(_)) | Ok(TxOutcome::Missing) => {
                    debug!(target: "rc.service.matchmaker", room_id = %room_id, "Candidate no longer open");
                }
                Ok(TxOutcome::Exhausted) => {
                    contended += 1;
                    warn!(
                        target: "rc.service.matchmaker",
                        room_id = %room_id,
                        retries = self.settings.max_conflict_retries,
                        "Candidate stayed contended, trying next room"
                    );
                }
                Err(RegistryError::MembershipTaken { room_id }) => {
                    return Err(RoomError::AlreadyMember { room_id });
                }
                Err(e) => return Err(e.into()),
            }
        }

        if contended > 0 {
            return Err(RoomError::ConflictExhausted(format!(
                "{contended} open room(s) stayed contended after {} retries",
                self.settings.max_conflict_retries
            )));
        }

        Ok(None)
    }

    async fn create_room(&self, user_id: &str) -> Result<Room, RoomError> {
        let room_id = self.provisioner.create_room().await?;

        let room = Room::new(
            room_id.as_str(),
            user_id,
            self.settings.capacity,
            Utc::now(),
        );

        let created = self.registry.create(room).await?;
        debug!(
            target: "rc.service.matchmaker",
            room_id = %created.room.room_id,
            capacity = created.room.capacity,
            "Provisioned new room"
        );

        Ok(created.room)
    }
}
