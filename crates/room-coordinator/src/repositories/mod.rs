//! Repository layer for the room coordinator.
//!
//! Provides the room registry following the Handler -> Service -> Repository
//! architecture. The registry is a keyed store of room records with point
//! reads, predicate scans and single-record optimistic commits. Every commit
//! also maintains the `user id -> room id` membership index, so a user can
//! never be committed into two rooms.
//!
//! Two backends implement [`RoomRegistry`]:
//! - [`PgRoomRegistry`] stores rooms in PostgreSQL
//! - [`InMemoryRoomRegistry`] keeps rooms in process memory

use crate::errors::RoomError;
use crate::models::{Room, RoomInvariantError};
use thiserror::Error;

pub mod memory;
pub mod rooms;
pub mod transaction;

pub use memory::InMemoryRoomRegistry;
pub use rooms::PgRoomRegistry;
pub use transaction::{run_room_transaction, TxDecision, TxOutcome};

/// A room record together with its commit version.
///
/// The version starts at 1 and increases by one on every committed update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedRoom {
    pub room: Room,
    pub version: i64,
}

/// Predicate for [`RoomRegistry::scan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomFilter {
    /// Every room, ordered by `(created_at, room_id)`.
    All,
    /// Rooms with `is_full == false`, ordered by `(created_at, room_id)`.
    Open,
}

/// Change applied by [`RoomRegistry::commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomChange {
    /// Replace the record with the given room.
    Update(Room),
    /// Delete the record and release all of its memberships.
    Delete,
}

/// Registry errors.
///
/// Internal to the repository and service layers; services convert these
/// into [`RoomError`] at the request boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The record changed since it was read.
    #[error("room {0} was modified concurrently")]
    Conflict(String),

    /// A user being added is already indexed to another room.
    #[error("user is already a member of room {room_id}")]
    MembershipTaken { room_id: String },

    /// A room with this id already exists.
    #[error("room {0} already exists")]
    AlreadyExists(String),

    /// The record does not exist.
    #[error("room {0} not found")]
    NotFound(String),

    /// The proposed record breaks a room invariant.
    #[error("room invariant violated: {0}")]
    InvariantViolation(String),

    /// Storage backend failure.
    #[error("registry backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for RegistryError {
    fn from(err: sqlx::Error) -> Self {
        RegistryError::Backend(err.to_string())
    }
}

impl From<RoomInvariantError> for RegistryError {
    fn from(err: RoomInvariantError) -> Self {
        RegistryError::InvariantViolation(err.to_string())
    }
}

impl From<RegistryError> for RoomError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::MembershipTaken { room_id } => RoomError::AlreadyMember { room_id },
            RegistryError::NotFound(_) => RoomError::RoomNotFound,
            RegistryError::Conflict(room_id) => {
                RoomError::ConflictExhausted(format!("room {room_id} was modified concurrently"))
            }
            RegistryError::Backend(msg) => RoomError::Database(msg),
            RegistryError::AlreadyExists(_) | RegistryError::InvariantViolation(_) => {
                tracing::error!(target: "rc.repository.rooms", error = %err, "Registry rejected write");
                RoomError::Internal
            }
        }
    }
}

/// Durable, transactional store of room records keyed by room id.
#[async_trait::async_trait]
pub trait RoomRegistry: Send + Sync {
    /// Point read of a room.
    async fn get(&self, room_id: &str) -> Result<Option<VersionedRoom>, RegistryError>;

    /// Predicate scan, ordered by `(created_at, room_id)`.
    async fn scan(&self, filter: RoomFilter) -> Result<Vec<VersionedRoom>, RegistryError>;

    /// Look up the room a user is indexed to.
    async fn membership(&self, user_id: &str) -> Result<Option<String>, RegistryError>;

    /// Insert a new room at version 1 and index its participants.
    ///
    /// Fails with `AlreadyExists` if the id is taken and with
    /// `MembershipTaken` if any participant is indexed elsewhere.
    async fn create(&self, room: Room) -> Result<VersionedRoom, RegistryError>;

    /// Apply `change` if the stored version still equals `expected_version`.
    ///
    /// The membership index is updated in the same commit. Returns the new
    /// record for updates and `None` for deletes.
    async fn commit(
        &self,
        room_id: &str,
        expected_version: i64,
        change: RoomChange,
    ) -> Result<Option<VersionedRoom>, RegistryError>;
}

/// Split a proposed participant list into users added and removed relative
/// to the current one.
pub(crate) fn membership_diff<'a>(
    current: &'a Room,
    proposed: &'a Room,
) -> (Vec<&'a str>, Vec<&'a str>) {
    let added = proposed
        .participants
        .iter()
        .filter(|p| !current.contains(p))
        .map(String::as_str)
        .collect();
    let removed = current
        .participants
        .iter()
        .filter(|p| !proposed.contains(p))
        .map(String::as_str)
        .collect();
    (added, removed)
}

/// Check a proposed update before any backend write.
pub(crate) fn check_update(room_id: &str, proposed: &Room) -> Result<(), RegistryError> {
    if proposed.room_id != room_id {
        return Err(RegistryError::InvariantViolation(format!(
            "update for {room_id} carries room id {}",
            proposed.room_id
        )));
    }
    proposed.validate()?;
    Ok(())
}
