//! Optimistic read-modify-commit loop over a single room.
//!
//! Each attempt reads the room, asks the caller what to do with it, and
//! commits against the version it read. A conflicting commit is retried with
//! fresh data until the attempt budget runs out.

use super::{RegistryError, RoomChange, RoomRegistry};
use crate::models::Room;
use crate::observability::metrics;
use tracing::{debug, instrument};

/// What to do with the room read in one attempt.
#[derive(Debug)]
pub enum TxDecision<T> {
    /// Commit `change`; yield the value if the commit succeeds.
    Commit(RoomChange, T),
    /// Leave the room unchanged and stop.
    Abort(T),
}

/// Result of [`run_room_transaction`].
#[derive(Debug, PartialEq, Eq)]
pub enum TxOutcome<T> {
    /// A commit succeeded.
    Committed(T),
    /// The decision function aborted.
    Aborted(T),
    /// The room does not exist (or was deleted mid-transaction).
    Missing,
    /// Every attempt ended in a version conflict.
    Exhausted,
}

/// Run an optimistic transaction against `room_id`.
///
/// `decide` may run once per attempt and must not have side effects.
/// Makes `1 + max_retries` attempts before giving up with
/// [`TxOutcome::Exhausted`]. `operation` labels the conflict metric.
///
/// # Errors
///
/// Registry errors other than `Conflict` and `NotFound` are returned as-is.
#[instrument(skip_all, name = "rc.repo.room_transaction", fields(room_id = %room_id, operation = operation))]
pub async fn run_room_transaction<T, F>(
    registry: &dyn RoomRegistry,
    room_id: &str,
    max_retries: u32,
    operation: &'static str,
    mut decide: F,
) -> Result<TxOutcome<T>, RegistryError>
where
    T: Send,
    F: FnMut(&Room) -> TxDecision<T> + Send,
{
    for attempt in 0..=max_retries {
        let Some(current) = registry.get(room_id).await? else {
            return Ok(TxOutcome::Missing);
        };

        let (change, value) = match decide(&current.room) {
            TxDecision::Abort(value) => return Ok(TxOutcome::Aborted(value)),
            TxDecision::Commit(change, value) => (change, value),
        };

        match registry.commit(room_id, current.version, change).await {
            Ok(_) => return Ok(TxOutcome::Committed(value)),
            Err(RegistryError::Conflict(_)) => {
                metrics::record_registry_conflict(operation);
                debug!(
                    target: "rc.repository.rooms",
                    room_id = %room_id,
                    attempt = attempt.saturating_add(1),
                    version = current.version,
                    "Commit conflict, retrying with fresh read"
                );
            }
            Err(RegistryError::NotFound(_)) => return Ok(TxOutcome::Missing),
            Err(e) => return Err(e),
        }
    }

    Ok(TxOutcome::Exhausted)
}
