//! PostgreSQL room registry.
//!
//! Rooms live in `rooms` with a `version` column used for optimistic
//! commits. The membership index lives in `room_memberships` with
//! `user_id` as primary key, so the database itself rejects a user in two
//! rooms.
//!
//! # Security
//!
//! - All queries use parameterized statements (SQL injection safe)
//! - Participant ids are not logged

use super::{
    check_update, membership_diff, RegistryError, RoomChange, RoomFilter, RoomRegistry,
    VersionedRoom,
};
use crate::models::Room;
use crate::observability::metrics;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use std::time::Instant;
use tracing::instrument;

/// PostgreSQL-backed [`RoomRegistry`].
#[derive(Clone)]
pub struct PgRoomRegistry {
    pool: PgPool,
}

impl PgRoomRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Time a query and record its outcome.
async fn timed<T, F>(operation: &'static str, query: F) -> Result<T, RegistryError>
where
    F: std::future::Future<Output = Result<T, RegistryError>>,
{
    let start = Instant::now();
    let result = query.await;
    let status = if result.is_ok() { "success" } else { "error" };
    metrics::record_db_query(operation, status, start.elapsed());
    result
}

#[async_trait::async_trait]
impl RoomRegistry for PgRoomRegistry {
    #[instrument(skip_all, name = "rc.repo.get_room", fields(room_id = %room_id))]
    async fn get(&self, room_id: &str) -> Result<Option<VersionedRoom>, RegistryError> {
        timed("get_room", async {
            let row: Option<RoomRow> = sqlx::query_as(
                r#"
                SELECT room_id, participants, capacity, is_full, version, created_at
                FROM rooms
                WHERE room_id = $1
                "#,
            )
            .bind(room_id)
            .fetch_optional(&self.pool)
            .await?;

            row.map(RoomRow::into_versioned).transpose()
        })
        .await
    }

    #[instrument(skip_all, name = "rc.repo.scan_rooms", fields(filter = ?filter))]
    async fn scan(&self, filter: RoomFilter) -> Result<Vec<VersionedRoom>, RegistryError> {
        timed("scan_rooms", async {
            // The open-room scan is served by idx_rooms_open
            let only_open = filter == RoomFilter::Open;
            let rows: Vec<RoomRow> = sqlx::query_as(
                r#"
                SELECT room_id, participants, capacity, is_full, version, created_at
                FROM rooms
                WHERE ($1 = false OR is_full = false)
                ORDER BY created_at ASC, room_id ASC
                "#,
            )
            .bind(only_open)
            .fetch_all(&self.pool)
            .await?;

            rows.into_iter().map(RoomRow::into_versioned).collect()
        })
        .await
    }

    #[instrument(skip_all, name = "rc.repo.get_membership")]
    async fn membership(&self, user_id: &str) -> Result<Option<String>, RegistryError> {
        timed("get_membership", async {
            let row: Option<(String,)> =
                sqlx::query_as("SELECT room_id FROM room_memberships WHERE user_id = $1")
                    .bind(user_id)
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(row.map(|(room_id,)| room_id))
        })
        .await
    }

    #[instrument(skip_all, name = "rc.repo.create_room", fields(room_id = %room.room_id))]
    async fn create(&self, room: Room) -> Result<VersionedRoom, RegistryError> {
        room.validate()?;
        let capacity = capacity_column(room.capacity)?;

        timed("create_room", async {
            let mut tx = self.pool.begin().await?;

            let row: Option<RoomRow> = sqlx::query_as(
                r#"
                INSERT INTO rooms (room_id, participants, capacity, is_full, version, created_at)
                VALUES ($1, $2, $3, $4, 1, $5)
                ON CONFLICT (room_id) DO NOTHING
                RETURNING room_id, participants, capacity, is_full, version, created_at
                "#,
            )
            .bind(&room.room_id)
            .bind(&room.participants)
            .bind(capacity)
            .bind(room.is_full)
            .bind(room.created_at)
            .fetch_optional(&mut *tx)
            .await?;

            let Some(row) = row else {
                return Err(RegistryError::AlreadyExists(room.room_id.clone()));
            };

            for user_id in &room.participants {
                claim_membership(&mut tx, user_id, &room.room_id).await?;
            }

            tx.commit().await?;
            row.into_versioned()
        })
        .await
    }

    #[instrument(skip_all, name = "rc.repo.commit_room", fields(room_id = %room_id, expected_version = expected_version))]
    async fn commit(
        &self,
        room_id: &str,
        expected_version: i64,
        change: RoomChange,
    ) -> Result<Option<VersionedRoom>, RegistryError> {
        timed("commit_room", async {
            let mut tx = self.pool.begin().await?;

            // Row lock holds off concurrent commits until this one finishes
            let row: Option<RoomRow> = sqlx::query_as(
                r#"
                SELECT room_id, participants, capacity, is_full, version, created_at
                FROM rooms
                WHERE room_id = $1
                FOR UPDATE
                "#,
            )
            .bind(room_id)
            .fetch_optional(&mut *tx)
            .await?;

            let Some(row) = row else {
                return Err(RegistryError::NotFound(room_id.to_string()));
            };
            if row.version != expected_version {
                return Err(RegistryError::Conflict(room_id.to_string()));
            }
            let current = row.into_versioned()?;

            match change {
                RoomChange::Update(proposed) => {
                    check_update(room_id, &proposed)?;
                    let (added, removed) = membership_diff(&current.room, &proposed);

                    for user_id in added {
                        claim_membership(&mut tx, user_id, room_id).await?;
                    }
                    if !removed.is_empty() {
                        let removed: Vec<String> =
                            removed.into_iter().map(str::to_string).collect();
                        sqlx::query(
                            "DELETE FROM room_memberships WHERE room_id = $1 AND user_id = ANY($2)",
                        )
                        .bind(room_id)
                        .bind(&removed)
                        .execute(&mut *tx)
                        .await?;
                    }

                    let updated: RoomRow = sqlx::query_as(
                        r#"
                        UPDATE rooms
                        SET participants = $2, is_full = $3, version = version + 1
                        WHERE room_id = $1
                        RETURNING room_id, participants, capacity, is_full, version, created_at
                        "#,
                    )
                    .bind(room_id)
                    .bind(&proposed.participants)
                    .bind(proposed.is_full)
                    .fetch_one(&mut *tx)
                    .await?;

                    tx.commit().await?;
                    updated.into_versioned().map(Some)
                }
                RoomChange::Delete => {
                    // room_memberships rows go with ON DELETE CASCADE
                    sqlx::query("DELETE FROM rooms WHERE room_id = $1")
                        .bind(room_id)
                        .execute(&mut *tx)
                        .await?;
                    tx.commit().await?;
                    Ok(None)
                }
            }
        })
        .await
    }
}

/// Index `user_id` to `room_id` inside the open transaction.
///
/// A concurrent claim for the same user blocks on the primary key until the
/// other transaction finishes; if it committed, this one sees its row.
async fn claim_membership(
    tx: &mut Transaction<'_, Postgres>,
    user_id: &str,
    room_id: &str,
) -> Result<(), RegistryError> {
    let inserted: Option<(String,)> = sqlx::query_as(
        r#"
        INSERT INTO room_memberships (user_id, room_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id) DO NOTHING
        RETURNING user_id
        "#,
    )
    .bind(user_id)
    .bind(room_id)
    .fetch_optional(&mut **tx)
    .await?;

    if inserted.is_some() {
        return Ok(());
    }

    let existing: Option<(String,)> =
        sqlx::query_as("SELECT room_id FROM room_memberships WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await?;

    match existing {
        Some((existing_room,)) if existing_room != room_id => Err(RegistryError::MembershipTaken {
            room_id: existing_room,
        }),
        _ => Ok(()),
    }
}

fn capacity_column(capacity: u32) -> Result<i32, RegistryError> {
    i32::try_from(capacity)
        .map_err(|_| RegistryError::InvariantViolation(format!("capacity {capacity} too large")))
}

#[derive(sqlx::FromRow)]
struct RoomRow {
    room_id: String,
    participants: Vec<String>,
    capacity: i32,
    is_full: bool,
    version: i64,
    created_at: DateTime<Utc>,
}

impl RoomRow {
    fn into_versioned(self) -> Result<VersionedRoom, RegistryError> {
        let capacity = u32::try_from(self.capacity).map_err(|_| {
            RegistryError::InvariantViolation(format!(
                "stored capacity {} for room {}",
                self.capacity, self.room_id
            ))
        })?;
        Ok(VersionedRoom {
            room: Room {
                room_id: self.room_id,
                participants: self.participants,
                capacity,
                is_full: self.is_full,
                created_at: self.created_at,
            },
            version: self.version,
        })
    }
}
