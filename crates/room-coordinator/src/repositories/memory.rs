//! In-process room registry.
//!
//! Used when no `DATABASE_URL` is configured and throughout the tests. All
//! state sits behind one async mutex, so every commit is atomic. Scans walk
//! every record; this backend is not meant for large room counts.

use super::{
    check_update, membership_diff, RegistryError, RoomChange, RoomFilter, RoomRegistry,
    VersionedRoom,
};
use crate::models::Room;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::instrument;

#[derive(Debug, Default)]
struct RegistryState {
    rooms: HashMap<String, VersionedRoom>,
    /// user id -> room id
    memberships: HashMap<String, String>,
}

/// In-memory [`RoomRegistry`].
#[derive(Debug, Default)]
pub struct InMemoryRoomRegistry {
    state: Mutex<RegistryState>,
}

impl InMemoryRoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rooms.
    pub async fn room_count(&self) -> usize {
        self.state.lock().await.rooms.len()
    }
}

#[async_trait::async_trait]
impl RoomRegistry for InMemoryRoomRegistry {
    async fn get(&self, room_id: &str) -> Result<Option<VersionedRoom>, RegistryError> {
        Ok(self.state.lock().await.rooms.get(room_id).cloned())
    }

    async fn scan(&self, filter: RoomFilter) -> Result<Vec<VersionedRoom>, RegistryError> {
        let state = self.state.lock().await;
        let mut rooms: Vec<VersionedRoom> = state
            .rooms
            .values()
            .filter(|r| match filter {
                RoomFilter::All => true,
                RoomFilter::Open => !r.room.is_full,
            })
            .cloned()
            .collect();
        rooms.sort_by(|a, b| {
            (a.room.created_at, &a.room.room_id).cmp(&(b.room.created_at, &b.room.room_id))
        });
        Ok(rooms)
    }

    async fn membership(&self, user_id: &str) -> Result<Option<String>, RegistryError> {
        Ok(self.state.lock().await.memberships.get(user_id).cloned())
    }

    #[instrument(skip_all, name = "rc.repo.create_room", fields(room_id = %room.room_id))]
    async fn create(&self, room: Room) -> Result<VersionedRoom, RegistryError> {
        room.validate()?;

        let mut state = self.state.lock().await;
        if state.rooms.contains_key(&room.room_id) {
            return Err(RegistryError::AlreadyExists(room.room_id));
        }
        for user_id in &room.participants {
            if let Some(existing) = state.memberships.get(user_id) {
                return Err(RegistryError::MembershipTaken {
                    room_id: existing.clone(),
                });
            }
        }

        for user_id in &room.participants {
            state
                .memberships
                .insert(user_id.clone(), room.room_id.clone());
        }
        let versioned = VersionedRoom { room, version: 1 };
        state
            .rooms
            .insert(versioned.room.room_id.clone(), versioned.clone());
        Ok(versioned)
    }

    #[instrument(skip_all, name = "rc.repo.commit_room", fields(room_id = %room_id, expected_version = expected_version))]
    async fn commit(
        &self,
        room_id: &str,
        expected_version: i64,
        change: RoomChange,
    ) -> Result<Option<VersionedRoom>, RegistryError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let current = state
            .rooms
            .get(room_id)
            .ok_or_else(|| RegistryError::NotFound(room_id.to_string()))?;
        if current.version != expected_version {
            return Err(RegistryError::Conflict(room_id.to_string()));
        }

        match change {
            RoomChange::Update(proposed) => {
                check_update(room_id, &proposed)?;

                let (added, removed) = membership_diff(&current.room, &proposed);
                for user_id in &added {
                    if let Some(existing) = state.memberships.get(*user_id) {
                        if existing != room_id {
                            return Err(RegistryError::MembershipTaken {
                                room_id: existing.clone(),
                            });
                        }
                    }
                }
                for user_id in removed {
                    state.memberships.remove(user_id);
                }
                for user_id in added {
                    state
                        .memberships
                        .insert(user_id.to_string(), room_id.to_string());
                }

                let next = VersionedRoom {
                    version: current.version + 1,
                    room: proposed,
                };
                state.rooms.insert(room_id.to_string(), next.clone());
                Ok(Some(next))
            }
            RoomChange::Delete => {
                if let Some(removed) = state.rooms.remove(room_id) {
                    for user_id in &removed.room.participants {
                        state.memberships.remove(user_id);
                    }
                }
                Ok(None)
            }
        }
    }
}
