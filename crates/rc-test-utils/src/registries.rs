//! Registry wrappers for concurrency tests.
//!
//! - [`YieldingRegistry`] yields to the scheduler around every call so
//!   concurrent requests interleave between read and commit
//! - [`ConflictRegistry`] fails a fixed number of commits with a conflict,
//!   optionally only those against one room

use room_coordinator::models::Room;
use room_coordinator::repositories::{
    RegistryError, RoomChange, RoomFilter, RoomRegistry, VersionedRoom,
};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

/// Registry that yields before and after every delegated call.
pub struct YieldingRegistry {
    inner: Arc<dyn RoomRegistry>,
    commits: AtomicUsize,
}

impl YieldingRegistry {
    pub fn new(inner: Arc<dyn RoomRegistry>) -> Self {
        Self {
            inner,
            commits: AtomicUsize::new(0),
        }
    }

    /// Number of commits attempted, successful or not.
    pub fn commit_attempts(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RoomRegistry for YieldingRegistry {
    async fn get(&self, room_id: &str) -> Result<Option<VersionedRoom>, RegistryError> {
        tokio::task::yield_now().await;
        let result = self.inner.get(room_id).await;
        tokio::task::yield_now().await;
        result
    }

    async fn scan(&self, filter: RoomFilter) -> Result<Vec<VersionedRoom>, RegistryError> {
        tokio::task::yield_now().await;
        let result = self.inner.scan(filter).await;
        tokio::task::yield_now().await;
        result
    }

    async fn membership(&self, user_id: &str) -> Result<Option<String>, RegistryError> {
        tokio::task::yield_now().await;
        self.inner.membership(user_id).await
    }

    async fn create(&self, room: Room) -> Result<VersionedRoom, RegistryError> {
        tokio::task::yield_now().await;
        self.inner.create(room).await
    }

    async fn commit(
        &self,
        room_id: &str,
        expected_version: i64,
        change: RoomChange,
    ) -> Result<Option<VersionedRoom>, RegistryError> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.inner.commit(room_id, expected_version, change).await
    }
}

/// Registry whose first `n` commits fail with `Conflict` without touching
/// the inner registry.
pub struct ConflictRegistry {
    inner: Arc<dyn RoomRegistry>,
    remaining: AtomicU32,
    conflicts: AtomicU32,
    /// Only commits against this room conflict when set.
    room_id: Option<String>,
}

impl ConflictRegistry {
    pub fn new(inner: Arc<dyn RoomRegistry>, conflicts: u32) -> Self {
        Self {
            inner,
            remaining: AtomicU32::new(conflicts),
            conflicts: AtomicU32::new(0),
            room_id: None,
        }
    }

    /// Registry that never lets a commit through.
    pub fn always(inner: Arc<dyn RoomRegistry>) -> Self {
        Self::new(inner, u32::MAX)
    }

    /// Registry that never lets a commit against `room_id` through and
    /// passes every other commit to `inner`.
    pub fn always_for(inner: Arc<dyn RoomRegistry>, room_id: impl Into<String>) -> Self {
        Self {
            room_id: Some(room_id.into()),
            ..Self::always(inner)
        }
    }

    /// Number of conflicts reported so far.
    pub fn conflicts(&self) -> u32 {
        self.conflicts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RoomRegistry for ConflictRegistry {
    async fn get(&self, room_id: &str) -> Result<Option<VersionedRoom>, RegistryError> {
        self.inner.get(room_id).await
    }

    async fn scan(&self, filter: RoomFilter) -> Result<Vec<VersionedRoom>, RegistryError> {
        self.inner.scan(filter).await
    }

    async fn membership(&self, user_id: &str) -> Result<Option<String>, RegistryError> {
        self.inner.membership(user_id).await
    }

    async fn create(&self, room: Room) -> Result<VersionedRoom, RegistryError> {
        self.inner.create(room).await
    }

    async fn commit(
        &self,
        room_id: &str,
        expected_version: i64,
        change: RoomChange,
    ) -> Result<Option<VersionedRoom>, RegistryError> {
        if self.room_id.as_deref().is_some_and(|target| target != room_id) {
            return self.inner.commit(room_id, expected_version, change).await;
        }

        let take = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if take {
            self.conflicts.fetch_add(1, Ordering::SeqCst);
            return Err(RegistryError::Conflict(room_id.to_string()));
        }
        self.inner.commit(room_id, expected_version, change).await
    }
}
