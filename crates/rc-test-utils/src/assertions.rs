//! Registry invariant assertions.

use room_coordinator::repositories::{RoomFilter, RoomRegistry};
use std::collections::HashMap;

/// Assert that every committed room respects its capacity, that no user is
/// listed in two rooms, and that the membership index matches the rooms.
///
/// # Panics
///
/// Panics with a description of the first violation found.
pub async fn assert_registry_consistent(registry: &dyn RoomRegistry) {
    let rooms = registry
        .scan(RoomFilter::All)
        .await
        .expect("registry scan should succeed");

    let mut seen: HashMap<String, String> = HashMap::new();
    for versioned in &rooms {
        let room = &versioned.room;

        assert!(
            room.participants.len() <= room.capacity as usize,
            "room {} holds {} participants, capacity {}",
            room.room_id,
            room.participants.len(),
            room.capacity
        );
        assert!(
            !room.participants.is_empty(),
            "room {} has no participants",
            room.room_id
        );
        assert_eq!(
            room.is_full,
            room.participants.len() >= room.capacity as usize,
            "room {} has a stale is_full flag",
            room.room_id
        );

        for user in &room.participants {
            if let Some(other) = seen.insert(user.clone(), room.room_id.clone()) {
                panic!(
                    "user {user} is listed in rooms {other} and {}",
                    room.room_id
                );
            }

            let indexed = registry
                .membership(user)
                .await
                .expect("membership lookup should succeed");
            assert_eq!(
                indexed.as_deref(),
                Some(room.room_id.as_str()),
                "membership index for {user} does not match room {}",
                room.room_id
            );
        }
    }
}

/// Total participants across all rooms.
pub async fn total_participants(registry: &dyn RoomRegistry) -> usize {
    registry
        .scan(RoomFilter::All)
        .await
        .expect("registry scan should succeed")
        .iter()
        .map(|r| r.room.participants.len())
        .sum()
}
