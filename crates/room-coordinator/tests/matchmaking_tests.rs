//! Matchmaking tests.
//!
//! Drives `MatchMaker` against the in-memory registry, wrapped where needed
//! to force interleavings or commit conflicts.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use common::secret::SecretString;
use futures::future::join_all;
use rc_test_utils::{
    assert_registry_consistent, total_participants, ConflictRegistry, YieldingRegistry,
};
use room_coordinator::auth::issuer::DEFAULT_TOKEN_TTL;
use room_coordinator::auth::Hs256TokenIssuer;
use room_coordinator::errors::RoomError;
use room_coordinator::models::Room;
use room_coordinator::repositories::{InMemoryRoomRegistry, RoomFilter, RoomRegistry};
use room_coordinator::services::provisioner::mock::MockRoomProvisioner;
use room_coordinator::services::{LeaveCoordinator, MatchMaker, MatchSettings};
use std::sync::Arc;

struct Harness {
    registry: Arc<dyn RoomRegistry>,
    provisioner: Arc<MockRoomProvisioner>,
    matchmaker: Arc<MatchMaker>,
    leave: LeaveCoordinator,
}

fn harness(registry: Arc<dyn RoomRegistry>, capacity: u32, retries: u32) -> Harness {
    harness_with(registry, MockRoomProvisioner::sequential(), capacity, retries)
}

fn harness_with(
    registry: Arc<dyn RoomRegistry>,
    provisioner: MockRoomProvisioner,
    capacity: u32,
    retries: u32,
) -> Harness {
    let provisioner = Arc::new(provisioner);
    let issuer = Arc::new(Hs256TokenIssuer::new(
        &SecretString::from("matchmaking-tests-secret"),
        DEFAULT_TOKEN_TTL,
    ));
    let matchmaker = Arc::new(MatchMaker::new(
        registry.clone(),
        provisioner.clone(),
        issuer,
        MatchSettings {
            capacity,
            max_conflict_retries: retries,
            access_key: "access-key".to_string(),
        },
    ));
    let leave = LeaveCoordinator::new(registry.clone(), retries);
    Harness {
        registry,
        provisioner,
        matchmaker,
        leave,
    }
}

fn in_memory() -> Arc<dyn RoomRegistry> {
    Arc::new(InMemoryRoomRegistry::new())
}

#[tokio::test]
async fn test_pairs_users_then_provisions_next_room() {
    let h = harness(in_memory(), 2, 3);

    let first = h.matchmaker.join("u1").await.unwrap();
    let stored = h.registry.get(&first.room_id).await.unwrap().unwrap();
    assert_eq!(stored.room.participants, vec!["u1"]);
    assert!(!stored.room.is_full);

    let second = h.matchmaker.join("u2").await.unwrap();
    assert_eq!(second.room_id, first.room_id);
    assert_eq!(second.participants, vec!["u1", "u2"]);
    let stored = h.registry.get(&first.room_id).await.unwrap().unwrap();
    assert!(stored.room.is_full);

    let third = h.matchmaker.join("u3").await.unwrap();
    assert_ne!(third.room_id, first.room_id);
    assert_eq!(third.participants, vec!["u3"]);
    assert_eq!(h.provisioner.call_count(), 2);

    assert_registry_consistent(h.registry.as_ref()).await;
}

#[tokio::test]
async fn test_repeat_join_reports_existing_room() {
    let h = harness(in_memory(), 2, 3);

    let first = h.matchmaker.join("u1").await.unwrap();
    let err = h.matchmaker.join("u1").await.unwrap_err();

    assert!(matches!(err, RoomError::AlreadyMember { room_id } if room_id == first.room_id));
    assert_eq!(h.provisioner.call_count(), 1);
}

#[tokio::test]
async fn test_rejoin_after_leave_is_allowed() {
    let h = harness(in_memory(), 2, 3);

    let first = h.matchmaker.join("u1").await.unwrap();
    h.matchmaker.join("u2").await.unwrap();
    h.leave.leave("u1", &first.room_id).await.unwrap();

    // u2's room has space again and is the oldest open room
    let rejoined = h.matchmaker.join("u1").await.unwrap();
    assert_eq!(rejoined.room_id, first.room_id);
    assert_eq!(rejoined.participants, vec!["u2", "u1"]);
    assert_registry_consistent(h.registry.as_ref()).await;
}

#[tokio::test]
async fn test_provisioning_failure_is_external_error() {
    let h = harness_with(in_memory(), MockRoomProvisioner::failing(), 2, 3);

    let err = h.matchmaker.join("u1").await.unwrap_err();

    assert!(matches!(err, RoomError::ExternalService(_)));
    assert!(h.registry.scan(RoomFilter::All).await.unwrap().is_empty());
    assert!(h.registry.membership("u1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_transient_conflicts_are_retried() {
    let inner = in_memory();
    inner
        .create(Room::new("room-1", "a", 2, chrono::Utc::now()))
        .await
        .unwrap();
    let conflicting = Arc::new(ConflictRegistry::new(inner.clone(), 2));
    let h = harness(conflicting.clone(), 2, 3);

    let joined = h.matchmaker.join("u1").await.unwrap();

    assert_eq!(joined.room_id, "room-1");
    assert_eq!(conflicting.conflicts(), 2);
    assert_eq!(h.provisioner.call_count(), 0);
}

#[tokio::test]
async fn test_exhausted_conflicts_do_not_fragment_rooms() {
    let inner = in_memory();
    inner
        .create(Room::new("hot-room", "a", 2, chrono::Utc::now()))
        .await
        .unwrap();
    let conflicting = Arc::new(ConflictRegistry::always(inner.clone()));
    let h = harness(conflicting.clone(), 2, 3);

    let err = h.matchmaker.join("u1").await.unwrap_err();

    assert!(matches!(err, RoomError::ConflictExhausted(_)));
    // One first attempt plus three retries
    assert_eq!(conflicting.conflicts(), 4);
    assert_eq!(h.provisioner.call_count(), 0);
    assert!(inner.membership("u1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_contended_room_is_skipped_for_next_open_room() {
    let inner = in_memory();
    let now = chrono::Utc::now();
    inner
        .create(Room::new("hot-room", "a", 2, now))
        .await
        .unwrap();
    inner
        .create(Room::new("cool-room", "b", 2, now + chrono::Duration::seconds(1)))
        .await
        .unwrap();
    let conflicting = Arc::new(ConflictRegistry::always_for(inner.clone(), "hot-room"));
    let h = harness(conflicting.clone(), 2, 3);

    let joined = h.matchmaker.join("u1").await.unwrap();

    assert_eq!(joined.room_id, "cool-room");
    assert_eq!(joined.participants, vec!["b", "u1"]);
    assert!(!joined.created);
    // The older room used its whole budget before the join moved on
    assert_eq!(conflicting.conflicts(), 4);
    assert_eq!(h.provisioner.call_count(), 0);
    let hot = inner.get("hot-room").await.unwrap().unwrap();
    assert_eq!(hot.room.participants, vec!["a"]);
    assert_registry_consistent(inner.as_ref()).await;
}

#[tokio::test]
async fn test_contended_room_among_full_rooms_exhausts() {
    let inner = in_memory();
    let now = chrono::Utc::now();
    let mut full = Room::new("full-room", "a", 2, now);
    full.add_participant("b");
    inner.create(full).await.unwrap();
    inner
        .create(Room::new("hot-room", "c", 2, now + chrono::Duration::seconds(1)))
        .await
        .unwrap();
    let conflicting = Arc::new(ConflictRegistry::always_for(inner.clone(), "hot-room"));
    let h = harness(conflicting.clone(), 2, 3);

    let err = h.matchmaker.join("u1").await.unwrap_err();

    assert!(matches!(err, RoomError::ConflictExhausted(_)));
    assert_eq!(conflicting.conflicts(), 4);
    assert_eq!(h.provisioner.call_count(), 0);
    assert!(inner.membership("u1").await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_joins_never_overfill_rooms() {
    let registry: Arc<dyn RoomRegistry> = Arc::new(YieldingRegistry::new(in_memory()));
    let h = harness(registry, 2, 16);

    let joins = (0..24).map(|i| {
        let matchmaker = h.matchmaker.clone();
        tokio::spawn(async move { matchmaker.join(&format!("user-{i}")).await })
    });
    let results: Vec<_> = join_all(joins)
        .await
        .into_iter()
        .map(|r| r.expect("join task panicked"))
        .collect();

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    for result in &results {
        if let Err(e) = result {
            assert!(
                matches!(e, RoomError::ConflictExhausted(_)),
                "unexpected join error: {e:?}"
            );
        }
    }

    assert!(succeeded > 0);
    assert_eq!(total_participants(h.registry.as_ref()).await, succeeded);
    assert_registry_consistent(h.registry.as_ref()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_joins_for_one_user_place_it_once() {
    let registry: Arc<dyn RoomRegistry> = Arc::new(YieldingRegistry::new(in_memory()));
    let h = harness(registry, 2, 16);

    let joins = (0..8).map(|_| {
        let matchmaker = h.matchmaker.clone();
        tokio::spawn(async move { matchmaker.join("same-user").await })
    });
    let results: Vec<_> = join_all(joins)
        .await
        .into_iter()
        .map(|r| r.expect("join task panicked"))
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for result in &results {
        if let Err(e) = result {
            assert!(
                matches!(
                    e,
                    RoomError::AlreadyMember { .. } | RoomError::ConflictExhausted(_)
                ),
                "unexpected join error: {e:?}"
            );
        }
    }

    assert_eq!(total_participants(h.registry.as_ref()).await, 1);
    assert_registry_consistent(h.registry.as_ref()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_joins_and_leaves_keep_registry_consistent() {
    let registry: Arc<dyn RoomRegistry> = Arc::new(YieldingRegistry::new(in_memory()));
    let h = Arc::new(harness(registry, 3, 16));

    let tasks = (0..16).map(|i| {
        let h = h.clone();
        tokio::spawn(async move {
            let user = format!("user-{i}");
            let Ok(joined) = h.matchmaker.join(&user).await else {
                return;
            };
            if i % 2 == 0 {
                match h.leave.leave(&user, &joined.room_id).await {
                    Ok(_) | Err(RoomError::ConflictExhausted(_)) => {}
                    Err(e) => panic!("member could not leave: {e:?}"),
                }
            }
        })
    });
    for task in join_all(tasks).await {
        task.expect("task panicked");
    }

    assert_registry_consistent(h.registry.as_ref()).await;
}
