use crate::utils::{participant, test_room};
use std::sync::Arc;
use voicemesh_client::roster::Roster;
use voicemesh_client::store::MemoryStore;
use voicemesh_core::ParticipantId;

#[tokio::test]
async fn subscription_replays_existing_participants() {
    let store = Arc::new(MemoryStore::new());
    let room = test_room();
    let roster = Roster::new(store);

    roster.join(&room, &participant("user1")).await.unwrap();
    roster.join(&room, &participant("user2")).await.unwrap();

    let mut snapshots = roster.subscribe(&room).await.unwrap();
    let first = snapshots.recv().await.unwrap();
    assert_eq!(first.len(), 1);

    let second = snapshots.recv().await.unwrap();
    assert_eq!(second.len(), 2);
    assert!(second.iter().any(|r| r.uid.as_str() == "user1"));
    assert!(second.iter().any(|r| r.uid.as_str() == "user2"));
}

#[tokio::test]
async fn join_is_an_upsert() {
    let store = Arc::new(MemoryStore::new());
    let room = test_room();
    let roster = Roster::new(store);

    roster.join(&room, &participant("user1")).await.unwrap();

    let mut renamed = participant("user1");
    renamed.display_name = "Renamed".to_owned();
    roster.join(&room, &renamed).await.unwrap();

    let mut snapshots = roster.subscribe(&room).await.unwrap();
    let snapshot = snapshots.recv().await.unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].display_name, "Renamed");
}

#[tokio::test]
async fn leave_removes_only_own_record() {
    let store = Arc::new(MemoryStore::new());
    let room = test_room();
    let roster = Roster::new(store);

    roster.join(&room, &participant("user1")).await.unwrap();
    roster.join(&room, &participant("user2")).await.unwrap();

    let mut snapshots = roster.subscribe(&room).await.unwrap();
    let _first = snapshots.recv().await.unwrap();
    let _second = snapshots.recv().await.unwrap();

    let uid = ParticipantId::from("user1");
    roster.leave(&room, &uid).await.unwrap();

    let snapshot = snapshots.recv().await.unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].uid.as_str(), "user2");

    // Leaving twice is fine; already absent is not an error.
    roster.leave(&room, &uid).await.unwrap();
}
