use crate::utils::{
    CONNECTION_TIMEOUT_MS, MailboxSpy, SETTLE_MS, init_tracing, participant, test_client,
    test_room, wait_for_event,
};
use std::sync::Arc;
use std::time::Duration;
use voicemesh_client::SessionEvent;
use voicemesh_client::store::{DocChangeKind, DocumentStore, MemoryStore, roster_path};

#[tokio::test]
async fn two_participants_connect_with_a_single_offer() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let room = test_room();

    let mut spy1 = MailboxSpy::attach(&store, &room, "user1").await;
    let mut spy2 = MailboxSpy::attach(&store, &room, "user2").await;

    let client1 = test_client(store.clone());
    let client2 = test_client(store.clone());

    let handle1 = client1
        .join(room.clone(), participant("user1"))
        .await
        .expect("user1 join failed");
    let mut events1 = handle1.events();

    let handle2 = client2
        .join(room.clone(), participant("user2"))
        .await
        .expect("user2 join failed");
    let mut events2 = handle2.events();

    wait_for_event(&mut events1, CONNECTION_TIMEOUT_MS, |e| {
        matches!(e, SessionEvent::ConnectionEstablished(p) if p.as_str() == "user2")
    })
    .await;
    wait_for_event(&mut events2, CONNECTION_TIMEOUT_MS, |e| {
        matches!(e, SessionEvent::ConnectionEstablished(p) if p.as_str() == "user1")
    })
    .await;

    // "user1" < "user2": the offer went one way, the answer the other.
    assert_eq!(spy2.count("offer"), 1, "user2 should receive the one offer");
    assert_eq!(spy1.count("offer"), 0, "user1 must never receive an offer");
    assert_eq!(spy1.count("answer"), 1, "user1 should receive the answer");
    assert_eq!(spy2.count("answer"), 0, "user2 must never receive an answer");

    // Peer departure tears the session down within one notification cycle.
    handle2.leave().await;
    wait_for_event(&mut events1, 10_000, |e| {
        matches!(e, SessionEvent::ParticipantLeft(p) if p.as_str() == "user2")
    })
    .await;

    handle1.leave().await;
}

#[tokio::test]
async fn three_participants_form_a_full_mesh() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let room = test_room();

    let mut spy1 = MailboxSpy::attach(&store, &room, "user1").await;
    let mut spy2 = MailboxSpy::attach(&store, &room, "user2").await;
    let mut spy3 = MailboxSpy::attach(&store, &room, "user3").await;

    let mut handles = Vec::new();
    let mut event_streams = Vec::new();
    for uid in ["user1", "user2", "user3"] {
        let client = test_client(store.clone());
        let handle = client
            .join(room.clone(), participant(uid))
            .await
            .unwrap_or_else(|e| panic!("{uid} join failed: {e}"));
        event_streams.push((uid, handle.events()));
        handles.push(handle);
    }

    // Every participant connects to both others.
    for (uid, events) in &mut event_streams {
        for _ in 0..2 {
            let event = wait_for_event(events, CONNECTION_TIMEOUT_MS, |e| {
                matches!(e, SessionEvent::ConnectionEstablished(_))
            })
            .await;
            if let SessionEvent::ConnectionEstablished(peer) = &event {
                assert_ne!(peer.as_str(), *uid);
            }
        }
    }

    // Offers flow only from smaller to larger uid: user1 offers to both,
    // user2 offers to user3, nobody offers to user1.
    assert_eq!(spy1.count("offer"), 0);
    assert_eq!(spy2.count("offer"), 1);
    assert_eq!(spy3.count("offer"), 2);

    for handle in handles {
        handle.leave().await;
    }
}

#[tokio::test]
async fn mute_toggle_does_not_renegotiate() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let room = test_room();

    let mut spy1 = MailboxSpy::attach(&store, &room, "user1").await;
    let mut spy2 = MailboxSpy::attach(&store, &room, "user2").await;

    let client1 = test_client(store.clone());
    let client2 = test_client(store.clone());

    let handle1 = client1
        .join(room.clone(), participant("user1"))
        .await
        .expect("user1 join failed");
    let mut events1 = handle1.events();
    let handle2 = client2
        .join(room.clone(), participant("user2"))
        .await
        .expect("user2 join failed");

    wait_for_event(&mut events1, CONNECTION_TIMEOUT_MS, |e| {
        matches!(e, SessionEvent::ConnectionEstablished(_))
    })
    .await;

    let offers_before = spy1.count("offer") + spy2.count("offer");
    let answers_before = spy1.count("answer") + spy2.count("answer");

    assert!(handle1.mic_enabled());
    assert!(!handle1.set_mic_enabled(false).await);
    wait_for_event(&mut events1, 5_000, |e| {
        matches!(e, SessionEvent::MicToggled(false))
    })
    .await;
    assert!(!handle1.mic_enabled());

    // The mute state is broadcast through the roster record.
    tokio::time::sleep(Duration::from_millis(SETTLE_MS)).await;
    let mut roster = store.subscribe(&roster_path(&room)).await.unwrap();
    let mut muted_seen = false;
    while let Ok(change) = roster.try_recv() {
        if change.kind == DocChangeKind::Added && change.doc_id == "user1" {
            muted_seen = change.fields["muted"] == true;
        }
    }
    assert!(muted_seen, "user1's roster record should carry muted=true");

    assert!(handle1.set_mic_enabled(true).await);
    tokio::time::sleep(Duration::from_millis(SETTLE_MS)).await;

    // No new offer/answer exchange happened for either toggle.
    assert_eq!(spy1.count("offer") + spy2.count("offer"), offers_before);
    assert_eq!(spy1.count("answer") + spy2.count("answer"), answers_before);

    handle1.leave().await;
    handle2.leave().await;
}

#[tokio::test]
async fn speaker_toggle_is_local_and_observable() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let room = test_room();

    let client = test_client(store);
    let handle = client
        .join(room, participant("user1"))
        .await
        .expect("join failed");
    let mut events = handle.events();

    assert!(handle.speaker_enabled());
    assert!(!handle.set_speaker_enabled(false).await);
    wait_for_event(&mut events, 5_000, |e| {
        matches!(e, SessionEvent::SpeakerToggled(false))
    })
    .await;
    assert!(!handle.speaker_enabled());

    assert!(handle.set_speaker_enabled(true).await);
    assert!(handle.speaker_enabled());

    handle.leave().await;
}
