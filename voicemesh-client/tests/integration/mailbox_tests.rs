use crate::utils::{SETTLE_MS, test_room};
use std::sync::Arc;
use std::time::Duration;
use voicemesh_client::mailbox::Mailbox;
use voicemesh_client::store::{DocumentStore, MemoryStore, mailbox_path};
use voicemesh_core::{ParticipantId, SignalPayload};

#[tokio::test]
async fn send_deliver_consume_deletes() {
    let store = Arc::new(MemoryStore::new());
    let room = test_room();
    let sender = Mailbox::new(store.clone(), ParticipantId::from("user1"));
    let receiver = Mailbox::new(store.clone(), ParticipantId::from("user2"));

    let mut inbox = receiver.subscribe_inbox(&room).await.unwrap();

    sender
        .send(
            &room,
            &ParticipantId::from("user2"),
            SignalPayload::Offer {
                sdp: "v=0".to_owned(),
            },
        )
        .await
        .unwrap();

    let msg = tokio::time::timeout(Duration::from_secs(1), inbox.recv())
        .await
        .expect("delivery timed out")
        .expect("inbox closed");
    assert_eq!(msg.envelope.sender.as_str(), "user1");
    assert!(matches!(msg.envelope.payload, SignalPayload::Offer { .. }));

    receiver.consume(&room, &msg.doc_id).await.unwrap();

    // A consumed message is gone: a fresh subscription replays nothing.
    let mut replay = receiver.subscribe_inbox(&room).await.unwrap();
    tokio::time::sleep(Duration::from_millis(SETTLE_MS)).await;
    assert!(replay.try_recv().is_err());

    // Consuming again is a silent no-op.
    receiver.consume(&room, &msg.doc_id).await.unwrap();
}

#[tokio::test]
async fn unconsumed_messages_replay_to_a_new_subscription() {
    let store = Arc::new(MemoryStore::new());
    let room = test_room();
    let sender = Mailbox::new(store.clone(), ParticipantId::from("user1"));
    let receiver = Mailbox::new(store.clone(), ParticipantId::from("user2"));

    sender
        .send(
            &room,
            &ParticipantId::from("user2"),
            SignalPayload::Answer {
                sdp: "v=0".to_owned(),
            },
        )
        .await
        .unwrap();

    // Subscribed after the send: the document is still there and replays.
    let mut inbox = receiver.subscribe_inbox(&room).await.unwrap();
    let msg = tokio::time::timeout(Duration::from_secs(1), inbox.recv())
        .await
        .expect("replay timed out")
        .expect("inbox closed");
    assert!(matches!(msg.envelope.payload, SignalPayload::Answer { .. }));
}

#[tokio::test]
async fn malformed_signals_are_deleted_not_delivered() {
    let store = Arc::new(MemoryStore::new());
    let room = test_room();
    let uid = ParticipantId::from("user2");
    let path = mailbox_path(&room, &uid);

    store
        .put(&path, "junk", serde_json::json!({"nonsense": true}))
        .await
        .unwrap();

    let receiver = Mailbox::new(store.clone(), uid);
    let mut inbox = receiver.subscribe_inbox(&room).await.unwrap();

    tokio::time::sleep(Duration::from_millis(SETTLE_MS)).await;
    assert!(inbox.try_recv().is_err());

    // The boundary deleted the junk document itself.
    let mut raw = store.subscribe(&path).await.unwrap();
    assert!(raw.try_recv().is_err());
}
