use crate::utils::{FailingSource, SETTLE_MS, init_tracing, participant, test_room};
use std::sync::Arc;
use std::time::Duration;
use voicemesh_client::sink::NullPlayback;
use voicemesh_client::store::{DocumentStore, MemoryStore, roster_path};
use voicemesh_client::transport::TransportConfig;
use voicemesh_client::{DeviceError, JoinError, VoiceClient};

#[tokio::test]
async fn permission_denied_aborts_join_without_roster_entry() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let room = test_room();

    let client = VoiceClient::new(store.clone())
        .with_capture_source(Arc::new(FailingSource(DeviceError::PermissionDenied)))
        .with_playback(Arc::new(NullPlayback))
        .with_transport_config(TransportConfig {
            ice_servers: Vec::new(),
        });

    let err = client
        .join(room.clone(), participant("user1"))
        .await
        .err()
        .expect("join must fail");
    assert!(matches!(
        err,
        JoinError::Device(DeviceError::PermissionDenied)
    ));

    // No partial presence was written.
    let mut roster = store.subscribe(&roster_path(&room)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(SETTLE_MS)).await;
    assert!(roster.try_recv().is_err());
}

#[tokio::test]
async fn device_not_found_surfaces_as_join_error() {
    let store = Arc::new(MemoryStore::new());
    let room = test_room();

    let client = VoiceClient::new(store)
        .with_capture_source(Arc::new(FailingSource(DeviceError::NotFound)))
        .with_playback(Arc::new(NullPlayback));

    let err = client
        .join(room, participant("user1"))
        .await
        .err()
        .expect("join must fail");
    assert!(matches!(err, JoinError::Device(DeviceError::NotFound)));
}
