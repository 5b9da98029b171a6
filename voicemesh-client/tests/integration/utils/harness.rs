use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::Level;
use voicemesh_client::media::SilenceSource;
use voicemesh_client::sink::NullPlayback;
use voicemesh_client::store::{DocChange, DocChangeKind, DocumentStore, MemoryStore, mailbox_path};
use voicemesh_client::transport::TransportConfig;
use voicemesh_client::{SessionEvent, VoiceClient};
use voicemesh_core::{ParticipantId, ParticipantRecord, RoomId};

/// Timeout for full connection establishment (ms).
pub const CONNECTION_TIMEOUT_MS: u64 = 30_000;

/// Settle time for store propagation in negative assertions (ms).
pub const SETTLE_MS: u64 = 300;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn test_room() -> RoomId {
    RoomId::new("test-server", "voice")
}

/// Client wired for loopback testing: silent capture, discarded playback,
/// host candidates only.
pub fn test_client(store: Arc<MemoryStore>) -> VoiceClient {
    VoiceClient::new(store)
        .with_capture_source(Arc::new(SilenceSource))
        .with_playback(Arc::new(NullPlayback))
        .with_transport_config(TransportConfig {
            ice_servers: Vec::new(),
        })
}

pub fn participant(uid: &str) -> ParticipantRecord {
    ParticipantRecord::new(uid, format!("Participant {}", uid))
}

/// Wait until the event stream yields an event matching `pred`.
pub async fn wait_for_event(
    events: &mut broadcast::Receiver<SessionEvent>,
    timeout_ms: u64,
    mut pred: impl FnMut(&SessionEvent) -> bool,
) -> SessionEvent {
    tokio::time::timeout(Duration::from_millis(timeout_ms), async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// Records every signal document ever added to one participant's mailbox,
/// including ones the recipient consumes right away.
pub struct MailboxSpy {
    rx: mpsc::UnboundedReceiver<DocChange>,
    seen: Vec<Value>,
}

impl MailboxSpy {
    pub async fn attach(store: &Arc<MemoryStore>, room: &RoomId, uid: &str) -> Self {
        let rx = store
            .subscribe(&mailbox_path(room, &ParticipantId::from(uid)))
            .await
            .expect("spy subscription failed");
        Self {
            rx,
            seen: Vec::new(),
        }
    }

    fn pump(&mut self) {
        while let Ok(change) = self.rx.try_recv() {
            if change.kind == DocChangeKind::Added {
                self.seen.push(change.fields);
            }
        }
    }

    /// Number of signals of the given wire type observed so far.
    pub fn count(&mut self, signal_type: &str) -> usize {
        self.pump();
        self.seen
            .iter()
            .filter(|fields| fields["type"] == signal_type)
            .count()
    }
}
