use crate::error::JoinError;
use crate::mailbox::Mailbox;
use crate::media::{CaptureConfig, CaptureSource, CpalSource, MediaController};
use crate::roster::Roster;
use crate::session::{LocalSession, VoiceHandle};
use crate::sink::{AudioOutputSink, CpalPlayback, NullPlayback, PlaybackBackend};
use crate::store::DocumentStore;
use crate::transport::TransportConfig;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::info;
use voicemesh_core::{ParticipantRecord, RoomId};

/// Entry point for voice rooms. Holds the store and device backends; each
/// `join` spawns an independent session owning its own connections,
/// subscriptions, and capture pipeline.
pub struct VoiceClient {
    store: Arc<dyn DocumentStore>,
    capture: Arc<dyn CaptureSource>,
    playback: Option<Arc<dyn PlaybackBackend>>,
    capture_config: CaptureConfig,
    transport_config: TransportConfig,
}

impl VoiceClient {
    /// Client with the default device backends. Devices are only touched at
    /// join time.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            capture: Arc::new(CpalSource),
            playback: None,
            capture_config: CaptureConfig::default(),
            transport_config: TransportConfig::default(),
        }
    }

    pub fn with_capture_source(mut self, source: Arc<dyn CaptureSource>) -> Self {
        self.capture = source;
        self
    }

    pub fn with_playback(mut self, backend: Arc<dyn PlaybackBackend>) -> Self {
        self.playback = Some(backend);
        self
    }

    pub fn with_capture_config(mut self, config: CaptureConfig) -> Self {
        self.capture_config = config;
        self
    }

    pub fn with_transport_config(mut self, config: TransportConfig) -> Self {
        self.transport_config = config;
        self
    }

    /// Join a voice room: acquire the microphone, register presence, spawn
    /// the session event loop. A device failure aborts the join before any
    /// roster write, so no partial presence is left behind.
    pub async fn join(
        &self,
        room: RoomId,
        participant: ParticipantRecord,
    ) -> Result<VoiceHandle, JoinError> {
        let mut media =
            MediaController::new(Arc::clone(&self.capture), self.capture_config.clone());
        media.acquire()?;

        let roster = Roster::new(Arc::clone(&self.store));
        let mailbox = Mailbox::new(Arc::clone(&self.store), participant.uid.clone());

        // Inbox first: an offer sent right after our record lands must not
        // slip past the subscription.
        let inbox_rx = mailbox.subscribe_inbox(&room).await?;
        let roster_rx = roster.subscribe(&room).await?;

        roster.join(&room, &participant).await?;

        // Default playback opens the output device now, falling back to
        // discarding audio when none exists.
        let playback = match &self.playback {
            Some(backend) => Arc::clone(backend),
            None => match CpalPlayback::open(
                self.capture_config.sample_rate,
                self.capture_config.channels,
            ) {
                Some(playback) => Arc::new(playback) as Arc<dyn PlaybackBackend>,
                None => Arc::new(NullPlayback),
            },
        };

        let sink = AudioOutputSink::new(playback);
        let mic_flag = media.mic_flag();
        let speaker_flag = sink.speaker_flag();

        let (command_tx, command_rx) = mpsc::channel(16);
        let (event_tx, _) = broadcast::channel(64);

        let session = LocalSession::new(
            room.clone(),
            participant,
            roster,
            mailbox,
            media,
            sink,
            self.transport_config.clone(),
            event_tx.clone(),
        );

        info!("Joined voice room {}", room);
        tokio::spawn(session.run(roster_rx, inbox_rx, command_rx));

        Ok(VoiceHandle::new(command_tx, event_tx, mic_flag, speaker_flag))
    }
}
