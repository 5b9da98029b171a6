use crate::session::{SessionCommand, SessionEvent};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::debug;

/// Owning handle for one joined room: commands in, events out. `leave`
/// tears the session down and waits for it; dropping the handle fires the
/// same teardown without waiting.
pub struct VoiceHandle {
    command_tx: mpsc::Sender<SessionCommand>,
    events: broadcast::Sender<SessionEvent>,
    mic_enabled: Arc<AtomicBool>,
    speaker_enabled: Arc<AtomicBool>,
}

impl VoiceHandle {
    pub(crate) fn new(
        command_tx: mpsc::Sender<SessionCommand>,
        events: broadcast::Sender<SessionEvent>,
        mic_enabled: Arc<AtomicBool>,
        speaker_enabled: Arc<AtomicBool>,
    ) -> Self {
        Self {
            command_tx,
            events,
            mic_enabled,
            speaker_enabled,
        }
    }

    /// Subscribe to room events. Late subscribers only see new events.
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Returns the new state once the session has applied it.
    pub async fn set_mic_enabled(&self, enabled: bool) -> bool {
        let (reply_tx, reply_rx) = oneshot::channel();
        let sent = self
            .command_tx
            .send(SessionCommand::SetMicEnabled {
                enabled,
                reply: reply_tx,
            })
            .await
            .is_ok();

        if sent {
            reply_rx.await.unwrap_or_else(|_| self.mic_enabled())
        } else {
            self.mic_enabled()
        }
    }

    /// Returns the new state once the session has applied it.
    pub async fn set_speaker_enabled(&self, enabled: bool) -> bool {
        let (reply_tx, reply_rx) = oneshot::channel();
        let sent = self
            .command_tx
            .send(SessionCommand::SetSpeakerEnabled {
                enabled,
                reply: reply_tx,
            })
            .await
            .is_ok();

        if sent {
            reply_rx.await.unwrap_or_else(|_| self.speaker_enabled())
        } else {
            self.speaker_enabled()
        }
    }

    pub fn mic_enabled(&self) -> bool {
        self.mic_enabled.load(Ordering::SeqCst)
    }

    pub fn speaker_enabled(&self) -> bool {
        self.speaker_enabled.load(Ordering::SeqCst)
    }

    /// Leave the room: close every peer connection, delete presence, release
    /// the capture device. Returns once teardown has finished.
    pub async fn leave(self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .command_tx
            .send(SessionCommand::Leave { reply: reply_tx })
            .await
            .is_ok()
        {
            let _ = reply_rx.await;
        }
    }
}

impl Drop for VoiceHandle {
    fn drop(&mut self) {
        let (reply_tx, _reply_rx) = oneshot::channel();
        if self
            .command_tx
            .try_send(SessionCommand::Leave { reply: reply_tx })
            .is_ok()
        {
            debug!("Voice handle dropped, leave requested");
        }
    }
}
