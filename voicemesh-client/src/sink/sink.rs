use crate::sink::PlaybackBackend;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use voicemesh_core::ParticipantId;
use webrtc::track::track_remote::TrackRemote;

/// Routes each peer's inbound audio to playback. A global speaker gate
/// silences every binding at once; newly bound peers inherit it.
pub struct AudioOutputSink {
    backend: Arc<dyn PlaybackBackend>,
    speaker_enabled: Arc<AtomicBool>,
    bindings: HashMap<ParticipantId, JoinHandle<()>>,
}

impl AudioOutputSink {
    pub fn new(backend: Arc<dyn PlaybackBackend>) -> Self {
        Self {
            backend,
            speaker_enabled: Arc::new(AtomicBool::new(true)),
            bindings: HashMap::new(),
        }
    }

    /// Attach a peer's track for playback, replacing any previous binding
    /// for the same uid.
    pub fn bind(&mut self, uid: ParticipantId, track: Arc<TrackRemote>) {
        self.unbind(&uid);

        let backend = Arc::clone(&self.backend);
        let speaker = Arc::clone(&self.speaker_enabled);
        let task_uid = uid.clone();
        let task = tokio::spawn(play_track(task_uid, track, backend, speaker));

        self.bindings.insert(uid, task);
    }

    /// Stop and remove playback for a peer. No-op when not bound.
    pub fn unbind(&mut self, uid: &ParticipantId) {
        if let Some(task) = self.bindings.remove(uid) {
            task.abort();
            self.backend.clear(uid);
            debug!("Unbound audio for {}", uid);
        }
    }

    pub fn unbind_all(&mut self) {
        let uids: Vec<ParticipantId> = self.bindings.keys().cloned().collect();
        for uid in uids {
            self.unbind(&uid);
        }
    }

    /// Global speaker gate. Returns the new state.
    pub fn set_speaker_enabled(&self, enabled: bool) -> bool {
        self.speaker_enabled.store(enabled, Ordering::SeqCst);
        enabled
    }

    pub fn speaker_enabled(&self) -> bool {
        self.speaker_enabled.load(Ordering::SeqCst)
    }

    pub(crate) fn speaker_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.speaker_enabled)
    }
}

impl Drop for AudioOutputSink {
    fn drop(&mut self) {
        self.unbind_all();
    }
}

async fn play_track(
    uid: ParticipantId,
    track: Arc<TrackRemote>,
    backend: Arc<dyn PlaybackBackend>,
    speaker: Arc<AtomicBool>,
) {
    let mut decoder = match opus::Decoder::new(48_000, opus::Channels::Mono) {
        Ok(decoder) => decoder,
        Err(e) => {
            warn!("Opus decoder unavailable for {}: {}", uid, e);
            return;
        }
    };

    // 120 ms of headroom, the largest Opus frame.
    let mut pcm = vec![0.0f32; 5760];

    loop {
        let (packet, _attributes) = match track.read_rtp().await {
            Ok(read) => read,
            Err(e) => {
                debug!("Remote track for {} ended: {}", uid, e);
                break;
            }
        };

        if packet.payload.is_empty() {
            continue;
        }

        match decoder.decode_float(&packet.payload, &mut pcm, false) {
            Ok(samples) => {
                if speaker.load(Ordering::SeqCst) {
                    backend.write(&uid, &pcm[..samples]);
                }
            }
            Err(e) => debug!("Opus decode failed for {}: {}", uid, e),
        }
    }
}
