use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use voicemesh_core::ParticipantId;

/// Where decoded peer audio goes. One backend serves every bound peer;
/// implementations mix internally.
pub trait PlaybackBackend: Send + Sync + 'static {
    /// Queue decoded mono f32 samples for a peer.
    fn write(&self, uid: &ParticipantId, samples: &[f32]);

    /// Drop any queued audio for a peer.
    fn clear(&self, uid: &ParticipantId);
}

/// Discards everything. For tests and headless demos.
#[derive(Default)]
pub struct NullPlayback;

impl PlaybackBackend for NullPlayback {
    fn write(&self, _uid: &ParticipantId, _samples: &[f32]) {}

    fn clear(&self, _uid: &ParticipantId) {}
}

type PeerQueues = Arc<Mutex<HashMap<ParticipantId, VecDeque<f32>>>>;

/// Cap per-peer buffering at two seconds of audio; beyond that the peer is
/// ahead of playback and old samples are dropped.
const MAX_QUEUED_SAMPLES: usize = 48_000 * 2;

/// Default output device via cpal. Per-peer queues are summed in the output
/// callback. The `cpal::Stream` is not `Send`, so a dedicated thread owns
/// it, same as capture.
pub struct CpalPlayback {
    queues: PeerQueues,
    _stop: std::sync::mpsc::Sender<()>,
}

impl CpalPlayback {
    /// Open the default output device. `None` when no usable device exists;
    /// callers fall back to [`NullPlayback`].
    pub fn open(sample_rate: u32, channels: u16) -> Option<Self> {
        let queues: PeerQueues = Arc::new(Mutex::new(HashMap::new()));
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();

        let thread_queues = Arc::clone(&queues);
        std::thread::spawn(move || {
            playback_thread(sample_rate, channels, thread_queues, ready_tx, stop_rx)
        });

        match ready_rx.recv() {
            Ok(true) => Some(Self {
                queues,
                _stop: stop_tx,
            }),
            _ => None,
        }
    }
}

impl PlaybackBackend for CpalPlayback {
    fn write(&self, uid: &ParticipantId, samples: &[f32]) {
        let Ok(mut queues) = self.queues.lock() else {
            return;
        };
        let queue = queues.entry(uid.clone()).or_default();
        queue.extend(samples.iter().copied());
        while queue.len() > MAX_QUEUED_SAMPLES {
            queue.pop_front();
        }
    }

    fn clear(&self, uid: &ParticipantId) {
        if let Ok(mut queues) = self.queues.lock() {
            queues.remove(uid);
        }
    }
}

fn playback_thread(
    sample_rate: u32,
    channels: u16,
    queues: PeerQueues,
    ready_tx: std::sync::mpsc::Sender<bool>,
    stop_rx: std::sync::mpsc::Receiver<()>,
) {
    let host = cpal::default_host();
    let Some(device) = host.default_output_device() else {
        debug!("No output device available");
        let _ = ready_tx.send(false);
        return;
    };

    let stream_config = cpal::StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let callback_queues = Arc::clone(&queues);
    let stream = device.build_output_stream(
        &stream_config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            let Ok(mut queues) = callback_queues.lock() else {
                data.fill(0.0);
                return;
            };
            for sample in data.iter_mut() {
                let mut mixed = 0.0f32;
                for queue in queues.values_mut() {
                    if let Some(s) = queue.pop_front() {
                        mixed += s;
                    }
                }
                *sample = mixed.clamp(-1.0, 1.0);
            }
        },
        |err| warn!("Playback stream error: {}", err),
        None,
    );

    let stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            debug!("Failed to open output stream: {}", e);
            let _ = ready_tx.send(false);
            return;
        }
    };

    if stream.play().is_err() {
        let _ = ready_tx.send(false);
        return;
    }

    let _ = ready_tx.send(true);

    // Park until the owning CpalPlayback is dropped.
    let _ = stop_rx.recv();
    drop(stream);
}
