use crate::error::DeviceError;
use crate::media::{CaptureConfig, CaptureSource, CaptureStream};
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use webrtc::api::media_engine::MIME_TYPE_OPUS;
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Owns the capture device and the single outbound audio track every peer
/// connection shares. Muting gates the encoder input; the track keeps
/// flowing as silence, so no renegotiation ever happens.
pub struct MediaController {
    source: Arc<dyn CaptureSource>,
    config: CaptureConfig,
    track: Arc<TrackLocalStaticSample>,
    mic_enabled: Arc<AtomicBool>,
    pump: Option<JoinHandle<()>>,
}

impl MediaController {
    pub fn new(source: Arc<dyn CaptureSource>, config: CaptureConfig) -> Self {
        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: config.sample_rate,
                channels: config.channels,
                sdp_fmtp_line: "minptime=10;useinbandfec=1".to_owned(),
                rtcp_feedback: vec![],
            },
            "audio".to_owned(),
            "voicemesh".to_owned(),
        ));

        Self {
            source,
            config,
            track,
            mic_enabled: Arc::new(AtomicBool::new(true)),
            pump: None,
        }
    }

    /// The outbound track. One shared instance, never duplicated per peer.
    pub fn local_track(&self) -> Arc<TrackLocalStaticSample> {
        Arc::clone(&self.track)
    }

    /// Open the capture device and start encoding into the local track.
    /// Called once per join; repeat calls are no-ops.
    pub fn acquire(&mut self) -> Result<(), DeviceError> {
        if self.pump.is_some() {
            return Ok(());
        }

        let stream = self.source.acquire(&self.config)?;
        let config = self.config.clone();
        let track = Arc::clone(&self.track);
        let mic_enabled = Arc::clone(&self.mic_enabled);

        self.pump = Some(tokio::spawn(encode_pump(
            stream,
            config,
            track,
            mic_enabled,
        )));
        Ok(())
    }

    /// Toggle the capture gate. Returns the new state.
    pub fn set_mic_enabled(&self, enabled: bool) -> bool {
        self.mic_enabled.store(enabled, Ordering::SeqCst);
        enabled
    }

    pub fn mic_enabled(&self) -> bool {
        self.mic_enabled.load(Ordering::SeqCst)
    }

    pub(crate) fn mic_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.mic_enabled)
    }

    /// Stop capture and free the device. Safe to call repeatedly.
    pub fn release(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
            debug!("Capture released");
        }
    }
}

impl Drop for MediaController {
    fn drop(&mut self) {
        self.release();
    }
}

async fn encode_pump(
    mut stream: CaptureStream,
    config: CaptureConfig,
    track: Arc<TrackLocalStaticSample>,
    mic_enabled: Arc<AtomicBool>,
) {
    let channels = match config.channels {
        2 => opus::Channels::Stereo,
        _ => opus::Channels::Mono,
    };
    let mut encoder =
        match opus::Encoder::new(config.sample_rate, channels, opus::Application::Voip) {
            Ok(encoder) => encoder,
            Err(e) => {
                warn!("Opus encoder unavailable, outbound audio disabled: {}", e);
                return;
            }
        };

    let duration = Duration::from_millis(config.frame_ms as u64);
    let silence = vec![0.0f32; config.samples_per_frame()];
    let mut packet = vec![0u8; 4000];

    while let Some(frame) = stream.next_frame().await {
        let pcm = if mic_enabled.load(Ordering::SeqCst) {
            &frame[..]
        } else {
            &silence[..]
        };

        match encoder.encode_float(pcm, &mut packet) {
            Ok(len) => {
                let sample = Sample {
                    data: Bytes::copy_from_slice(&packet[..len]),
                    duration,
                    ..Default::default()
                };
                if let Err(e) = track.write_sample(&sample).await {
                    debug!("Local track write failed: {}", e);
                }
            }
            Err(e) => warn!("Opus encode failed: {}", e),
        }
    }

    debug!("Capture frames ended, encoder pump stopping");
}
