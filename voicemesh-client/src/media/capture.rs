use crate::error::DeviceError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Capture pipeline parameters. Defaults match the Opus VoIP profile the
/// encoder expects: mono 48 kHz, 20 ms frames.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub frame_ms: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 1,
            frame_ms: 20,
        }
    }
}

impl CaptureConfig {
    pub fn samples_per_frame(&self) -> usize {
        (self.sample_rate as usize / 1000) * self.frame_ms as usize * self.channels as usize
    }
}

/// A running capture: fixed-size frames of f32 PCM. Dropping the stream
/// stops the device.
pub struct CaptureStream {
    frames: mpsc::Receiver<Vec<f32>>,
    _stop: std::sync::mpsc::Sender<()>,
}

impl CaptureStream {
    pub fn new(frames: mpsc::Receiver<Vec<f32>>, stop: std::sync::mpsc::Sender<()>) -> Self {
        Self {
            frames,
            _stop: stop,
        }
    }

    pub async fn next_frame(&mut self) -> Option<Vec<f32>> {
        self.frames.recv().await
    }
}

/// Produces the local audio frames. One acquisition per join; the device is
/// freed when the returned stream is dropped.
pub trait CaptureSource: Send + Sync + 'static {
    fn acquire(&self, config: &CaptureConfig) -> Result<CaptureStream, DeviceError>;
}

/// Default input device via cpal. The `cpal::Stream` is not `Send`, so a
/// dedicated thread owns it and parks until the stream handle is dropped.
pub struct CpalSource;

impl CaptureSource for CpalSource {
    fn acquire(&self, config: &CaptureConfig) -> Result<CaptureStream, DeviceError> {
        let (frame_tx, frames) = mpsc::channel(64);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();
        let config = config.clone();

        std::thread::spawn(move || capture_thread(config, frame_tx, ready_tx, stop_rx));

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(CaptureStream::new(frames, stop_tx)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(DeviceError::Busy),
        }
    }
}

fn capture_thread(
    config: CaptureConfig,
    frame_tx: mpsc::Sender<Vec<f32>>,
    ready_tx: std::sync::mpsc::Sender<Result<(), DeviceError>>,
    stop_rx: std::sync::mpsc::Receiver<()>,
) {
    let stream = match open_input_stream(&config, frame_tx) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        warn!("Failed to start capture stream: {}", e);
        let _ = ready_tx.send(Err(DeviceError::Busy));
        return;
    }

    let _ = ready_tx.send(Ok(()));
    debug!("Capture stream running");

    // Park until the owning CaptureStream is dropped.
    let _ = stop_rx.recv();
    drop(stream);
    debug!("Capture stream stopped");
}

fn open_input_stream(
    config: &CaptureConfig,
    frame_tx: mpsc::Sender<Vec<f32>>,
) -> Result<cpal::Stream, DeviceError> {
    let host = cpal::default_host();
    let device = host.default_input_device().ok_or(DeviceError::NotFound)?;

    let stream_config = cpal::StreamConfig {
        channels: config.channels,
        sample_rate: cpal::SampleRate(config.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let frame_len = config.samples_per_frame();
    let mut pending: Vec<f32> = Vec::with_capacity(frame_len * 2);

    device
        .build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                pending.extend_from_slice(data);
                while pending.len() >= frame_len {
                    let frame: Vec<f32> = pending.drain(..frame_len).collect();
                    // The capture callback must never block; frames are
                    // dropped when the encoder falls behind.
                    let _ = frame_tx.try_send(frame);
                }
            },
            |err| warn!("Capture stream error: {}", err),
            None,
        )
        .map_err(map_build_error)
}

fn map_build_error(err: cpal::BuildStreamError) -> DeviceError {
    match err {
        cpal::BuildStreamError::DeviceNotAvailable => DeviceError::Busy,
        cpal::BuildStreamError::StreamConfigNotSupported
        | cpal::BuildStreamError::InvalidArgument => DeviceError::NotFound,
        cpal::BuildStreamError::BackendSpecific { .. } => DeviceError::PermissionDenied,
        _ => DeviceError::Busy,
    }
}

/// Timed frames of silence. For tests and demos with no microphone.
pub struct SilenceSource;

impl CaptureSource for SilenceSource {
    fn acquire(&self, config: &CaptureConfig) -> Result<CaptureStream, DeviceError> {
        let (frame_tx, frames) = mpsc::channel(64);
        let (stop_tx, _stop_rx) = std::sync::mpsc::channel();
        let frame_len = config.samples_per_frame();
        let period = Duration::from_millis(config.frame_ms as u64);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                if frame_tx.send(vec![0.0; frame_len]).await.is_err() {
                    break;
                }
            }
        });

        Ok(CaptureStream::new(frames, stop_tx))
    }
}
