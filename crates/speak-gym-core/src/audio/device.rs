//! Microphone and speaker access through CPAL.

use crate::{
    audio::{
        AudioInput, AudioOutput, CaptureStream, ChunkEncoding, Clip, DeviceHandle, wav,
    },
    {CoreError, CoreResult},
};

use std::{
    panic::Location,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use cpal::{
    BufferSize, BuildStreamError, Stream, StreamConfig,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use error_location::ErrorLocation;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, instrument};

/// Extra time allowed past a clip's nominal length before playback is
/// treated as stalled.
const PLAYBACK_GRACE: Duration = Duration::from_secs(2);

/// Default system microphone.
#[derive(Debug, Default)]
pub struct CpalInput;

impl CpalInput {
    /// Create a handle to the default input device.
    pub fn new() -> Self {
        Self
    }
}

struct CpalCapture {
    stream: Option<Stream>,
    /// Signals the audio callback to stop writing. Set before the stream is
    /// dropped so no chunk is sent after release.
    shutdown: Arc<AtomicBool>,
}

impl DeviceHandle for CpalCapture {
    fn release(&mut self) -> CoreResult<()> {
        self.shutdown.store(true, Ordering::Release);
        if let Some(stream) = self.stream.take() {
            drop(stream);
            info!("Audio capture stopped");
        }
        Ok(())
    }
}

#[async_trait]
impl AudioInput for CpalInput {
    #[instrument(skip(self))]
    async fn acquire(&self) -> CoreResult<CaptureStream> {
        open_input()
    }
}

#[track_caller]
fn open_input() -> CoreResult<CaptureStream> {
    let host = cpal::default_host();

    let device = host
        .default_input_device()
        .ok_or(CoreError::DeviceError {
            reason: "No microphone found".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;

    let config: StreamConfig = device
        .default_input_config()
        .map_err(|e| CoreError::DeviceError {
            reason: format!("Failed to get config: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?
        .into();

    let (tx, rx) = mpsc::unbounded_channel();
    let shutdown = Arc::new(AtomicBool::new(false));
    let callback_shutdown = Arc::clone(&shutdown);

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if callback_shutdown.load(Ordering::Acquire) {
                    return;
                }
                let mut bytes = Vec::with_capacity(data.len() * 4);
                for sample in data {
                    bytes.extend_from_slice(&sample.to_le_bytes());
                }
                let _ = tx.send(bytes);
            },
            |err| {
                error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| match e {
            BuildStreamError::DeviceNotAvailable => CoreError::PermissionDenied {
                reason: "Microphone is not available".to_string(),
                location: ErrorLocation::from(Location::caller()),
            },
            other => CoreError::DeviceError {
                reason: format!("Failed to build stream: {}", other),
                location: ErrorLocation::from(Location::caller()),
            },
        })?;

    stream.play().map_err(|e| CoreError::DeviceError {
        reason: format!("Failed to start stream: {}", e),
        location: ErrorLocation::from(Location::caller()),
    })?;

    info!(
        sample_rate = config.sample_rate,
        channels = config.channels,
        "Audio capture started"
    );

    Ok(CaptureStream::new(
        Box::new(CpalCapture {
            stream: Some(stream),
            shutdown,
        }),
        rx,
        ChunkEncoding::PcmF32 {
            sample_rate: config.sample_rate,
            channels: config.channels,
        },
    ))
}

/// Default system speaker. Plays WAV clips.
#[derive(Debug, Default)]
pub struct CpalOutput;

impl CpalOutput {
    /// Create a handle to the default output device.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AudioOutput for CpalOutput {
    #[instrument(skip(self, clip), fields(clip_id = %clip.id()))]
    async fn play(&self, clip: &Clip) -> CoreResult<()> {
        let clip_id = clip.id();
        let failure = |reason: String| CoreError::PlaybackFailure {
            clip_id,
            reason,
            location: ErrorLocation::from(Location::caller()),
        };

        let pcm = wav::decode(clip.bytes()).map_err(|e| failure(e.to_string()))?;
        let nominal = pcm.duration();

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| failure("No output device found".to_string()))?;

        let config = StreamConfig {
            channels: pcm.channels,
            sample_rate: pcm.sample_rate,
            buffer_size: BufferSize::Default,
        };

        let (done_tx, done_rx) = oneshot::channel::<()>();
        let done_tx = Mutex::new(Some(done_tx));
        let samples = pcm.samples;
        let mut position = 0usize;

        let stream = device
            .build_output_stream(
                &config,
                move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in out.iter_mut() {
                        *frame = samples.get(position).copied().unwrap_or(0.0);
                        position += 1;
                    }
                    if position >= samples.len() {
                        let mut guard = done_tx.lock().unwrap_or_else(|e| e.into_inner());
                        if let Some(tx) = guard.take() {
                            let _ = tx.send(());
                        }
                    }
                },
                |err| {
                    error!("Audio output error: {}", err);
                },
                None,
            )
            .map_err(|e| failure(format!("Failed to build output stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| failure(format!("Failed to start output stream: {}", e)))?;

        debug!(duration_ms = nominal.as_millis(), "Clip output started");

        // Dropping this future drops `stream`, which silences the device.
        match tokio::time::timeout(nominal + PLAYBACK_GRACE, done_rx).await {
            Ok(_) => Ok(()),
            Err(_) => Err(failure("Playback stalled".to_string())),
        }
    }
}
