use crate::{
    Slot,
    audio::{Clip, WAV_MIME, wav},
    {CoreError, CoreResult},
};

use std::{collections::VecDeque, panic::Location, sync::Arc, time::Instant};

use async_trait::async_trait;
use error_location::ErrorLocation;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Maximum buffered bytes per capture (5 minutes of 48kHz mono f32).
///
/// PCM captures drop their oldest whole frames beyond this. Container
/// captures keep their head (it carries the header) and stop buffering.
pub(crate) const MAX_CAPTURE_BYTES: usize = 48_000 * 60 * 5 * 4;

/// How the chunks of a capture stream combine into one clip.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkEncoding {
    /// Chunks are slices of one container file; concatenation is the clip.
    Container {
        /// MIME type of the container, e.g. `audio/webm`.
        mime: String,
    },
    /// Chunks are little-endian `f32` PCM; the clip is a WAV file.
    PcmF32 {
        /// Frames per second.
        sample_rate: u32,
        /// Interleaved channel count.
        channels: u16,
    },
}

/// Exclusive handle to the physical microphone.
pub trait DeviceHandle: Send {
    /// Stop capturing and give the device back. Called exactly once.
    fn release(&mut self) -> CoreResult<()>;
}

/// An open microphone stream: the device handle plus its chunk channel.
pub struct CaptureStream {
    device: Box<dyn DeviceHandle>,
    chunks: mpsc::UnboundedReceiver<Vec<u8>>,
    encoding: ChunkEncoding,
}

impl CaptureStream {
    /// Bundle a device handle with the receiver its callback writes chunks to.
    pub fn new(
        device: Box<dyn DeviceHandle>,
        chunks: mpsc::UnboundedReceiver<Vec<u8>>,
        encoding: ChunkEncoding,
    ) -> Self {
        Self {
            device,
            chunks,
            encoding,
        }
    }
}

/// Platform microphone access.
#[async_trait]
pub trait AudioInput: Send + Sync {
    /// Request microphone access and start streaming chunks.
    ///
    /// # Errors
    ///
    /// [`CoreError::PermissionDenied`] when the user or platform refuses access.
    async fn acquire(&self) -> CoreResult<CaptureStream>;
}

/// Recording state of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Not currently recording.
    Idle,
    /// Currently recording audio.
    Recording {
        /// When recording started.
        started_at: Instant,
        /// Unique session ID for log correlation.
        session_id: Uuid,
    },
}

/// Capture lifecycle notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    /// A capture session opened.
    Started {
        /// Slot now recording.
        slot: Slot,
        /// Session id.
        session_id: Uuid,
    },
    /// A capture session was force-stopped by a newer one; its audio is discarded.
    Replaced {
        /// Slot whose session was replaced.
        slot: Slot,
        /// Replaced session id.
        session_id: Uuid,
    },
    /// Capture stopped with no audio; nothing is handed downstream.
    Empty {
        /// Slot that stopped.
        slot: Slot,
        /// Session id.
        session_id: Uuid,
    },
    /// Capture stopped and produced a clip.
    Completed {
        /// Slot that stopped.
        slot: Slot,
        /// Session id.
        session_id: Uuid,
        /// Clip size in bytes.
        bytes: usize,
    },
}

struct ActiveCapture {
    slot: Slot,
    session_id: Uuid,
    started_at: Instant,
    stream: CaptureStream,
    chunks: VecDeque<Vec<u8>>,
    buffered: usize,
    overflowed: bool,
}

impl ActiveCapture {
    fn drain(&mut self) {
        while let Ok(chunk) = self.stream.chunks.try_recv() {
            if chunk.is_empty() {
                continue;
            }
            match self.stream.encoding {
                ChunkEncoding::Container { .. } => {
                    if self.buffered >= MAX_CAPTURE_BYTES {
                        self.note_overflow();
                        continue;
                    }
                    self.buffered += chunk.len();
                    self.chunks.push_back(chunk);
                }
                ChunkEncoding::PcmF32 { channels, .. } => {
                    self.buffered += chunk.len();
                    self.chunks.push_back(chunk);
                    if self.buffered > MAX_CAPTURE_BYTES {
                        self.note_overflow();
                        let frame = 4 * usize::from(channels.max(1));
                        let excess = (self.buffered - MAX_CAPTURE_BYTES).div_ceil(frame) * frame;
                        self.trim_front(excess);
                    }
                }
            }
        }
    }

    /// Drop `count` bytes from the start of the buffer.
    fn trim_front(&mut self, mut count: usize) {
        while count > 0 {
            let Some(front) = self.chunks.front_mut() else {
                break;
            };
            if front.len() <= count {
                count -= front.len();
                self.buffered -= front.len();
                self.chunks.pop_front();
            } else {
                front.drain(..count);
                self.buffered -= count;
                count = 0;
            }
        }
    }

    fn note_overflow(&mut self) {
        if !self.overflowed {
            self.overflowed = true;
            warn!(
                slot = %self.slot,
                session_id = %self.session_id,
                max_bytes = MAX_CAPTURE_BYTES,
                "Capture buffer full"
            );
        }
    }

    /// Release the device, then collect whatever the callback flushed.
    fn finish(mut self) -> CoreResult<(VecDeque<Vec<u8>>, usize, ChunkEncoding)> {
        let released = self.stream.device.release();
        self.drain();
        released?;
        Ok((self.chunks, self.buffered, self.stream.encoding))
    }
}

/// Owns microphone capture for every drill slot.
///
/// There is one physical microphone, so at most one session is open across
/// all slots. Starting a capture while another is open force-replaces it:
/// the old device handle is released and its audio discarded before the new
/// handle is acquired.
pub struct CaptureSlots {
    input: Arc<dyn AudioInput>,
    active: Option<ActiveCapture>,
    events: broadcast::Sender<CaptureEvent>,
}

impl CaptureSlots {
    /// Create the capture coordinator over a platform input.
    pub fn new(input: Arc<dyn AudioInput>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            input,
            active: None,
            events,
        }
    }

    /// Subscribe to capture lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.events.subscribe()
    }

    /// Recording state of `slot`.
    pub fn state(&self, slot: Slot) -> SlotState {
        match &self.active {
            Some(active) if active.slot == slot => SlotState::Recording {
                started_at: active.started_at,
                session_id: active.session_id,
            },
            _ => SlotState::Idle,
        }
    }

    /// Slot currently holding the microphone.
    pub fn active_slot(&self) -> Option<Slot> {
        self.active.as_ref().map(|a| a.slot)
    }

    /// Start capturing for `slot`, replacing any open session.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::PermissionDenied`] without retrying if access is
    /// refused; the slot stays idle. If the replaced capture's device fails
    /// to release, that error is returned and nothing new is acquired.
    #[instrument(skip(self))]
    pub async fn start_capture(&mut self, slot: Slot) -> CoreResult<Uuid> {
        if let Some(previous) = self.active.take() {
            let (prev_slot, prev_id) = (previous.slot, previous.session_id);
            let released = previous.finish();
            let _ = self.events.send(CaptureEvent::Replaced {
                slot: prev_slot,
                session_id: prev_id,
            });
            match released {
                Ok((_, discarded, _)) => warn!(
                    slot = %prev_slot,
                    session_id = %prev_id,
                    discarded_bytes = discarded,
                    "Open capture replaced"
                ),
                Err(e) => {
                    error!(
                        slot = %prev_slot,
                        session_id = %prev_id,
                        error = ?e,
                        "Failed to release replaced capture"
                    );
                    return Err(e);
                }
            }
        }

        let stream = self.input.acquire().await?;
        let session_id = Uuid::new_v4();

        self.active = Some(ActiveCapture {
            slot,
            session_id,
            started_at: Instant::now(),
            stream,
            chunks: VecDeque::new(),
            buffered: 0,
            overflowed: false,
        });

        let _ = self.events.send(CaptureEvent::Started { slot, session_id });
        info!(slot = %slot, session_id = %session_id, "Capture started");

        Ok(session_id)
    }

    /// Move chunks the device has delivered so far into the session buffer.
    pub fn poll_chunks(&mut self) {
        if let Some(active) = self.active.as_mut() {
            active.drain();
        }
    }

    /// Stop capturing for `slot` and assemble the buffered chunks.
    ///
    /// Returns `Ok(None)` when `slot` is not recording or nothing was
    /// captured; neither is an error and no clip is handed downstream.
    #[track_caller]
    #[instrument(skip(self))]
    pub fn stop_capture(&mut self, slot: Slot) -> CoreResult<Option<Clip>> {
        let active = match self.active.take() {
            Some(active) if active.slot == slot => active,
            other => {
                self.active = other;
                debug!(slot = %slot, "Stop requested for idle slot");
                return Ok(None);
            }
        };

        let session_id = active.session_id;
        let duration = active.started_at.elapsed();
        let (chunks, bytes, encoding) = active.finish()?;

        if bytes == 0 {
            let _ = self.events.send(CaptureEvent::Empty { slot, session_id });
            debug!(slot = %slot, session_id = %session_id, "Empty capture ignored");
            return Ok(None);
        }

        let clip = assemble(chunks, bytes, &encoding)?;

        let _ = self.events.send(CaptureEvent::Completed {
            slot,
            session_id,
            bytes: clip.len(),
        });
        info!(
            slot = %slot,
            session_id = %session_id,
            duration_ms = duration.as_millis(),
            clip_bytes = clip.len(),
            "Capture stopped"
        );

        Ok(Some(clip))
    }
}

#[track_caller]
fn assemble(chunks: VecDeque<Vec<u8>>, bytes: usize, encoding: &ChunkEncoding) -> CoreResult<Clip> {
    let mut joined = Vec::with_capacity(bytes);
    for chunk in chunks {
        joined.extend_from_slice(&chunk);
    }

    match encoding {
        ChunkEncoding::Container { mime } => Ok(Clip::new(joined, mime.as_str())),
        ChunkEncoding::PcmF32 {
            sample_rate,
            channels,
        } => {
            if joined.len() % 4 != 0 {
                return Err(CoreError::EncodingError {
                    reason: format!("PCM buffer of {} bytes is not f32-aligned", joined.len()),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
            let samples: Vec<f32> = joined
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect();
            let encoded = wav::encode_f32(&samples, *sample_rate, *channels)?;
            Ok(Clip::new(encoded, WAV_MIME))
        }
    }
}
