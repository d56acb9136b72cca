use crate::{
    CoreResult, Slot,
    audio::{
        AudioInput, AudioOutput, CaptureEvent, CaptureSlots, Clip, PlaybackEvent, PlaybackQueue,
        SlotState,
    },
    request::{InFlightRequests, RequestTicket},
};

use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

use tokio::sync::{Mutex, broadcast};
use tracing::{error, info, instrument};
use uuid::Uuid;

/// Orchestrates microphone capture, clip playback and in-flight request
/// supersession for the active drills.
///
/// # Locking
///
/// Capture state sits behind an async mutex held only for the device
/// operation itself. Network calls made with a captured clip happen after
/// the lock is released, so a user pressing stop or starting a new drill is
/// never blocked behind a slow collaborator.
pub struct AudioCoordinator {
    capture: Mutex<CaptureSlots>,
    playback: PlaybackQueue,
    in_flight: StdMutex<InFlightRequests>,
}

impl AudioCoordinator {
    /// Create a coordinator over platform input and output.
    ///
    /// Must be called inside a tokio runtime: the playback queue task is
    /// spawned here.
    #[instrument(skip(input, output))]
    pub fn new(input: Arc<dyn AudioInput>, output: Arc<dyn AudioOutput>) -> Self {
        let coordinator = Self {
            capture: Mutex::new(CaptureSlots::new(input)),
            playback: PlaybackQueue::spawn(output),
            in_flight: StdMutex::new(InFlightRequests::new()),
        };

        info!("AudioCoordinator initialized");

        coordinator
    }

    /// Subscribe to capture lifecycle events.
    pub async fn subscribe_capture(&self) -> broadcast::Receiver<CaptureEvent> {
        self.capture.lock().await.subscribe()
    }

    /// Subscribe to playback events.
    pub fn subscribe_playback(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.playback.subscribe()
    }

    /// Recording state of `slot`.
    pub async fn slot_state(&self, slot: Slot) -> SlotState {
        self.capture.lock().await.state(slot)
    }

    /// Slot currently holding the microphone.
    pub async fn active_slot(&self) -> Option<Slot> {
        self.capture.lock().await.active_slot()
    }

    /// Start recording for `slot`; any open capture is released first.
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied` if microphone access is refused.
    pub async fn start_capture(&self, slot: Slot) -> CoreResult<Uuid> {
        self.capture.lock().await.start_capture(slot).await
    }

    /// Stop recording for `slot`; `None` when nothing was captured.
    pub async fn stop_capture(&self, slot: Slot) -> CoreResult<Option<Clip>> {
        let mut capture = self.capture.lock().await;
        capture.poll_chunks();
        capture.stop_capture(slot)
    }

    /// Queue a clip for sequential playback.
    pub fn enqueue_playback(&self, clip: Clip) -> CoreResult<()> {
        self.playback.enqueue(clip)
    }

    /// Halt the playing clip and drop the pending queue.
    pub fn stop_all_playback(&self) -> CoreResult<()> {
        self.playback.stop_all()
    }

    /// Cancel the slot's outstanding feedback request and issue a new ticket.
    pub fn supersede_in_flight(&self, slot: Slot) -> RequestTicket {
        self.requests().supersede(slot)
    }

    /// Cancel the slot's outstanding feedback request without replacing it.
    pub fn cancel_in_flight(&self, slot: Slot) {
        self.requests().cancel(slot);
    }

    /// Whether `ticket` is still the newest live request for its slot.
    pub fn is_current(&self, ticket: &RequestTicket) -> bool {
        self.requests().is_current(ticket)
    }

    /// Release the microphone and stop the playback task.
    pub async fn shutdown(self) {
        let mut capture = self.capture.into_inner();
        if let Some(slot) = capture.active_slot() {
            if let Err(e) = capture.stop_capture(slot) {
                error!(slot = %slot, error = ?e, "Failed to release capture on shutdown");
            }
        }
        self.playback.shutdown().await;
        info!("AudioCoordinator shut down");
    }

    fn requests(&self) -> MutexGuard<'_, InFlightRequests> {
        // The registry holds plain data; a poisoned lock is still usable.
        self.in_flight.lock().unwrap_or_else(|e| {
            error!("Request registry lock poisoned, recovering: {}", e);
            e.into_inner()
        })
    }
}
