use crate::{
    CoreError, CoreResult, Slot,
    audio::{
        AudioInput, CaptureEvent, CaptureSlots, CaptureStream, ChunkEncoding, DeviceHandle,
        SlotState, WAV_MIME, capture::MAX_CAPTURE_BYTES, wav,
    },
    tests::support::{FakeInput, WEBM_MIME},
};

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// WHAT: Refused microphone access surfaces PermissionDenied
/// WHY: The attempt must end without retrying and without holding a device
#[tokio::test]
async fn given_permission_denied_when_starting_capture_then_slot_stays_idle() {
    // Given: A microphone that refuses access
    let input = FakeInput::new();
    input.deny();
    let mut slots = CaptureSlots::new(input.clone());

    // When: Starting a capture
    let result = slots.start_capture(Slot::Shadow).await;

    // Then: PermissionDenied, slot idle, no device held
    assert!(matches!(result, Err(CoreError::PermissionDenied { .. })));
    assert_eq!(slots.state(Slot::Shadow), SlotState::Idle);
    assert_eq!(slots.active_slot(), None);
    assert_eq!(input.live(), 0);
}

/// WHAT: Stopping assembles buffered chunks into one clip in arrival order
/// WHY: The transcriber expects a single well-formed upload
#[tokio::test]
async fn given_recorded_chunks_when_stopping_then_clip_is_their_concatenation() {
    // Given: A capture that receives three chunks
    let input = FakeInput::new();
    input.script(vec![vec![1, 2], vec![3], vec![4, 5, 6]]);
    let mut slots = CaptureSlots::new(input.clone());
    slots.start_capture(Slot::Expansion).await.unwrap();

    // When: Stopping the capture
    let clip = slots.stop_capture(Slot::Expansion).unwrap().unwrap();

    // Then: Bytes are concatenated, MIME kept, device released, slot idle
    assert_eq!(clip.bytes(), &[1, 2, 3, 4, 5, 6]);
    assert_eq!(clip.mime(), WEBM_MIME);
    assert_eq!(clip.file_name(), "recording.webm");
    assert_eq!(input.live(), 0);
    assert_eq!(slots.state(Slot::Expansion), SlotState::Idle);
}

/// WHAT: A capture with zero bytes yields no clip and no error
/// WHY: An empty recording must not trigger transcription
#[tokio::test]
async fn given_no_audio_when_stopping_then_none_and_empty_event() {
    // Given: A capture that never receives audio
    let input = FakeInput::new();
    input.script(vec![Vec::new()]);
    let mut slots = CaptureSlots::new(input.clone());
    let mut events = slots.subscribe();
    let session_id = slots.start_capture(Slot::Shadow).await.unwrap();

    // When: Stopping the capture
    let result = slots.stop_capture(Slot::Shadow);

    // Then: Ok(None), Empty event emitted, device released
    assert!(matches!(result, Ok(None)));
    assert_eq!(
        events.try_recv().unwrap(),
        CaptureEvent::Started {
            slot: Slot::Shadow,
            session_id
        }
    );
    assert_eq!(
        events.try_recv().unwrap(),
        CaptureEvent::Empty {
            slot: Slot::Shadow,
            session_id
        }
    );
    assert_eq!(input.live(), 0);
}

/// WHAT: Stopping a slot that is not recording is a no-op
/// WHY: A stray stop must not disturb another slot's capture
#[tokio::test]
async fn given_other_slot_recording_when_stopping_idle_slot_then_noop() {
    // Given: Review is recording
    let input = FakeInput::new();
    input.script(vec![vec![9; 8]]);
    let mut slots = CaptureSlots::new(input.clone());
    slots.start_capture(Slot::Review).await.unwrap();

    // When: Stopping the idle shadow slot
    let result = slots.stop_capture(Slot::Shadow).unwrap();

    // Then: Nothing returned and review still recording
    assert!(result.is_none());
    assert_eq!(slots.active_slot(), Some(Slot::Review));
    assert_eq!(input.live(), 1);
}

/// WHAT: Starting a capture while another is open force-replaces it
/// WHY: There is one microphone; a leaked handle would keep it busy
#[tokio::test]
async fn given_open_capture_when_starting_another_slot_then_previous_released() {
    // Given: Shadow is recording with some audio
    let input = FakeInput::new();
    input.script(vec![vec![1; 4]]);
    input.script(vec![vec![2; 4]]);
    let mut slots = CaptureSlots::new(input.clone());
    let mut events = slots.subscribe();
    let first = slots.start_capture(Slot::Shadow).await.unwrap();
    slots.poll_chunks();

    // When: Substitution starts recording
    let second = slots.start_capture(Slot::Substitution).await.unwrap();

    // Then: Shadow was replaced, only one device is live
    assert_eq!(input.acquisitions(), 2);
    assert_eq!(input.live(), 1);
    assert_eq!(slots.state(Slot::Shadow), SlotState::Idle);
    assert!(matches!(
        slots.state(Slot::Substitution),
        SlotState::Recording { session_id, .. } if session_id == second
    ));

    let _ = events.try_recv();
    assert_eq!(
        events.try_recv().unwrap(),
        CaptureEvent::Replaced {
            slot: Slot::Shadow,
            session_id: first
        }
    );
}

/// WHAT: Restarting the same slot discards the earlier session's audio
/// WHY: The new attempt's clip must contain only the new attempt
#[tokio::test]
async fn given_open_capture_when_restarting_same_slot_then_old_chunks_discarded() {
    // Given: A shadow capture with old audio
    let input = FakeInput::new();
    input.script(vec![vec![7; 3]]);
    input.script(vec![vec![8; 2]]);
    let mut slots = CaptureSlots::new(input.clone());
    slots.start_capture(Slot::Shadow).await.unwrap();

    // When: Restarting and stopping the slot
    slots.start_capture(Slot::Shadow).await.unwrap();
    let clip = slots.stop_capture(Slot::Shadow).unwrap().unwrap();

    // Then: Only the new audio remains
    assert_eq!(clip.bytes(), &[8, 8]);
    assert_eq!(input.live(), 0);
}

struct PcmDevice;

impl DeviceHandle for PcmDevice {
    fn release(&mut self) -> CoreResult<()> {
        Ok(())
    }
}

struct PcmInput {
    samples: Vec<f32>,
}

#[async_trait]
impl AudioInput for PcmInput {
    async fn acquire(&self) -> CoreResult<CaptureStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        let bytes: Vec<u8> = self.samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        tx.send(bytes).unwrap();
        Ok(CaptureStream::new(
            Box::new(PcmDevice),
            rx,
            ChunkEncoding::PcmF32 {
                sample_rate: 16_000,
                channels: 1,
            },
        ))
    }
}

/// WHAT: Raw f32 PCM chunks are wrapped into a WAV clip
/// WHY: Native capture delivers samples, but the transcriber takes files
#[tokio::test]
async fn given_pcm_capture_when_stopping_then_clip_is_wav() {
    // Given: A device delivering 1600 samples at 16kHz
    let input = Arc::new(PcmInput {
        samples: vec![0.25; 1_600],
    });
    let mut slots = CaptureSlots::new(input);
    slots.start_capture(Slot::Shadow).await.unwrap();

    // When: Stopping the capture
    let clip = slots.stop_capture(Slot::Shadow).unwrap().unwrap();

    // Then: A 100ms WAV clip
    assert_eq!(clip.mime(), WAV_MIME);
    let pcm = wav::decode(clip.bytes()).unwrap();
    assert_eq!(pcm.samples.len(), 1_600);
    assert_eq!(pcm.sample_rate, 16_000);
    assert_eq!(clip.duration().unwrap().as_millis(), 100);
}

/// WHAT: A container capture past the buffer cap keeps its head
/// WHY: The container header lives in the first chunk; without it the clip cannot be decoded
#[tokio::test]
async fn given_container_capture_past_cap_when_stopping_then_header_kept() {
    // Given: A header chunk, a body that fills the cap, and a late tail
    let header = vec![0x1A, 0x45, 0xDF, 0xA3];
    let input = FakeInput::new();
    input.script(vec![header.clone(), vec![0; MAX_CAPTURE_BYTES], vec![9; 16]]);
    let mut slots = CaptureSlots::new(input.clone());
    slots.start_capture(Slot::Shadow).await.unwrap();

    // When: Stopping the capture
    let clip = slots.stop_capture(Slot::Shadow).unwrap().unwrap();

    // Then: The clip opens with the header and the tail past the cap is gone
    assert!(clip.bytes().starts_with(&header));
    assert_eq!(clip.bytes().len(), header.len() + MAX_CAPTURE_BYTES);
    assert_eq!(input.live(), 0);
}

struct ChunkedPcmInput {
    chunks: Vec<Vec<u8>>,
    channels: u16,
}

#[async_trait]
impl AudioInput for ChunkedPcmInput {
    async fn acquire(&self) -> CoreResult<CaptureStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        for chunk in &self.chunks {
            tx.send(chunk.clone()).unwrap();
        }
        Ok(CaptureStream::new(
            Box::new(PcmDevice),
            rx,
            ChunkEncoding::PcmF32 {
                sample_rate: 48_000,
                channels: self.channels,
            },
        ))
    }
}

fn f32_bytes(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// WHAT: A PCM capture past the cap drops whole frames from the front
/// WHY: Trimming on chunk boundaries would swap the stereo channels of everything kept
#[tokio::test]
async fn given_stereo_pcm_past_cap_when_stopping_then_trimmed_to_whole_frames() {
    // Given: A stereo capture one frame over the cap, with a chunk of one and a half frames
    let mut body = vec![0.0_f32; MAX_CAPTURE_BYTES / 4 - 1];
    body[0] = -0.5;
    let input = Arc::new(ChunkedPcmInput {
        chunks: vec![f32_bytes(&[-1.0, -1.0, 0.5]), f32_bytes(&body)],
        channels: 2,
    });
    let mut slots = CaptureSlots::new(input);
    slots.start_capture(Slot::Review).await.unwrap();

    // When: Stopping the capture
    let clip = slots.stop_capture(Slot::Review).unwrap().unwrap();

    // Then: Exactly the first frame was dropped, so the kept audio starts on a frame
    let pcm = wav::decode(clip.bytes()).unwrap();
    assert_eq!(pcm.channels, 2);
    assert_eq!(pcm.samples.len(), MAX_CAPTURE_BYTES / 4);
    assert!(pcm.samples[0] > 0.4);
    assert!(pcm.samples[1] < -0.4);
}

/// WHAT: A replaced capture that will not release fails the new start
/// WHY: Acquiring again while the old handle is still held would open the microphone twice
#[tokio::test]
async fn given_stuck_device_when_replacing_capture_then_device_error_and_no_new_acquire() {
    // Given: Shadow is recording on a device that will not release
    let input = FakeInput::new();
    input.script(vec![vec![1; 4]]);
    let mut slots = CaptureSlots::new(input.clone());
    let mut events = slots.subscribe();
    let first = slots.start_capture(Slot::Shadow).await.unwrap();
    input.jam();

    // When: Substitution starts recording
    let result = slots.start_capture(Slot::Substitution).await;

    // Then: DeviceError, nothing acquired, every slot idle, replacement still announced
    assert!(matches!(result, Err(CoreError::DeviceError { .. })));
    assert_eq!(input.acquisitions(), 1);
    assert_eq!(slots.active_slot(), None);
    assert_eq!(slots.state(Slot::Substitution), SlotState::Idle);

    let _ = events.try_recv();
    assert_eq!(
        events.try_recv().unwrap(),
        CaptureEvent::Replaced {
            slot: Slot::Shadow,
            session_id: first
        }
    );
    assert!(events.try_recv().is_err());
}
