pub(crate) mod capture;
mod clip;
#[cfg(feature = "cpal-backend")]
mod device;
mod manager;
mod playback;
pub mod wav;

pub use {
    capture::{AudioInput, CaptureEvent, CaptureSlots, CaptureStream, ChunkEncoding, DeviceHandle, SlotState},
    clip::{Clip, WAV_MIME},
    manager::AudioCoordinator,
    playback::{AudioOutput, PlaybackEvent, PlaybackQueue},
};

#[cfg(feature = "cpal-backend")]
pub use device::{CpalInput, CpalOutput};
