//! File-backed audio for machines without a sound card.
//!
//! `WavFileInput` plays a WAV file into the microphone path on every
//! recording; `WavDirOutput` writes each tutor clip to a directory and waits
//! out its duration so the playback queue keeps real timing.

use speak_gym_core::{
    CoreError, CoreResult,
    audio::{
        AudioInput, AudioOutput, CaptureStream, ChunkEncoding, Clip, DeviceHandle, WAV_MIME,
    },
};

use std::{fs, panic::Location, path::PathBuf};

use async_trait::async_trait;
use error_location::ErrorLocation;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument};

/// Microphone stand-in that replays a WAV file.
#[derive(Debug, Clone)]
pub struct WavFileInput {
    path: Option<PathBuf>,
}

impl WavFileInput {
    /// Replay `path` on every acquisition; `None` behaves like a refused microphone.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

struct FileDevice {
    path: PathBuf,
}

impl DeviceHandle for FileDevice {
    fn release(&mut self) -> CoreResult<()> {
        debug!(path = ?self.path, "File input released");
        Ok(())
    }
}

#[async_trait]
impl AudioInput for WavFileInput {
    #[instrument(skip(self))]
    async fn acquire(&self) -> CoreResult<CaptureStream> {
        let path = self.path.clone().ok_or_else(|| CoreError::PermissionDenied {
            reason: "no input device; set audio.input_file in the config".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let bytes = fs::read(&path).map_err(|e| CoreError::DeviceError {
            reason: format!("Failed to read {:?}: {}", path, e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(bytes).map_err(|_| CoreError::ChannelClosed {
            reason: "capture receiver dropped".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;

        Ok(CaptureStream::new(
            Box::new(FileDevice { path }),
            rx,
            ChunkEncoding::Container {
                mime: WAV_MIME.to_string(),
            },
        ))
    }
}

/// Speaker stand-in that saves clips to a directory.
#[derive(Debug, Clone)]
pub struct WavDirOutput {
    dir: PathBuf,
}

impl WavDirOutput {
    /// Write clips under `dir`, creating it on first use.
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

#[async_trait]
impl AudioOutput for WavDirOutput {
    #[instrument(skip(self, clip), fields(clip_id = %clip.id()))]
    async fn play(&self, clip: &Clip) -> CoreResult<()> {
        let playback_failure = |reason: String| CoreError::PlaybackFailure {
            clip_id: clip.id(),
            reason,
            location: ErrorLocation::from(Location::caller()),
        };

        fs::create_dir_all(&self.dir)
            .map_err(|e| playback_failure(format!("Failed to create {:?}: {}", self.dir, e)))?;

        let extension = clip
            .file_name()
            .rsplit('.')
            .next()
            .unwrap_or("bin")
            .to_string();
        let path = self.dir.join(format!("{}.{}", clip.id(), extension));
        fs::write(&path, clip.bytes())
            .map_err(|e| playback_failure(format!("Failed to write {:?}: {}", path, e)))?;

        let duration = clip.duration().unwrap_or_default();
        info!(path = ?path, duration_ms = duration.as_millis(), "Clip written");

        tokio::time::sleep(duration).await;
        Ok(())
    }
}
