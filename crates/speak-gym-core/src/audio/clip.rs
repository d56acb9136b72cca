use crate::audio::wav;

use std::{sync::Arc, time::Duration};

use uuid::Uuid;

/// MIME type of clips produced by the synthesizer and the PCM capture path.
pub const WAV_MIME: &str = "audio/wav";

/// A single binary audio unit, either captured or synthesized.
///
/// Cloning is cheap: the bytes are shared.
#[derive(Debug, Clone)]
pub struct Clip {
    id: Uuid,
    bytes: Arc<[u8]>,
    mime: String,
}

impl Clip {
    /// Wrap encoded audio bytes with their MIME type.
    pub fn new(bytes: impl Into<Arc<[u8]>>, mime: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            bytes: bytes.into(),
            mime: mime.into(),
        }
    }

    /// Wrap WAV bytes.
    pub fn wav(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::new(bytes, WAV_MIME)
    }

    /// Unique id for log and event correlation.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Encoded audio bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// MIME type, e.g. `audio/wav` or `audio/webm`.
    pub fn mime(&self) -> &str {
        &self.mime
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the clip holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Upload filename with an extension matching the MIME type.
    pub fn file_name(&self) -> String {
        let ext = match self.mime.split(';').next().unwrap_or_default().trim() {
            "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
            "audio/webm" => "webm",
            "audio/ogg" => "ogg",
            "audio/mpeg" => "mp3",
            "audio/mp4" => "m4a",
            _ => "bin",
        };
        format!("recording.{}", ext)
    }

    /// Playback length, when the clip is WAV and its header is readable.
    pub fn duration(&self) -> Option<Duration> {
        if !self.mime.starts_with(WAV_MIME) && !self.mime.starts_with("audio/x-wav") {
            return None;
        }
        wav::duration(&self.bytes).ok()
    }
}
