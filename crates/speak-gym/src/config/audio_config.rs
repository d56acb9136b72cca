use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Audio device configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AudioConfig {
    /// WAV file replayed as the microphone when running without a sound card.
    #[serde(default)]
    pub input_file: Option<PathBuf>,
    /// Directory tutor clips are written to when running without a sound card.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Synthesis volume (None = bridge default).
    #[serde(default)]
    pub volume: Option<f32>,
}
