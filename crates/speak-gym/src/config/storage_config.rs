use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Client-side persistence.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON file holding today's theme and anchor phrase
    /// (None = `state.json` in the data directory).
    #[serde(default)]
    pub state_file: Option<PathBuf>,
}
