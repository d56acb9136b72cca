use crate::config::default_phrase_count;

use serde::{Deserialize, Serialize};
use speak_gym_core::context::{Difficulty, Language};

/// Practice defaults applied when a session starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeConfig {
    /// Feedback language.
    #[serde(default)]
    pub language: Language,
    /// Drill difficulty.
    #[serde(default)]
    pub difficulty: Difficulty,
    /// LLM model override (None = bridge default).
    #[serde(default)]
    pub model: Option<String>,
    /// Theme used when none was chosen today.
    #[serde(default)]
    pub theme: Option<String>,
    /// Phrase cards requested per theme.
    #[serde(default = "default_phrase_count")]
    pub phrase_count: u8,
}

impl Default for PracticeConfig {
    fn default() -> Self {
        Self {
            language: Language::default(),
            difficulty: Difficulty::default(),
            model: None,
            theme: None,
            phrase_count: default_phrase_count(),
        }
    }
}
