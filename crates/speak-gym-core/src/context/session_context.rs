use crate::{CoreResult, context::DailyStore};

use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Feedback language. Drill content itself is always English.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// English.
    #[default]
    En,
    /// Chinese.
    Zh,
}

impl Language {
    /// Two-letter code sent to the bridge.
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Zh => "zh",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Language::En),
            "zh" => Ok(Language::Zh),
            other => Err(format!("unsupported language '{}'", other)),
        }
    }
}

/// Drill difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// Short, slow, polite lines.
    Easy,
    /// Everyday tone.
    #[default]
    Medium,
    /// Denser information, brisk delivery.
    Hard,
    /// Fast-paced, assumes background knowledge.
    Expert,
}

impl Difficulty {
    /// Lowercase label sent to the bridge.
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::Expert => "expert",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            "expert" => Ok(Difficulty::Expert),
            other => Err(format!("unknown difficulty '{}'", other)),
        }
    }
}

/// Practice settings threaded through every drill operation.
///
/// Operations take the context by reference and return an updated copy
/// rather than mutating shared state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionContext {
    /// Feedback language.
    pub language: Language,
    /// Drill difficulty.
    pub difficulty: Difficulty,
    /// Today's theme.
    pub theme: Option<String>,
    /// Pinned anchor phrase reused across drills.
    pub anchor_phrase: Option<String>,
    /// LLM model override; the bridge default is used when absent.
    pub model: Option<String>,
}

impl SessionContext {
    /// Fill theme and anchor phrase from what was saved for `day`.
    ///
    /// Saved values win over the ones already set on `self`.
    #[instrument(skip(self, store))]
    pub fn restore(self, store: &DailyStore, day: NaiveDate) -> CoreResult<Self> {
        let theme = store.theme(day)?.or(self.theme);
        let anchor_phrase = store.anchor_phrase(day)?.or(self.anchor_phrase);

        debug!(
            has_theme = theme.is_some(),
            has_anchor = anchor_phrase.is_some(),
            "Session context restored"
        );

        Ok(Self {
            theme,
            anchor_phrase,
            ..self
        })
    }

    /// Copy with a new theme; the anchor phrase is dropped because it belonged
    /// to the previous theme.
    pub fn with_theme(&self, theme: impl Into<String>) -> Self {
        Self {
            theme: Some(theme.into()),
            anchor_phrase: None,
            ..self.clone()
        }
    }

    /// Copy with a pinned anchor phrase.
    pub fn with_anchor(&self, phrase: impl Into<String>) -> Self {
        Self {
            anchor_phrase: Some(phrase.into()),
            ..self.clone()
        }
    }

    /// Copy with a different difficulty.
    pub fn with_difficulty(&self, difficulty: Difficulty) -> Self {
        Self {
            difficulty,
            ..self.clone()
        }
    }

    /// Theme to send to the bridge, falling back to a general topic.
    pub fn theme_or_default(&self) -> &str {
        self.theme.as_deref().unwrap_or("everyday small talk")
    }
}
