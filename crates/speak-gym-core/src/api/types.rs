//! Request and response bodies for the tutor bridge.

use crate::context::{Difficulty, Language};

use serde::{Deserialize, Serialize};

/// `GET /health` reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `"ok"` when the bridge is up.
    pub status: String,
}

/// One ASR segment with timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
    /// Segment text.
    pub text: String,
}

/// `POST /transcribe` reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscribeResponse {
    /// Full transcript.
    pub transcription: String,
    /// Detected language.
    #[serde(default)]
    pub language: Option<String>,
    /// Audio duration in seconds.
    #[serde(default)]
    pub duration: Option<f64>,
    /// Timed segments.
    #[serde(default)]
    pub segments: Vec<Segment>,
}

/// `POST /synthesize` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesizeRequest {
    /// Text to speak.
    pub text: String,
    /// Amplitude scale.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f32>,
}

/// Body shared by the shadow, substitution and expansion start calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrillStartRequest {
    /// Theme or context hint.
    pub theme: String,
    /// Pinned anchor phrase.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor_phrase: Option<String>,
    /// Difficulty label.
    pub difficulty: Difficulty,
    /// Learner language.
    pub language: Language,
    /// LLM model override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// `POST /shadow/start` reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowStart {
    /// Line to repeat.
    pub sentence: String,
    /// Delivery cue such as tone or speed.
    #[serde(default)]
    pub cue: Option<String>,
}

/// A substitution slot and its allowed replacements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstitutionSlot {
    /// Label used as `[label]` in the base sentence.
    pub label: String,
    /// Allowed replacements.
    pub options: Vec<String>,
}

/// `POST /substitution/start` reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstitutionStart {
    /// Sentence with `[label]` placeholders.
    pub base_sentence: String,
    /// Slots referenced by the placeholders.
    #[serde(default)]
    pub slots: Vec<SubstitutionSlot>,
}

/// `POST /expansion/start` reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpansionStart {
    /// Short line to grow.
    pub seed: String,
    /// Hints for adding detail and connectors.
    #[serde(default)]
    pub scaffolds: Vec<String>,
}

/// `POST /shadow/feedback` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowFeedbackRequest {
    /// Reference sentence.
    pub reference: String,
    /// Learner transcript.
    pub transcript: String,
    /// Feedback language.
    pub target_language: Language,
}

/// `POST /substitution/feedback` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstitutionFeedbackRequest {
    /// Base sentence with placeholders.
    pub base_sentence: String,
    /// Learner transcript.
    pub transcript: String,
    /// Slots offered to the learner.
    pub slots: Vec<SubstitutionSlot>,
    /// Feedback language.
    pub target_language: Language,
}

/// `POST /expansion/feedback` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpansionFeedbackRequest {
    /// Seed line.
    pub seed: String,
    /// Learner transcript.
    pub transcript: String,
    /// Expansion goals shown to the learner.
    pub scaffolds: Vec<String>,
    /// Feedback language.
    pub target_language: Language,
}

/// Drill feedback reply. Substitution fills `next_variant`, expansion fills
/// `improved_variant`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrillFeedback {
    /// Feedback text.
    pub feedback: String,
    /// Next substitution to try.
    #[serde(default)]
    pub next_variant: Option<String>,
    /// Expanded example line.
    #[serde(default)]
    pub improved_variant: Option<String>,
}

impl DrillFeedback {
    /// Whichever follow-up line the drill produced.
    pub fn variant(&self) -> Option<&str> {
        self.next_variant
            .as_deref()
            .or(self.improved_variant.as_deref())
    }
}

/// `POST /review/start` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewStartRequest {
    /// Role-play theme.
    pub theme: String,
    /// Difficulty label.
    pub difficulty: Difficulty,
    /// Learner language.
    pub language: Language,
    /// LLM model override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// `POST /review/start` reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewStart {
    /// Agent's first line.
    pub opening: String,
}

/// Speaker of a review dialog line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The tutor.
    Agent,
    /// The learner.
    User,
}

/// One line of review dialog history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// Speaker.
    pub role: Role,
    /// Line text.
    pub content: String,
}

/// `POST /review/turn` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewTurnRequest {
    /// Role-play theme.
    pub theme: String,
    /// Difficulty label.
    pub difficulty: Difficulty,
    /// Learner language.
    pub language: Language,
    /// Dialog so far, excluding `user_reply`.
    pub history: Vec<ConversationMessage>,
    /// Learner's latest line.
    pub user_reply: String,
    /// 1 for the first try on the current agent line.
    pub attempt: u32,
    /// LLM model override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// `POST /review/turn` reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewTurn {
    /// Agent's next line.
    pub reply: String,
}

/// `POST /themes` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeRequest {
    /// Learner language.
    pub language: Language,
    /// Requested topic or intent.
    pub theme: String,
    /// Optional difficulty hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    /// Number of phrase cards, 1 to 10.
    pub count: u8,
    /// LLM model override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// A phrase suggested for the theme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseCard {
    /// Spoken line.
    pub phrase: String,
    /// Translation, when provided.
    #[serde(default)]
    pub translation: Option<String>,
    /// Delivery hint.
    #[serde(default)]
    pub cue: Option<String>,
    /// Difficulty label.
    #[serde(default)]
    pub difficulty: Option<String>,
}

/// `POST /themes` reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeResponse {
    /// Normalized language.
    pub language: String,
    /// Theme as requested.
    pub theme: String,
    /// One-sentence learning intent.
    pub intent: String,
    /// Suggested anchor phrases.
    #[serde(default)]
    pub phrase_cards: Vec<PhraseCard>,
}

/// `POST /feedback` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRequest {
    /// Full transcript.
    pub transcript: String,
    /// ASR segments, when available.
    #[serde(default)]
    pub segments: Vec<Segment>,
    /// Feedback language.
    pub target_language: Language,
}

/// `POST /feedback` reply: layered notes for a transcript.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeedbackReport {
    /// Transcript split into sentences.
    #[serde(default)]
    pub chunks: Vec<String>,
    /// Grammar notes.
    #[serde(default)]
    pub grammar_notes: Vec<String>,
    /// Intonation and pronunciation notes.
    #[serde(default)]
    pub prosody_notes: Vec<String>,
    /// Phrases worth re-recording.
    #[serde(default)]
    pub rerecord_targets: Vec<String>,
}

/// Conversation style of a bridge chat session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Encouraging, fluency-first.
    #[default]
    Fluency,
    /// Explicit corrections.
    Review,
}

/// `POST /sessions` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCreateRequest {
    /// Optional user id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Conversation style.
    pub mode: SessionMode,
}

/// Session summary returned by create, get and update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Bridge-assigned id.
    pub session_id: String,
    /// Conversation style.
    pub mode: SessionMode,
    /// Completed exchanges.
    pub turns: u32,
}

/// `POST /sessions/{id}/chat` and `POST /chat` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Learner prompt.
    pub prompt: String,
    /// LLM model override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// `POST /sessions/{id}/chat` reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionChatResponse {
    /// Session id.
    pub session_id: String,
    /// Conversation style.
    pub mode: SessionMode,
    /// Tutor reply.
    pub response: String,
    /// Completed exchanges.
    pub turns: u32,
}

/// `POST /chat` reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Model reply.
    pub response: String,
}
