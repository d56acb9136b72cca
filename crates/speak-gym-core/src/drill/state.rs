use crate::{
    Slot,
    api::{
        ConversationMessage, DrillFeedback, ExpansionStart, Role, Segment, ShadowStart,
        SubstitutionStart,
    },
    audio::Clip,
    request::RequestTicket,
};

/// Content the bridge returned when a drill started.
#[derive(Debug, Clone, PartialEq)]
pub enum DrillSeed {
    /// Sentence to repeat.
    Shadow(ShadowStart),
    /// Base sentence with swappable slots.
    Substitution(SubstitutionStart),
    /// Seed line to grow.
    Expansion(ExpansionStart),
    /// Opening line of the review dialog.
    Review {
        /// Agent's first line.
        opening: String,
    },
}

impl DrillSeed {
    /// Slot this seed belongs to.
    pub fn slot(&self) -> Slot {
        match self {
            DrillSeed::Shadow(_) => Slot::Shadow,
            DrillSeed::Substitution(_) => Slot::Substitution,
            DrillSeed::Expansion(_) => Slot::Expansion,
            DrillSeed::Review { .. } => Slot::Review,
        }
    }

    /// Line as shown to the learner.
    pub fn display_line(&self) -> &str {
        match self {
            DrillSeed::Shadow(start) => &start.sentence,
            DrillSeed::Substitution(start) => &start.base_sentence,
            DrillSeed::Expansion(start) => &start.seed,
            DrillSeed::Review { opening } => opening,
        }
    }

    /// Line handed to speech synthesis.
    ///
    /// Substitution placeholders keep their label but lose the brackets so
    /// the voice reads `[coffee]` as "coffee".
    pub fn spoken_line(&self) -> String {
        match self {
            DrillSeed::Substitution(start) => strip_brackets(&start.base_sentence),
            other => other.display_line().to_string(),
        }
    }
}

/// Remove `[` and `]` and collapse the whitespace left behind.
pub fn strip_brackets(text: &str) -> String {
    text.replace(['[', ']'], "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// What the runner remembers about one slot's drill.
#[derive(Debug, Clone)]
pub(crate) struct DrillState {
    pub(crate) seed: DrillSeed,
    pub(crate) ticket: Option<RequestTicket>,
    pub(crate) last_transcript: Option<String>,
    pub(crate) last_segments: Vec<Segment>,
    pub(crate) history: Vec<ConversationMessage>,
    pub(crate) attempt: u32,
}

impl DrillState {
    pub(crate) fn new(seed: DrillSeed) -> Self {
        let history = match &seed {
            DrillSeed::Review { opening } => vec![ConversationMessage {
                role: Role::Agent,
                content: opening.clone(),
            }],
            _ => Vec::new(),
        };

        Self {
            seed,
            ticket: None,
            last_transcript: None,
            last_segments: Vec::new(),
            history,
            attempt: 1,
        }
    }

    /// Record a completed review exchange; the next agent line starts at attempt 1.
    pub(crate) fn push_exchange(&mut self, user_reply: &str, agent_reply: &str) {
        self.history.push(ConversationMessage {
            role: Role::User,
            content: user_reply.to_string(),
        });
        self.history.push(ConversationMessage {
            role: Role::Agent,
            content: agent_reply.to_string(),
        });
        self.attempt = 1;
    }
}

/// A recording that has been stopped but not yet submitted.
///
/// Carries the request ticket that was current when capture stopped, so a
/// newer attempt supersedes it even if it is submitted late.
#[derive(Debug, Clone)]
pub struct PendingAttempt {
    pub(crate) clip: Clip,
    pub(crate) ticket: RequestTicket,
}

impl PendingAttempt {
    /// Slot the attempt was recorded for.
    pub fn slot(&self) -> Slot {
        self.ticket.slot()
    }

    /// The recorded audio.
    pub fn clip(&self) -> &Clip {
        &self.clip
    }
}

/// Result of submitting one recorded attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    /// Nothing was captured; no request was made.
    Empty,
    /// Audio was captured but no speech was recognised.
    Unheard,
    /// Drill feedback for a shadow, substitution or expansion attempt.
    Feedback {
        /// What the learner said.
        transcript: String,
        /// Bridge feedback.
        feedback: DrillFeedback,
    },
    /// Next agent line in the review dialog.
    Reply {
        /// What the learner said.
        transcript: String,
        /// Agent's answer.
        reply: String,
    },
}
