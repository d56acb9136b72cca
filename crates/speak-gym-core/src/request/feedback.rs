use crate::{Slot, request::RequestTicket};

use std::collections::HashMap;

use tracing::debug;

/// What the user sees for a slot's latest attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedbackState {
    /// Attempt submitted; transcript known once transcription returns.
    Pending {
        /// Transcript, once available.
        transcript: Option<String>,
    },
    /// Feedback arrived.
    Ready {
        /// What the learner said.
        transcript: String,
        /// Tutor feedback text.
        feedback: String,
        /// Suggested next variant or improved line, when the drill offers one.
        variant: Option<String>,
    },
    /// The attempt failed; the message is user-facing.
    Failed {
        /// Status line.
        message: String,
    },
}

/// Displayed feedback per slot, written only by current request tickets.
#[derive(Debug, Default)]
pub struct FeedbackBoard {
    entries: HashMap<Slot, (u64, FeedbackState)>,
}

impl FeedbackBoard {
    /// Create an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Show `state` for the ticket's slot.
    ///
    /// Returns `false`, leaving the board untouched, when the ticket was
    /// cancelled or an entry from a newer cycle is already displayed.
    pub fn apply(&mut self, ticket: &RequestTicket, state: FeedbackState) -> bool {
        if ticket.is_cancelled() {
            debug!(slot = %ticket.slot(), generation = ticket.generation(), "Discarding superseded feedback");
            return false;
        }

        match self.entries.get(&ticket.slot()) {
            Some((generation, _)) if *generation > ticket.generation() => {
                debug!(slot = %ticket.slot(), generation = ticket.generation(), "Discarding stale feedback");
                false
            }
            _ => {
                self.entries
                    .insert(ticket.slot(), (ticket.generation(), state));
                true
            }
        }
    }

    /// Current feedback for `slot`.
    pub fn get(&self, slot: Slot) -> Option<&FeedbackState> {
        self.entries.get(&slot).map(|(_, state)| state)
    }

    /// Forget a slot's feedback, e.g. when its drill restarts.
    pub fn clear(&mut self, slot: Slot) {
        self.entries.remove(&slot);
    }
}
