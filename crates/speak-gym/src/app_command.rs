use speak_gym_core::Slot;

use uuid::Uuid;

/// Commands sent from the command reader to the main application.
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    /// Resolve a new theme and remember it for today.
    SetTheme {
        /// Topic or intent typed by the learner.
        theme: String,
    },
    /// Pin one of the last theme's phrase cards as the anchor phrase.
    PinAnchor {
        /// 1-based card number as listed.
        card: usize,
    },
    /// Fetch fresh content for a drill and speak its prompt.
    StartDrill {
        /// Drill to start.
        slot: Slot,
    },
    /// Start recording an attempt.
    StartRecording {
        /// Drill being attempted.
        slot: Slot,
        /// Unique session ID for this recording.
        session_id: Uuid,
    },
    /// Stop recording and submit the attempt.
    StopRecording {
        /// Drill being attempted.
        slot: Slot,
        /// Session ID of the recording to stop.
        session_id: Uuid,
    },
    /// Speak the current drill's latest feedback again.
    Replay {
        /// Drill whose feedback to replay.
        slot: Slot,
    },
    /// Fetch layered grammar and prosody notes for the last attempt.
    Report {
        /// Drill whose last transcript to analyse.
        slot: Slot,
    },
    /// Print theme, anchor and per-drill feedback.
    Status,
    /// Print the command list.
    Help,
    /// A line that could not be turned into a command.
    Unrecognised {
        /// Hint for the learner.
        message: String,
    },
    /// Request application shutdown.
    Shutdown,
}
