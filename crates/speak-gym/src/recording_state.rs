use speak_gym_core::Slot;

use std::time::Instant;

use uuid::Uuid;

/// Recording state for the command reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    /// Not currently recording.
    Idle,
    /// Currently recording audio.
    Recording {
        /// Drill being attempted.
        slot: Slot,
        /// When recording started.
        started_at: Instant,
        /// Unique session ID for log correlation.
        session_id: Uuid,
    },
}

/// The app's answer to the latest `StartRecording` it handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingAck {
    /// The microphone is open for this session.
    Started {
        /// Session that is recording.
        session_id: Uuid,
    },
    /// The session never started; nothing is recording.
    Refused {
        /// Session that was refused.
        session_id: Uuid,
    },
}
