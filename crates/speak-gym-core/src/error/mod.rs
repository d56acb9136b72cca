use crate::Slot;

use error_location::ErrorLocation;
use thiserror::Error;
use uuid::Uuid;

/// Practice-client errors with source location tracking.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Microphone access was refused by the user or the platform.
    #[error("Microphone permission denied: {reason} {location}")]
    PermissionDenied {
        /// Description reported by the capture backend.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Audio device operation failed.
    #[error("Audio device error: {reason} {location}")]
    DeviceError {
        /// Description of the device error.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// A collaborator call failed with a transport error or non-success status.
    #[error("Request to {endpoint} failed (status {status:?}): {reason} {location}")]
    NetworkFailure {
        /// Endpoint path that was called.
        endpoint: String,
        /// HTTP status, when a response was received.
        status: Option<u16>,
        /// Response body or transport error text.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// A collaborator answered with a body that could not be decoded.
    #[error("Invalid response from {endpoint}: {reason} {location}")]
    InvalidResponse {
        /// Endpoint path that was called.
        endpoint: String,
        /// Decoding failure.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// A clip could not be decoded or played.
    #[error("Playback of clip {clip_id} failed: {reason} {location}")]
    PlaybackFailure {
        /// Clip that failed.
        clip_id: Uuid,
        /// Description of the failure.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The request was aborted because a newer cycle started for the slot.
    #[error("Request for {slot} superseded {location}")]
    Superseded {
        /// Slot whose request was aborted.
        slot: Slot,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// WAV encoding or decoding failed.
    #[error("Audio encoding error: {reason} {location}")]
    EncodingError {
        /// Description of the encoding error.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Key/value store read or write failed.
    #[error("Storage error: {reason} {location}")]
    StorageError {
        /// Description of the storage error.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// An internal channel was closed.
    #[error("Channel closed: {reason} {location}")]
    ChannelClosed {
        /// Which channel closed.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// An attempt was submitted for a drill that has not been started.
    #[error("No {slot} drill in progress {location}")]
    DrillNotStarted {
        /// Slot without a seed.
        slot: Slot,
        /// Source location where error occurred.
        location: ErrorLocation,
    },
}

impl CoreError {
    /// Whether the error must be discarded without telling the user.
    pub fn is_silent(&self) -> bool {
        matches!(self, CoreError::Superseded { .. })
    }

    /// User-facing status line for this error, `None` for silent errors.
    pub fn user_message(&self) -> Option<String> {
        let message = match self {
            CoreError::Superseded { .. } => return None,
            CoreError::PermissionDenied { .. } => {
                "Microphone access was denied. Allow access and try recording again.".to_string()
            }
            CoreError::DeviceError { reason, .. } => format!("Audio device problem: {}", reason),
            CoreError::NetworkFailure {
                endpoint, status, ..
            } => match status {
                Some(code) => format!("The tutor service failed ({} on {}). Please retry.", code, endpoint),
                None => format!("Could not reach the tutor service ({}). Please retry.", endpoint),
            },
            CoreError::InvalidResponse { endpoint, .. } => {
                format!("The tutor service sent an unexpected reply ({}).", endpoint)
            }
            CoreError::PlaybackFailure { .. } => "A clip could not be played.".to_string(),
            CoreError::EncodingError { reason, .. } => format!("Audio could not be encoded: {}", reason),
            CoreError::StorageError { reason, .. } => format!("Could not save progress: {}", reason),
            CoreError::ChannelClosed { .. } => "The audio engine stopped.".to_string(),
            CoreError::DrillNotStarted { slot, .. } => {
                format!("Start a {} drill before recording.", slot)
            }
        };
        Some(message)
    }
}

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;
