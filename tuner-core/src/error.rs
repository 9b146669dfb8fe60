//! Error types for the tuner core.

use thiserror::Error;

/// Result type alias for tuner-core operations.
pub type Result<T> = std::result::Result<T, TunerError>;

/// Errors that can be surfaced to the user.
///
/// Silence is not an error: a quiet buffer simply produces no pitch.
/// The type is `Clone` so it can travel over the worker's event channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TunerError {
    /// Microphone access was refused or no input device exists.
    #[error("microphone access denied: {0}")]
    PermissionDenied(String),

    /// The capture session failed while it was running (device unplugged,
    /// backend error, ...). The session has been released.
    #[error("audio capture failed: {0}")]
    Capture(String),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No tuning preset with this name exists.
    #[error("unknown tuning preset `{0}`")]
    UnknownPreset(String),

    /// An operation that needs a live session was called while stopped.
    #[error("tuner is not running")]
    NotRunning,
}
