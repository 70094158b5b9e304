//! Host backend error types

use thiserror::Error;

/// Errors reported by a host backend
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    /// The window or presentation surface could not be created
    #[error("Surface creation failed: {0}")]
    SurfaceCreationFailed(String),

    /// A display operation was attempted before a surface exists
    #[error("No presentation surface")]
    NoSurface,

    /// The audio device could not be opened
    #[error("Audio device open failed: {0}")]
    AudioOpenFailed(String),

    /// The exact requested audio format is not available
    #[error("Audio format unavailable")]
    FormatUnavailable,

    /// The sink handle does not name an open sink or stream
    #[error("Unknown audio sink: {0}")]
    UnknownSink(u32),

    /// The host event source has shut down
    #[error("Host event source disconnected")]
    Disconnected,

    /// Any other backend failure
    #[error("Host backend error: {0}")]
    Backend(String),
}
