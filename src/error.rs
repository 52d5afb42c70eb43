//! Error taxonomy surfaced to the host UI

use thiserror::Error;

/// Errors reported back through the bridge.
///
/// Every variant maps to a stable wire code via [`ArError::code`]; the
/// `Display` text is the human-readable message sent alongside it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArError {
    /// Caller supplied malformed or missing required arguments
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Referenced shape identifier is not registered
    #[error("Shape not found: {0}")]
    NotFound(String),

    #[error("No suitable surface found")]
    NoHit,

    #[error("Camera is not tracking")]
    TrackingInvalid,

    #[error("No camera frame available")]
    FrameUnavailable,

    #[error("Unknown shape: {0}")]
    UnknownShapeKind(String),

    #[error("Failed to create renderable: {0}")]
    RenderableCreationFailed(String),

    #[error("Failed to copy pixels: {0}")]
    CaptureFailed(String),

    #[error("Failed to save screenshot: {0}")]
    SaveFailed(String),

    #[error("AR is not supported on this device")]
    Unsupported,

    #[error("Failed to start AR session: {0}")]
    SessionStartFailed(String),

    /// The session loop is gone; the request was never answered
    #[error("AR session is closed")]
    SessionClosed,
}

impl ArError {
    /// Stable code the host matches on
    pub fn code(&self) -> &'static str {
        match self {
            ArError::InvalidArguments(_) => "INVALID_ARGUMENTS",
            ArError::NotFound(_) => "NOT_FOUND",
            ArError::NoHit => "NO_HIT",
            ArError::TrackingInvalid => "TRACKING_INVALID",
            ArError::FrameUnavailable => "FRAME_UNAVAILABLE",
            ArError::UnknownShapeKind(_) => "UNKNOWN_SHAPE",
            ArError::RenderableCreationFailed(_) => "RENDERABLE_FAILED",
            ArError::CaptureFailed(_) => "COPY_FAILED",
            ArError::SaveFailed(_) => "SAVE_FAILED",
            ArError::Unsupported => "UNSUPPORTED",
            ArError::SessionStartFailed(_) => "SESSION_FAILED",
            ArError::SessionClosed => "SESSION_CLOSED",
        }
    }

    /// Environmental failures the caller may retry after repositioning
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ArError::NoHit | ArError::TrackingInvalid | ArError::FrameUnavailable
        )
    }
}

/// Failures raised by an AR backend implementation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    #[error("Session error: {0}")]
    Session(String),

    #[error("Renderable build failed: {0}")]
    Renderable(String),

    #[error("Frame capture failed: {0}")]
    Capture(String),

    #[error("Surface not ready")]
    SurfaceNotReady,
}

pub type Result<T> = std::result::Result<T, ArError>;
