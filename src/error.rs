//! Error types for repflux

use thiserror::Error;

/// Errors that can occur while analysing a landmark stream
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Could not open frame source: {0}")]
    SourceUnavailable(String),

    #[error("Unsupported exercise type: {0}")]
    UnsupportedExercise(String),

    #[error("Unsupported analysis mode: {0}. Supported modes are FILE and LIVE.")]
    UnsupportedMode(String),

    #[error("Missing landmark: {0}")]
    MissingLandmark(String),

    #[error("Failed to decode frame at line {line}: {message}")]
    FrameDecode { line: usize, message: String },

    #[error("Invalid landmark stream: {0}")]
    InvalidStream(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No frames processed")]
    NoFrames,
}

impl AnalysisError {
    /// Whether the session may continue with the next frame after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AnalysisError::MissingLandmark(_) | AnalysisError::FrameDecode { .. }
        )
    }
}
