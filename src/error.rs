//! Error types for the partwise library

use std::io;

/// Library error type for partwise operations
#[derive(Debug, thiserror::Error)]
pub enum ScoreError {
    /// Parsing error when reading MusicXML documents
    #[error("parsing error: {0}")]
    ParsingError(String),

    /// Unrecognized pitch step letter in a pitched note
    #[error("invalid pitch step: {0}")]
    InvalidPitchStep(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Audio-related error
    #[error("audio error: {0}")]
    AudioError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(String),
}

impl From<io::Error> for ScoreError {
    fn from(error: io::Error) -> Self {
        Self::IoError(error.to_string())
    }
}
