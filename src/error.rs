//! Error types for the hum-to-MIDI system

use thiserror::Error;

/// Custom error type for transcription and melody search
#[derive(Debug, Clone, Error)]
pub enum HumError {
    /// E001: Invalid audio format (e.g., non-PCM WAV)
    #[error("E001: Invalid audio format - {0}")]
    InvalidAudioFormat(String),
    /// E002: Unsupported sample rate
    #[error("E002: Unsupported sample rate {0} Hz")]
    UnsupportedSampleRate(u32),
    /// E003: Configuration validation failed
    #[error("E003: Configuration validation failed - {0}")]
    ConfigValidationFailed(String),
    /// E004: Audio or melody file I/O error
    #[error("E004: File I/O error - {0}")]
    AudioFileError(String),
    /// E005: Input validation error
    #[error("E005: Input validation error - {0}")]
    InputValidationError(String),
    /// E006: The melody predictor failed or produced unusable output
    #[error("E006: Melody predictor error - {0}")]
    PredictorError(String),
    /// E007: MIDI export error
    #[error("E007: MIDI export error - {0}")]
    MidiExportError(String),
    /// E008: MIDI file could not be read or decoded
    #[error("E008: Malformed MIDI - {0}")]
    MalformedMidi(String),
    /// E009: Report export error
    #[error("E009: Analysis export error - {0}")]
    AnalysisExportError(String),
    /// E010: Processing pipeline error
    #[error("E010: Processing pipeline error - {0}")]
    ProcessingPipelineError(String),
    /// E011: Candidate corpus could not be listed
    #[error("E011: Corpus error - {0}")]
    CorpusError(String),
}

impl From<std::io::Error> for HumError {
    fn from(err: std::io::Error) -> Self {
        HumError::AudioFileError(format!("File I/O error: {}", err))
    }
}

impl From<serde_json::Error> for HumError {
    fn from(err: serde_json::Error) -> Self {
        HumError::AnalysisExportError(format!("JSON serialization error: {}", err))
    }
}

impl From<anyhow::Error> for HumError {
    fn from(err: anyhow::Error) -> Self {
        HumError::ProcessingPipelineError(format!("Generic error: {}", err))
    }
}

impl From<midly::Error> for HumError {
    fn from(err: midly::Error) -> Self {
        HumError::MalformedMidi(err.to_string())
    }
}

/// Result type alias for hum-to-MIDI operations
pub type Result<T> = std::result::Result<T, HumError>;
