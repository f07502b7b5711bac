//! Error types for the Parley turn pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for voice operations
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors that can occur while processing a voice turn
#[derive(Error, Debug)]
pub enum VoiceError {
    /// The client did not send an audio field.
    #[error("No file found")]
    NoFileProvided,

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Reply generation failed: {0}")]
    ReplyGenerationFailed(String),

    #[error("Speech synthesis failed: {0}")]
    SynthesisFailed(String),

    /// Only ever logged; never returned from a request that otherwise succeeded.
    #[error("Failed to remove {path}: {source}")]
    FileCleanupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Startup voice listing failed; the catalog stays empty.
    #[error("Voice catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("Output not found: {0}")]
    OutputNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VoiceError {
    /// True for failures of a remote dependency (STT, completion, TTS, voice listing).
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            VoiceError::TranscriptionFailed(_)
                | VoiceError::ReplyGenerationFailed(_)
                | VoiceError::SynthesisFailed(_)
                | VoiceError::CatalogUnavailable(_)
        )
    }
}
