use thiserror::Error;

/// Failure classes for a processing session.
///
/// Each pipeline stage maps its failures onto exactly one of these variants
/// so the orchestrator can report precisely which kind of thing went wrong
/// without inspecting stage internals.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed or unsupported input, e.g. a non-http(s) URL.
    #[error("invalid input: {0}")]
    Validation(String),

    /// A size or time ceiling was breached during transfer.
    #[error("download exceeds the {} MiB limit", limit_bytes / (1024 * 1024))]
    QuotaExceeded { limit_bytes: u64 },

    /// Download or file-handle resolution failure.
    #[error("transfer failed: {0}")]
    Transport(String),

    /// Media normalization failure, carrying the transcoder's diagnostic.
    #[error("audio extraction failed: {0}")]
    Transcode(String),

    /// Backend (speech-recognition or text-generation) call failure.
    #[error("service call failed: {0}")]
    Service(String),
}

impl PipelineError {
    /// Short user-facing description, without internal detail the chat user
    /// cannot act on.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Validation(msg) => format!("⚠️ {}", msg),
            PipelineError::QuotaExceeded { .. } => format!("⚠️ {}", self),
            PipelineError::Transport(_) => {
                "❌ Could not fetch the file. Please try again.".to_string()
            }
            PipelineError::Transcode(_) => {
                "❌ Could not extract audio from this file.".to_string()
            }
            PipelineError::Service(_) => {
                "❌ The transcription service is unavailable right now.".to_string()
            }
        }
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
