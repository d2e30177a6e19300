/// tele-scribe - Telegram speech-to-text bot
///
/// Stages incoming media (uploads or remote URLs) to a scratch directory,
/// normalizes it to mono 16kHz audio, transcribes it through a
/// speech-recognition backend and optionally reformats/translates the
/// result through a text-generation backend.

pub mod acquire;
pub mod bot;
pub mod classify;
pub mod config;
pub mod enrich;
pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod staging;
pub mod telegram;
pub mod transcribe;
pub mod transcript;

// Re-export main types for easy access
pub use crate::acquire::{InputDescriptor, SourceAcquirer};
pub use crate::bot::Bot;
pub use crate::classify::{classify, MediaKind};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::enrich::{ChatCompletionsApi, TextEnricher, TextGen};
pub use crate::error::{PipelineError, PipelineResult};
pub use crate::normalize::AudioNormalizer;
pub use crate::pipeline::{Pipeline, SessionOutcome, Stage};
pub use crate::staging::{StagedFile, StagingStore};
pub use crate::telegram::{ChatTransport, InlineButton, TelegramApi};
pub use crate::transcribe::{SpeechToText, WhisperApi};
pub use crate::transcript::{Transcript, TranscriptStore};
