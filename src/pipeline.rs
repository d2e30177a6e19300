use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::acquire::{InputDescriptor, SourceAcquirer};
use crate::classify::classify;
use crate::enrich::{language_name, TextEnricher, TextGen};
use crate::error::PipelineError;
use crate::normalize::AudioNormalizer;
use crate::staging::StagingStore;
use crate::telegram::{ChatTransport, InlineButton};
use crate::transcribe::SpeechToText;
use crate::transcript::{Transcript, TranscriptStore};

/// Pipeline stages, in order. A failure in any stage terminates the session
/// with that stage recorded; no stage is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Acquiring,
    Classifying,
    Normalizing,
    Transcribing,
    Enriching,
    Delivering,
}

/// How a session ended, for logging and tests.
#[derive(Debug)]
pub enum SessionOutcome {
    /// Transcript delivered to the chat.
    Delivered,
    /// Transcription came back empty; the user was told so.
    NoSpeech,
    /// A stage failed; the user got the mapped error message.
    Failed {
        stage: Stage,
        error: PipelineError,
    },
}

/// Composes acquisition, classification, normalization, transcription and
/// enrichment into one unit of work per incoming request.
///
/// Every staged path created during a session is released before `run`
/// returns, on success and on every failure path. Cleanup problems are
/// logged, never surfaced to the user.
pub struct Pipeline {
    store: StagingStore,
    acquirer: SourceAcquirer,
    normalizer: AudioNormalizer,
    speech: Arc<dyn SpeechToText>,
    enricher: Option<TextEnricher<dyn TextGen>>,
    transcripts: TranscriptStore,
    translation_languages: Vec<String>,
}

impl Pipeline {
    pub fn new(
        store: StagingStore,
        acquirer: SourceAcquirer,
        normalizer: AudioNormalizer,
        speech: Arc<dyn SpeechToText>,
        text_gen: Option<Arc<dyn TextGen>>,
        translation_languages: Vec<String>,
    ) -> Self {
        Self {
            store,
            acquirer,
            normalizer,
            speech,
            enricher: text_gen.map(TextEnricher::new),
            transcripts: TranscriptStore::new(),
            translation_languages,
        }
    }

    pub fn transcripts(&self) -> &TranscriptStore {
        &self.transcripts
    }

    /// Run one full session for `descriptor` on behalf of `chat_id`.
    ///
    /// Never returns an error: every failure is mapped to a user-facing
    /// message and folded into the outcome.
    pub async fn run(
        &self,
        chat_id: i64,
        descriptor: InputDescriptor,
        transport: &dyn ChatTransport,
    ) -> SessionOutcome {
        let mut staged_paths: Vec<PathBuf> = Vec::new();

        let outcome = self
            .run_stages(chat_id, &descriptor, transport, &mut staged_paths)
            .await;

        // Unconditional cleanup of everything the session staged. Release is
        // idempotent, so paths that were renamed away or never written are
        // fine.
        for path in &staged_paths {
            self.store.release(path).await;
        }

        match outcome {
            Ok(outcome) => outcome,
            Err((stage, error)) => {
                warn!("❌ Session for chat {} failed at {:?}: {}", chat_id, stage, error);
                if let Err(e) = transport
                    .send_message(chat_id, &error.user_message(), None)
                    .await
                {
                    warn!("Failed to deliver error message to chat {}: {}", chat_id, e);
                }
                SessionOutcome::Failed { stage, error }
            }
        }
    }

    async fn run_stages(
        &self,
        chat_id: i64,
        descriptor: &InputDescriptor,
        transport: &dyn ChatTransport,
        staged_paths: &mut Vec<PathBuf>,
    ) -> Result<SessionOutcome, (Stage, PipelineError)> {
        // Acquiring
        let staged = self
            .acquirer
            .fetch(descriptor, &self.store, transport)
            .await
            .map_err(|e| (Stage::Acquiring, e))?;
        staged_paths.push(staged.path.clone());

        // Classifying
        let kind = classify(&staged.path);

        // Normalizing
        let artifact = self
            .normalizer
            .normalize(&staged, kind)
            .await
            .map_err(|e| (Stage::Normalizing, e))?;
        staged_paths.push(artifact.path.clone());

        // Transcribing
        let raw = self
            .speech
            .transcribe(&artifact.path)
            .await
            .map_err(|e| (Stage::Transcribing, e))?;

        if raw.trim().is_empty() {
            info!("🤷 No speech detected for chat {}", chat_id);
            transport
                .send_message(chat_id, "⚠️ No speech detected in this file.", None)
                .await
                .map_err(|e| (Stage::Delivering, e))?;
            return Ok(SessionOutcome::NoSpeech);
        }

        // Enriching. A service failure here never discards the raw
        // transcript we already have.
        let mut transcript = Transcript::new(raw);
        if let Some(enricher) = &self.enricher {
            match enricher.enrich(&transcript.raw).await {
                Ok(formatted) => transcript.formatted = Some(formatted),
                Err(e) => {
                    warn!("Enrichment failed for chat {}, delivering raw text: {}", chat_id, e);
                }
            }
        }

        // Delivering
        let text = format!(
            "📝 <b>Transcript:</b>\n\n{}",
            escape_html(transcript.best_text())
        );
        let buttons = self.translation_buttons();
        transport
            .send_message(chat_id, &text, buttons.as_deref())
            .await
            .map_err(|e| (Stage::Delivering, e))?;

        self.transcripts.put(chat_id, transcript).await;
        debug!("✅ Session for chat {} delivered", chat_id);
        Ok(SessionOutcome::Delivered)
    }

    /// Translate the chat's last transcript into `code` and deliver it.
    ///
    /// Acts on whichever transcript finished most recently for this chat.
    pub async fn translate_last(
        &self,
        chat_id: i64,
        code: &str,
        transport: &dyn ChatTransport,
    ) {
        let Some(enricher) = &self.enricher else {
            return;
        };

        let Some(transcript) = self.transcripts.get(chat_id).await else {
            let _ = transport
                .send_message(chat_id, "⚠️ Nothing to translate yet. Send me a file first.", None)
                .await;
            return;
        };

        match enricher.translate(transcript.best_text(), code).await {
            Ok(translated) => {
                self.transcripts
                    .add_translation(chat_id, code, translated.clone())
                    .await;
                let text = format!(
                    "🌍 <b>{}:</b>\n\n{}",
                    language_name(code),
                    escape_html(&translated)
                );
                if let Err(e) = transport.send_message(chat_id, &text, None).await {
                    warn!("Failed to deliver translation to chat {}: {}", chat_id, e);
                }
            }
            Err(e) => {
                warn!("Translation to {} failed for chat {}: {}", code, chat_id, e);
                let _ = transport
                    .send_message(chat_id, &e.user_message(), None)
                    .await;
            }
        }
    }

    fn translation_buttons(&self) -> Option<Vec<InlineButton>> {
        if self.enricher.is_none() || self.translation_languages.is_empty() {
            return None;
        }
        Some(
            self.translation_languages
                .iter()
                .map(|code| InlineButton {
                    text: format!("🌍 {}", language_name(code)),
                    callback_data: format!("translate:{}", code),
                })
                .collect(),
        )
    }
}

/// Escape text for Telegram's HTML parse mode.
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
