use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::TranscriptionConfig;
use crate::error::{PipelineError, PipelineResult};

/// Speech-recognition backend: audio file in, plain text out.
///
/// Whitespace-only output is a valid empty transcript, not an error; the
/// orchestrator decides how to report it.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> PipelineResult<String>;
}

/// OpenAI Whisper API transcription backend.
pub struct WhisperApi {
    config: TranscriptionConfig,
    client: reqwest::Client,
}

impl WhisperApi {
    pub fn new(config: TranscriptionConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(anyhow!("transcription API key required"));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl SpeechToText for WhisperApi {
    async fn transcribe(&self, audio_path: &Path) -> PipelineResult<String> {
        let audio_data = tokio::fs::read(audio_path)
            .await
            .map_err(|e| PipelineError::Service(format!("cannot read audio file: {}", e)))?;

        info!(
            "🎤 Transcribing {} ({} bytes) with model {}",
            audio_path.display(),
            audio_data.len(),
            self.config.model
        );

        let file_name = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.wav".to_string());

        let part = reqwest::multipart::Part::bytes(audio_data)
            .file_name(file_name)
            .mime_str("audio/wav")
            .map_err(|e| PipelineError::Service(e.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .text("model", self.config.model.clone())
            .text("response_format", "text")
            .part("file", part);

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| PipelineError::Service(format!("transcription request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Service(format!(
                "transcription API error {}: {}",
                status, body
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| PipelineError::Service(e.to_string()))?;

        debug!("🎤 Transcription returned {} characters", text.len());
        Ok(text)
    }
}
