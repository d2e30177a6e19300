use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::{PipelineError, PipelineResult};

/// Text-generation backend: one prompt in, one completion out.
#[async_trait]
pub trait TextGen: Send + Sync {
    async fn complete(&self, prompt: &str) -> PipelineResult<String>;
}

/// Chat message for the completions API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// OpenAI chat-completions backend.
pub struct ChatCompletionsApi {
    config: LlmConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: ChatMessage,
}

impl ChatCompletionsApi {
    pub fn new(config: LlmConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(anyhow!("text-generation API key required"));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl TextGen for ChatCompletionsApi {
    async fn complete(&self, prompt: &str) -> PipelineResult<String> {
        let request = CompletionRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        debug!("💬 Sending completion request to {}", self.config.endpoint);

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| PipelineError::Service(format!("completion request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Service(format!(
                "completion API error {}: {}",
                status, body
            )));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Service(format!("malformed completion response: {}", e)))?;

        completion
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| PipelineError::Service("empty completion response".to_string()))
    }
}

/// Reformatting and translation on top of any [`TextGen`] backend.
pub struct TextEnricher<T: TextGen + ?Sized> {
    backend: std::sync::Arc<T>,
}

impl<T: TextGen + ?Sized> TextEnricher<T> {
    pub fn new(backend: std::sync::Arc<T>) -> Self {
        Self { backend }
    }

    /// Reformat a raw transcript into readable text.
    pub async fn enrich(&self, raw: &str) -> PipelineResult<String> {
        let prompt = format!(
            "Reformat the following transcript into clean, readable text. \
             Fix punctuation, capitalization and paragraph breaks, but do not \
             change the wording or meaning. Return only the reformatted text.\n\n{}",
            raw
        );
        let response = self.backend.complete(&prompt).await?;
        Ok(response.trim().to_string())
    }

    /// Translate text into the language named by `code`.
    pub async fn translate(&self, text: &str, code: &str) -> PipelineResult<String> {
        let prompt = format!(
            "Translate the following text into {}. Return only the translation.\n\n{}",
            language_name(code),
            text
        );
        let response = self.backend.complete(&prompt).await?;
        Ok(response.trim().to_string())
    }
}

/// Human-readable name for a language code; unknown codes pass through
/// verbatim so the prompt still reads sensibly.
pub fn language_name(code: &str) -> &str {
    match code {
        "ru" => "Russian",
        "en" => "English",
        "hy" => "Armenian",
        "uk" => "Ukrainian",
        "ka" => "Georgian",
        "de" => "German",
        "fr" => "French",
        "es" => "Spanish",
        "it" => "Italian",
        "pt" => "Portuguese",
        "tr" => "Turkish",
        "ar" => "Arabic",
        "zh" => "Chinese",
        "ja" => "Japanese",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct EchoBackend;

    #[async_trait]
    impl TextGen for EchoBackend {
        async fn complete(&self, prompt: &str) -> PipelineResult<String> {
            Ok(format!("  {}  ", prompt))
        }
    }

    #[test]
    fn test_language_name_resolution() {
        assert_eq!(language_name("ru"), "Russian");
        assert_eq!(language_name("hy"), "Armenian");
        assert_eq!(language_name("tlh"), "tlh");
    }

    #[tokio::test]
    async fn test_translate_prompt_names_the_language() {
        let enricher = TextEnricher::new(Arc::new(EchoBackend));
        let prompt = enricher.translate("Hello, world.", "hy").await.unwrap();
        assert!(prompt.contains("into Armenian"));
        assert!(prompt.contains("Hello, world."));
        // Responses come back trimmed.
        assert!(!prompt.starts_with(' '));
    }

    #[tokio::test]
    async fn test_enrich_prompt_carries_raw_text() {
        let enricher = TextEnricher::new(Arc::new(EchoBackend));
        let prompt = enricher.enrich("hello world").await.unwrap();
        assert!(prompt.contains("hello world"));
        assert!(prompt.contains("Reformat"));
    }

    #[test]
    fn test_missing_api_key_is_rejected() {
        let config = LlmConfig {
            api_key: String::new(),
            ..LlmConfig::default()
        };
        assert!(ChatCompletionsApi::new(config).is_err());
    }
}
