use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::acquire::download_with_limits;
use crate::config::{DownloadConfig, TelegramConfig};
use crate::error::{PipelineError, PipelineResult};

/// One inline keyboard button.
#[derive(Debug, Clone, Serialize)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

/// The narrow chat-transport contract the pipeline consumes.
///
/// The pipeline never talks to Telegram directly; everything goes through
/// these four operations so tests can substitute a fake transport.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send an HTML-formatted message, optionally with one row of inline
    /// buttons.
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        buttons: Option<&[InlineButton]>,
    ) -> PipelineResult<()>;

    /// Resolve an uploaded file's id to a downloadable URL.
    async fn resolve_file(&self, file_id: &str) -> PipelineResult<String>;

    /// Stream the resolved URL into `dest`. Never leaves a partial file.
    async fn download_to_path(&self, url: &str, dest: &Path) -> PipelineResult<()>;
}

// ---- Bot API payload types ----------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub text: Option<String>,
    pub video: Option<FileAttachment>,
    pub audio: Option<FileAttachment>,
    pub voice: Option<FileAttachment>,
    pub video_note: Option<FileAttachment>,
    pub document: Option<FileAttachment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileAttachment {
    pub file_id: String,
    pub file_unique_id: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub data: Option<String>,
    pub message: Option<Message>,
}

impl Message {
    /// The media attachment this message carries, if any, in the same
    /// precedence order the bot accepts them: video, audio, voice, video
    /// note, then document.
    pub fn media(&self) -> Option<&FileAttachment> {
        self.video
            .as_ref()
            .or(self.audio.as_ref())
            .or(self.voice.as_ref())
            .or(self.video_note.as_ref())
            .or(self.document.as_ref())
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileInfo {
    file_path: Option<String>,
}

// ---- Concrete transport ---------------------------------------------------

/// Raw Bot API client: long polling, message sending with inline keyboards,
/// and file resolution/download. No framework, plain HTTP.
#[derive(Clone)]
pub struct TelegramApi {
    client: reqwest::Client,
    api_base: String,
    token: String,
    max_download_bytes: u64,
    download_timeout: Duration,
}

impl TelegramApi {
    pub fn new(config: &TelegramConfig, download: &DownloadConfig) -> Result<Self> {
        if config.bot_token.is_empty() {
            return Err(anyhow!("Telegram bot token required"));
        }

        // No overall request timeout on this client: getUpdates long-polls.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(download.connect_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.bot_token.clone(),
            max_download_bytes: download.max_bytes,
            download_timeout: Duration::from_secs(download.transfer_timeout_seconds),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_base, self.token, file_path)
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Telegram API error {}: {}", status, text));
        }

        let parsed: ApiResponse<T> = response.json().await?;
        if !parsed.ok {
            return Err(anyhow!(
                "Telegram API rejected {}: {}",
                method,
                parsed.description.unwrap_or_default()
            ));
        }
        parsed
            .result
            .ok_or_else(|| anyhow!("Telegram API returned ok without a result"))
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(&self, offset: i64, timeout_seconds: u64) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": timeout_seconds,
                "allowed_updates": ["message", "callback_query"],
            }),
        )
        .await
    }

    /// Acknowledge a callback query so the client stops its spinner.
    pub async fn answer_callback_query(&self, callback_id: &str) -> Result<()> {
        let _: bool = self
            .call("answerCallbackQuery", json!({ "callback_query_id": callback_id }))
            .await?;
        Ok(())
    }
}

fn reply_markup(buttons: &[InlineButton]) -> serde_json::Value {
    json!({ "inline_keyboard": [buttons] })
}

#[async_trait]
impl ChatTransport for TelegramApi {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        buttons: Option<&[InlineButton]>,
    ) -> PipelineResult<()> {
        let mut body = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
        });
        if let Some(buttons) = buttons {
            body["reply_markup"] = reply_markup(buttons);
        }

        debug!("💬 Sending message to chat {}", chat_id);
        let _: serde_json::Value = self
            .call("sendMessage", body)
            .await
            .map_err(|e| PipelineError::Transport(e.to_string()))?;
        Ok(())
    }

    async fn resolve_file(&self, file_id: &str) -> PipelineResult<String> {
        let info: FileInfo = self
            .call("getFile", json!({ "file_id": file_id }))
            .await
            .map_err(|e| PipelineError::Transport(e.to_string()))?;

        let file_path = info
            .file_path
            .ok_or_else(|| PipelineError::Transport("getFile returned no file_path".into()))?;

        Ok(self.file_url(&file_path))
    }

    async fn download_to_path(&self, url: &str, dest: &Path) -> PipelineResult<()> {
        download_with_limits(
            &self.client,
            url,
            dest,
            self.max_download_bytes,
            self.download_timeout,
        )
        .await
    }
}
