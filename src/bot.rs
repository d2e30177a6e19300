use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use url::Url;

use crate::acquire::InputDescriptor;
use crate::config::Config;
use crate::pipeline::Pipeline;
use crate::telegram::{CallbackQuery, ChatTransport, Message, TelegramApi, Update};

const START_MESSAGE: &str = "🎥 <b>Hi!</b>\n\n\
    Send me a video, audio file, voice note or a link — \
    and I'll turn the speech into text ✨";

const HELP_MESSAGE: &str = "🤔 Send me a media file or an http(s) link to get started.";

const ACK_MESSAGE: &str = "🎧 Processing your file, this can take a little while ⏳";

/// Long-polling event loop: receives updates, dispatches media and link
/// messages into pipeline sessions, and serves translation callbacks.
///
/// Sessions run on spawned tasks behind a semaphore, so a long download or
/// transcription never stalls the polling loop.
pub struct Bot {
    api: TelegramApi,
    pipeline: Arc<Pipeline>,
    sessions: Arc<Semaphore>,
    poll_timeout_seconds: u64,
}

impl Bot {
    pub fn new(config: &Config, api: TelegramApi, pipeline: Arc<Pipeline>) -> Self {
        Self {
            api,
            pipeline,
            sessions: Arc::new(Semaphore::new(config.performance.max_concurrent_sessions)),
            poll_timeout_seconds: config.telegram.poll_timeout_seconds,
        }
    }

    /// Poll for updates until the process is stopped.
    pub async fn run(&self) -> Result<()> {
        info!("✅ Bot started, waiting for updates...");
        let mut offset = 0i64;

        loop {
            let updates = match self.api.get_updates(offset, self.poll_timeout_seconds).await {
                Ok(updates) => updates,
                Err(e) => {
                    warn!("getUpdates failed, retrying: {}", e);
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                self.dispatch(update).await;
            }
        }
    }

    async fn dispatch(&self, update: Update) {
        if let Some(callback) = update.callback_query {
            self.handle_callback(callback).await;
        } else if let Some(message) = update.message {
            self.handle_message(message).await;
        }
    }

    async fn handle_message(&self, message: Message) {
        let chat_id = message.chat.id;

        if let Some(media) = message.media() {
            let descriptor = InputDescriptor::Upload {
                file_id: media.file_id.clone(),
                file_unique_id: media.file_unique_id.clone(),
                file_name: media.file_name.clone(),
            };
            self.start_session(chat_id, descriptor).await;
            return;
        }

        match message.text.as_deref().map(str::trim) {
            Some("/start") => {
                if let Err(e) = self.api.send_message(chat_id, START_MESSAGE, None).await {
                    warn!("Failed to send /start reply: {}", e);
                }
            }
            Some(text) if looks_like_link(text) => {
                let descriptor = InputDescriptor::Remote {
                    url: text.to_string(),
                };
                self.start_session(chat_id, descriptor).await;
            }
            Some(_) => {
                let _ = self.api.send_message(chat_id, HELP_MESSAGE, None).await;
            }
            None => {}
        }
    }

    /// Spawn one pipeline session for this request. The acknowledgement is
    /// sent inline; the heavy work runs on its own task behind the session
    /// semaphore.
    async fn start_session(&self, chat_id: i64, descriptor: InputDescriptor) {
        debug!("🚀 Starting session for chat {}: {:?}", chat_id, descriptor);

        if let Err(e) = self.api.send_message(chat_id, ACK_MESSAGE, None).await {
            warn!("Failed to acknowledge chat {}: {}", chat_id, e);
        }

        let pipeline = Arc::clone(&self.pipeline);
        let api = self.api.clone();
        let sessions = Arc::clone(&self.sessions);

        tokio::spawn(async move {
            let _permit = sessions.acquire_owned().await.unwrap();
            let outcome = pipeline.run(chat_id, descriptor, &api).await;
            debug!("Session for chat {} ended: {:?}", chat_id, outcome);
        });
    }

    async fn handle_callback(&self, callback: CallbackQuery) {
        if let Err(e) = self.api.answer_callback_query(&callback.id).await {
            warn!("answerCallbackQuery failed: {}", e);
        }

        let Some(chat_id) = callback.message.as_ref().map(|m| m.chat.id) else {
            return;
        };
        let Some(code) = callback
            .data
            .as_deref()
            .and_then(parse_translate_callback)
            .map(str::to_string)
        else {
            return;
        };

        info!("🌍 Translation to '{}' requested by chat {}", code, chat_id);

        let pipeline = Arc::clone(&self.pipeline);
        let api = self.api.clone();
        tokio::spawn(async move {
            pipeline.translate_last(chat_id, &code, &api).await;
        });
    }
}

/// A message counts as a link when it parses as an absolute URL. Scheme
/// checking happens later in acquisition, so `ftp://x` still becomes a
/// session and gets a proper validation error back.
fn looks_like_link(text: &str) -> bool {
    Url::parse(text).is_ok()
}

fn parse_translate_callback(data: &str) -> Option<&str> {
    data.strip_prefix("translate:").filter(|code| !code.is_empty())
}
