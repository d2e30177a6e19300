use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// The text produced by one processing session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    /// Raw speech-recognition output.
    pub raw: String,
    /// Reformatted text, when enrichment succeeded.
    pub formatted: Option<String>,
    /// Completed translations, keyed by language code.
    pub translations: HashMap<String, String>,
}

impl Transcript {
    pub fn new(raw: String) -> Self {
        Self {
            raw,
            ..Default::default()
        }
    }

    /// The text translation requests act on: the formatted version when we
    /// have one, the raw transcript otherwise.
    pub fn best_text(&self) -> &str {
        self.formatted.as_deref().unwrap_or(&self.raw)
    }
}

/// Last completed transcript per conversation.
///
/// Keyed by chat id so conversations never see each other's results. Within
/// one chat the slot is last-write-wins: when two files are processed
/// back-to-back, a translation button may act on the more recently completed
/// transcript rather than the one it was attached to. Known limitation.
#[derive(Debug, Clone, Default)]
pub struct TranscriptStore {
    slots: Arc<RwLock<HashMap<i64, Transcript>>>,
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, chat_id: i64, transcript: Transcript) {
        debug!("📝 Storing transcript for chat {}", chat_id);
        self.slots.write().await.insert(chat_id, transcript);
    }

    pub async fn get(&self, chat_id: i64) -> Option<Transcript> {
        self.slots.read().await.get(&chat_id).cloned()
    }

    /// Record a finished translation on the chat's current transcript.
    pub async fn add_translation(&self, chat_id: i64, code: &str, text: String) {
        if let Some(transcript) = self.slots.write().await.get_mut(&chat_id) {
            transcript.translations.insert(code.to_string(), text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_slots_are_per_chat() {
        let store = TranscriptStore::new();
        store.put(1, Transcript::new("first chat".into())).await;
        store.put(2, Transcript::new("second chat".into())).await;

        assert_eq!(store.get(1).await.unwrap().raw, "first chat");
        assert_eq!(store.get(2).await.unwrap().raw, "second chat");
        assert!(store.get(3).await.is_none());
    }

    #[tokio::test]
    async fn test_same_chat_is_last_write_wins() {
        let store = TranscriptStore::new();
        store.put(7, Transcript::new("earlier".into())).await;
        store.put(7, Transcript::new("later".into())).await;

        assert_eq!(store.get(7).await.unwrap().raw, "later");
    }

    #[test]
    fn test_best_text_prefers_formatted() {
        let mut transcript = Transcript::new("hello world".into());
        assert_eq!(transcript.best_text(), "hello world");

        transcript.formatted = Some("Hello, world.".into());
        assert_eq!(transcript.best_text(), "Hello, world.");
    }

    #[tokio::test]
    async fn test_add_translation_updates_current_slot() {
        let store = TranscriptStore::new();
        store.put(5, Transcript::new("hi".into())).await;
        store.add_translation(5, "ru", "привет".into()).await;

        let transcript = store.get(5).await.unwrap();
        assert_eq!(transcript.translations.get("ru").unwrap(), "привет");
    }
}
