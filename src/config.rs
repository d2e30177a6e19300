use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the tele-scribe bot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scratch-directory settings
    pub staging: StagingConfig,

    /// Remote download limits
    pub download: DownloadConfig,

    /// Audio normalization settings
    pub audio: AudioConfig,

    /// Speech-recognition backend settings
    pub transcription: TranscriptionConfig,

    /// Text-generation backend settings
    pub llm: LlmConfig,

    /// Telegram transport settings
    pub telegram: TelegramConfig,

    /// Concurrency settings
    pub performance: PerformanceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Directory holding transient session files
    pub root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Hard ceiling on transferred bytes per download
    pub max_bytes: u64,

    /// Whole-transfer timeout in seconds
    pub transfer_timeout_seconds: u64,

    /// Connection establishment timeout in seconds
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate the transcription backend expects
    pub target_sample_rate: u32,

    /// Transcoder binary to invoke
    pub ffmpeg_binary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// API key for the speech-recognition backend
    pub api_key: String,

    /// Transcription endpoint
    pub endpoint: String,

    /// Model to use for transcription
    pub model: String,

    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Enable transcript reformatting and translations
    pub enable_formatting: bool,

    /// API key for the text-generation backend
    pub api_key: String,

    /// Chat-completions endpoint
    pub endpoint: String,

    /// Model to use for formatting and translation
    pub model: String,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Temperature for generation
    pub temperature: f32,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// Language codes offered as translation buttons
    pub translation_languages: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot API token
    pub bot_token: String,

    /// Bot API base URL
    pub api_base: String,

    /// Long-polling timeout in seconds
    pub poll_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Maximum number of concurrently running sessions
    pub max_concurrent_sessions: usize,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("downloads"),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_bytes: 500 * 1024 * 1024, // 500 MiB
            transfer_timeout_seconds: 600,
            connect_timeout_seconds: 30,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16000, // Optimal for Whisper
            ffmpeg_binary: "ffmpeg".to_string(),
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: "https://api.openai.com/v1/audio/transcriptions".to_string(),
            model: "whisper-1".to_string(),
            timeout_seconds: 600,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enable_formatting: true,
            api_key: String::new(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 4096,
            temperature: 0.2,
            timeout_seconds: 120,
            translation_languages: vec!["ru".to_string(), "en".to_string(), "hy".to_string()],
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_base: "https://api.telegram.org".to_string(),
            poll_timeout_seconds: 30,
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sessions: num_cpus::get().min(8),
        }
    }
}

impl Config {
    /// Load configuration: first config file found wins, then environment
    /// variables override on top (secrets normally arrive through the
    /// environment, not the file).
    pub fn load() -> Result<Self> {
        let config_paths = [
            "tele-scribe.toml",
            "config/tele-scribe.toml",
            "~/.config/tele-scribe/config.toml",
            "/etc/tele-scribe/config.toml",
        ];

        let mut config = Self::default();
        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str(&config_str) {
                    Ok(parsed) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        config = parsed;
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        config.apply_env();
        Ok(config)
    }

    /// Load configuration from environment variables alone.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(token) =
            std::env::var("TELEGRAM_BOT_TOKEN").or_else(|_| std::env::var("BOT_TOKEN"))
        {
            self.telegram.bot_token = token;
        }

        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            if self.transcription.api_key.is_empty() {
                self.transcription.api_key = api_key.clone();
            }
            if self.llm.api_key.is_empty() {
                self.llm.api_key = api_key;
            }
        }

        if let Ok(dir) = std::env::var("TELE_SCRIBE_STAGING_DIR") {
            self.staging.root = PathBuf::from(dir);
        }

        if let Ok(max_mb) = std::env::var("TELE_SCRIBE_MAX_DOWNLOAD_MB") {
            if let Ok(mb) = max_mb.parse::<u64>() {
                self.download.max_bytes = mb * 1024 * 1024;
            }
        }

        if let Ok(sessions) = std::env::var("TELE_SCRIBE_SESSIONS") {
            if let Ok(n) = sessions.parse() {
                self.performance.max_concurrent_sessions = n;
            }
        }
    }

    /// Validate configuration before startup.
    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.is_empty() {
            return Err(anyhow!("Telegram bot token is not set (TELEGRAM_BOT_TOKEN)"));
        }

        if self.transcription.api_key.is_empty() {
            return Err(anyhow!("transcription API key is not set (OPENAI_API_KEY)"));
        }

        if self.llm.enable_formatting && self.llm.api_key.is_empty() {
            return Err(anyhow!("text-generation API key is not set (OPENAI_API_KEY)"));
        }

        if self.download.max_bytes == 0 {
            return Err(anyhow!("download.max_bytes must be greater than 0"));
        }

        if self.audio.target_sample_rate == 0 {
            return Err(anyhow!("audio.target_sample_rate must be greater than 0"));
        }

        if self.performance.max_concurrent_sessions == 0 {
            return Err(anyhow!(
                "performance.max_concurrent_sessions must be greater than 0"
            ));
        }

        tracing::info!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary.
    pub fn summary(&self) -> String {
        format!(
            "tele-scribe configuration:\n\
            - Staging dir: {}\n\
            - Download ceiling: {} MiB, timeout: {}s\n\
            - Audio: {}Hz mono via {}\n\
            - Transcription model: {}\n\
            - Formatting enabled: {} (model {})\n\
            - Translation languages: {}\n\
            - Concurrent sessions: {}",
            self.staging.root.display(),
            self.download.max_bytes / (1024 * 1024),
            self.download.transfer_timeout_seconds,
            self.audio.target_sample_rate,
            self.audio.ffmpeg_binary,
            self.transcription.model,
            self.llm.enable_formatting,
            self.llm.model,
            self.llm.translation_languages.join(", "),
            self.performance.max_concurrent_sessions,
        )
    }
}

/// Configuration builder for programmatic config creation.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_staging_root(mut self, root: PathBuf) -> Self {
        self.config.staging.root = root;
        self
    }

    pub fn with_bot_token(mut self, token: String) -> Self {
        self.config.telegram.bot_token = token;
        self
    }

    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.config.transcription.api_key = api_key.clone();
        self.config.llm.api_key = api_key;
        self
    }

    pub fn with_max_download_bytes(mut self, max_bytes: u64) -> Self {
        self.config.download.max_bytes = max_bytes;
        self
    }

    pub fn with_max_concurrent_sessions(mut self, sessions: usize) -> Self {
        self.config.performance.max_concurrent_sessions = sessions;
        self
    }

    pub fn with_translation_languages(mut self, codes: Vec<String>) -> Self {
        self.config.llm.translation_languages = codes;
        self
    }

    pub fn enable_formatting(mut self, enable: bool) -> Self {
        self.config.llm.enable_formatting = enable;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
