use anyhow::Result;
use clap::{Arg, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use tele_scribe::acquire::SourceAcquirer;
use tele_scribe::bot::Bot;
use tele_scribe::config::Config;
use tele_scribe::enrich::{ChatCompletionsApi, TextGen};
use tele_scribe::normalize::AudioNormalizer;
use tele_scribe::pipeline::Pipeline;
use tele_scribe::staging::StagingStore;
use tele_scribe::telegram::TelegramApi;
use tele_scribe::transcribe::WhisperApi;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tele_scribe=info,warn".into()),
        )
        .init();

    let matches = Command::new("tele-scribe")
        .version("0.1.0")
        .about("Telegram speech-to-text bot with LLM post-processing")
        .arg(
            Arg::new("staging-dir")
                .short('d')
                .long("staging-dir")
                .value_name("DIR")
                .help("Scratch directory for transient media files"),
        )
        .arg(
            Arg::new("sessions")
                .short('s')
                .long("sessions")
                .value_name("NUM")
                .help("Maximum number of concurrent sessions"),
        )
        .get_matches();

    // Load configuration
    let mut config = Config::load()?;
    if let Some(dir) = matches.get_one::<String>("staging-dir") {
        config.staging.root = PathBuf::from(dir);
    }
    if let Some(sessions) = matches.get_one::<String>("sessions") {
        config.performance.max_concurrent_sessions = sessions.parse()?;
    }
    config.validate()?;

    info!("🚀 tele-scribe starting...");
    info!("{}", config.summary());

    // Wire up the pipeline
    let store = StagingStore::new(config.staging.root.clone()).await?;
    let acquirer = SourceAcquirer::new(&config.download)?;
    let normalizer = AudioNormalizer::new(&config.audio);
    let speech = Arc::new(WhisperApi::new(config.transcription.clone())?);
    let text_gen: Option<Arc<dyn TextGen>> = if config.llm.enable_formatting {
        Some(Arc::new(ChatCompletionsApi::new(config.llm.clone())?))
    } else {
        None
    };

    let pipeline = Arc::new(Pipeline::new(
        store,
        acquirer,
        normalizer,
        speech,
        text_gen,
        config.llm.translation_languages.clone(),
    ));

    let api = TelegramApi::new(&config.telegram, &config.download)?;
    let bot = Bot::new(&config, api, pipeline);

    bot.run().await
}
