use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::classify::MediaKind;
use crate::config::AudioConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::staging::StagedFile;

/// Produces the canonical transcription input: mono WAV at the target
/// sample rate.
#[derive(Debug, Clone)]
pub struct AudioNormalizer {
    /// Sample rate the transcription backend expects.
    pub target_sample_rate: u32,
    ffmpeg_binary: String,
}

impl AudioNormalizer {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            target_sample_rate: config.target_sample_rate,
            ffmpeg_binary: config.ffmpeg_binary.clone(),
        }
    }

    /// Canonical-artifact path for a staged input: the staged name with a
    /// `.wav` suffix appended, alongside the input.
    pub fn canonical_path(input: &Path) -> PathBuf {
        let mut name = input.as_os_str().to_owned();
        name.push(".wav");
        PathBuf::from(name)
    }

    /// Turn a staged file into the canonical audio artifact.
    ///
    /// Already-audio inputs are renamed onto the canonical path without
    /// re-encoding; everything else goes through ffmpeg. On failure any
    /// partially written artifact is removed before the error propagates, so
    /// the caller only ever has to release the paths it knows about.
    pub async fn normalize(
        &self,
        input: &StagedFile,
        kind: MediaKind,
    ) -> PipelineResult<StagedFile> {
        let output = Self::canonical_path(&input.path);

        match kind {
            MediaKind::AlreadyAudio => {
                debug!("🎵 Input is already audio, renaming to {}", output.display());
                tokio::fs::rename(&input.path, &output)
                    .await
                    .map_err(|e| PipelineError::Transcode(format!("rename failed: {}", e)))?;
            }
            MediaKind::NeedsExtraction => {
                info!("🎵 Extracting audio: {}", input.path.display());
                if let Err(e) = self.transcode(&input.path, &output).await {
                    let _ = tokio::fs::remove_file(&output).await;
                    return Err(e);
                }
            }
        }

        Ok(StagedFile::new(output))
    }

    async fn transcode(&self, input: &Path, output: &Path) -> PipelineResult<()> {
        let result = tokio::process::Command::new(&self.ffmpeg_binary)
            .args(self.ffmpeg_args(input, output))
            .output()
            .await
            .map_err(|e| {
                PipelineError::Transcode(format!("cannot run {}: {}", self.ffmpeg_binary, e))
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            // ffmpeg puts the actionable diagnostic on the last lines.
            let diagnostic = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("unknown ffmpeg failure")
                .to_string();
            return Err(PipelineError::Transcode(diagnostic));
        }

        debug!("✅ Audio extracted: {}", output.display());
        Ok(())
    }

    fn ffmpeg_args(&self, input: &Path, output: &Path) -> Vec<String> {
        vec![
            "-i".into(),
            input.to_string_lossy().into_owned(),
            "-vn".into(),
            "-acodec".into(),
            "pcm_s16le".into(),
            "-ar".into(),
            self.target_sample_rate.to_string(),
            "-ac".into(),
            "1".into(),
            "-f".into(),
            "wav".into(),
            "-y".into(),
            output.to_string_lossy().into_owned(),
        ]
    }
}
