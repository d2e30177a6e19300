use futures::StreamExt;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;

use crate::config::DownloadConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::staging::{StagedFile, StagingStore};
use crate::telegram::ChatTransport;

/// Where a session's media comes from. Immutable once constructed.
#[derive(Debug, Clone)]
pub enum InputDescriptor {
    /// A file uploaded through the chat transport.
    Upload {
        file_id: String,
        file_unique_id: String,
        file_name: Option<String>,
    },
    /// A remote http(s) URL sent as message text.
    Remote { url: String },
}

impl InputDescriptor {
    /// Staging-name hint: the declared filename when the upload has one
    /// (classification needs the extension), otherwise the unique id.
    fn staging_hint(&self) -> &str {
        match self {
            InputDescriptor::Upload {
                file_unique_id,
                file_name,
                ..
            } => file_name.as_deref().unwrap_or(file_unique_id),
            InputDescriptor::Remote { .. } => "remote_file",
        }
    }
}

/// Obtains raw bytes for an input descriptor and stages them.
///
/// Remote transfers are streamed chunk-by-chunk (the body is never buffered
/// whole) under a byte ceiling and a transfer timeout. A failed fetch never
/// leaves a partial file behind.
#[derive(Clone)]
pub struct SourceAcquirer {
    client: Client,
    max_bytes: u64,
    transfer_timeout: Duration,
}

impl SourceAcquirer {
    pub fn new(config: &DownloadConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            max_bytes: config.max_bytes,
            transfer_timeout: Duration::from_secs(config.transfer_timeout_seconds),
        })
    }

    /// Fetch the descriptor's bytes into a staged file.
    pub async fn fetch(
        &self,
        descriptor: &InputDescriptor,
        store: &StagingStore,
        transport: &dyn ChatTransport,
    ) -> PipelineResult<StagedFile> {
        let path = store
            .allocate(descriptor.staging_hint())
            .await
            .map_err(|e| PipelineError::Transport(format!("cannot stage file: {}", e)))?;

        let result = match descriptor {
            InputDescriptor::Upload { file_id, .. } => {
                let url = transport.resolve_file(file_id).await?;
                debug!("📥 Downloading upload {} to {}", file_id, path.display());
                transport.download_to_path(&url, &path).await
            }
            InputDescriptor::Remote { url } => self.fetch_remote(url, &path).await,
        };

        match result {
            Ok(()) => {
                info!("📥 Staged {}", path.display());
                Ok(StagedFile::new(path))
            }
            Err(e) => {
                // The download helpers already removed any partial file, but
                // release again so no exit path can leak it.
                store.release(&path).await;
                Err(e)
            }
        }
    }

    async fn fetch_remote(&self, url_str: &str, dest: &Path) -> PipelineResult<()> {
        let url = validate_remote_url(url_str)?;

        debug!("🌐 Fetching remote URL: {}", url);
        download_with_limits(
            &self.client,
            url.as_str(),
            dest,
            self.max_bytes,
            self.transfer_timeout,
        )
        .await
    }
}

/// Stream `url`'s response body into `dest` under a byte ceiling and an
/// overall transfer timeout.
///
/// On any failure — ceiling breach, timeout, connection or write error —
/// the partially written file is removed before the error is returned.
pub(crate) async fn download_with_limits(
    client: &Client,
    url: &str,
    dest: &Path,
    max_bytes: u64,
    transfer_timeout: Duration,
) -> PipelineResult<()> {
    let result = tokio::time::timeout(transfer_timeout, stream_to_file(client, url, dest, max_bytes))
        .await
        .unwrap_or_else(|_| Err(PipelineError::Transport("transfer timed out".into())));

    if result.is_err() {
        let _ = tokio::fs::remove_file(dest).await;
    }
    result
}

async fn stream_to_file(
    client: &Client,
    url: &str,
    dest: &Path,
    max_bytes: u64,
) -> PipelineResult<()> {
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| PipelineError::Transport(e.to_string()))?;

    if !resp.status().is_success() {
        return Err(PipelineError::Transport(format!(
            "HTTP {} from {}",
            resp.status(),
            url
        )));
    }

    // Refuse before transferring anything when the server declares a size.
    if let Some(len) = resp.content_length() {
        if len > max_bytes {
            return Err(PipelineError::QuotaExceeded {
                limit_bytes: max_bytes,
            });
        }
    }

    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| PipelineError::Transport(format!("cannot create staged file: {}", e)))?;

    let mut stream = resp.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let bytes = chunk.map_err(|e| PipelineError::Transport(e.to_string()))?;
        written += bytes.len() as u64;
        if written > max_bytes {
            return Err(PipelineError::QuotaExceeded {
                limit_bytes: max_bytes,
            });
        }
        file.write_all(&bytes)
            .await
            .map_err(|e| PipelineError::Transport(e.to_string()))?;
    }

    file.flush()
        .await
        .map_err(|e| PipelineError::Transport(e.to_string()))?;

    debug!("🌐 Downloaded {} bytes to {}", written, dest.display());
    Ok(())
}

/// Parse and validate a remote URL before any network activity: only http
/// and https schemes are accepted.
fn validate_remote_url(url_str: &str) -> PipelineResult<Url> {
    let url = Url::parse(url_str)
        .map_err(|_| PipelineError::Validation("that doesn't look like a valid link".into()))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(PipelineError::Validation(format!(
            "only http(s) links are supported, not {}://",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_http_scheme_is_rejected() {
        let err = validate_remote_url("ftp://example.com/a.mp3").unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));

        let err = validate_remote_url("not a url at all").unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[test]
    fn test_http_and_https_pass_validation() {
        assert!(validate_remote_url("http://example.com/a.mp3").is_ok());
        assert!(validate_remote_url("https://example.com/talk.mp4").is_ok());
    }

    #[test]
    fn test_staging_hint_prefers_declared_filename() {
        let upload = InputDescriptor::Upload {
            file_id: "F1".into(),
            file_unique_id: "AgADBAAD".into(),
            file_name: Some("lecture.mp4".into()),
        };
        assert_eq!(upload.staging_hint(), "lecture.mp4");

        let voice = InputDescriptor::Upload {
            file_id: "F2".into(),
            file_unique_id: "AgADxyz".into(),
            file_name: None,
        };
        assert_eq!(voice.staging_hint(), "AgADxyz");

        let remote = InputDescriptor::Remote {
            url: "https://example.com/talk.mp4".into(),
        };
        assert_eq!(remote.staging_hint(), "remote_file");
    }
}
