//! Remote-acquisition tests against a local HTTP server: byte ceilings,
//! partial-file cleanup and error classification.

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::path::Path;
use tempfile::TempDir;

use tele_scribe::acquire::{InputDescriptor, SourceAcquirer};
use tele_scribe::config::DownloadConfig;
use tele_scribe::error::{PipelineError, PipelineResult};
use tele_scribe::staging::StagingStore;
use tele_scribe::telegram::{ChatTransport, InlineButton};

/// Transport stub: remote acquisition must never touch the upload path.
struct NoUploads;

#[async_trait]
impl ChatTransport for NoUploads {
    async fn send_message(
        &self,
        _chat_id: i64,
        _text: &str,
        _buttons: Option<&[InlineButton]>,
    ) -> PipelineResult<()> {
        Ok(())
    }

    async fn resolve_file(&self, _file_id: &str) -> PipelineResult<String> {
        unreachable!("remote fetch resolved an upload handle")
    }

    async fn download_to_path(&self, _url: &str, _dest: &Path) -> PipelineResult<()> {
        unreachable!("remote fetch delegated to the transport")
    }
}

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn test_routes() -> Router {
    Router::new()
        .route("/media.mp3", get(|| async { b"tiny audio payload".to_vec() }))
        // 4 KiB with a Content-Length header.
        .route("/declared-big", get(|| async { vec![0u8; 4096] }))
        // 16 KiB streamed in chunks, no Content-Length.
        .route(
            "/streamed-big",
            get(|| async {
                let chunks = futures::stream::iter(
                    (0..64).map(|_| Ok::<_, std::io::Error>(Bytes::from(vec![0u8; 256]))),
                );
                Response::new(Body::from_stream(chunks))
            }),
        )
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(std::time::Duration::from_secs(30)).await;
                "too late".to_string()
            }),
        )
}

fn small_ceiling() -> DownloadConfig {
    DownloadConfig {
        max_bytes: 1024,
        transfer_timeout_seconds: 5,
        connect_timeout_seconds: 5,
    }
}

fn remote(addr: SocketAddr, path: &str) -> InputDescriptor {
    InputDescriptor::Remote {
        url: format!("http://{}{}", addr, path),
    }
}

async fn assert_scratch_empty(scratch: &Path) {
    let mut entries = tokio::fs::read_dir(scratch).await.unwrap();
    let mut leaked = Vec::new();
    while let Some(entry) = entries.next_entry().await.unwrap() {
        leaked.push(entry.path());
    }
    assert!(leaked.is_empty(), "leaked staged files: {:?}", leaked);
}

#[tokio::test]
async fn test_remote_fetch_stages_the_complete_file() {
    let addr = serve(test_routes()).await;
    let scratch = TempDir::new().unwrap();
    let store = StagingStore::new(scratch.path().to_path_buf()).await.unwrap();
    let acquirer = SourceAcquirer::new(&small_ceiling()).unwrap();

    let staged = acquirer
        .fetch(&remote(addr, "/media.mp3"), &store, &NoUploads)
        .await
        .unwrap();

    let contents = tokio::fs::read(&staged.path).await.unwrap();
    assert_eq!(contents, b"tiny audio payload");
    assert!(staged
        .path
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("remote_file"));

    store.release(&staged.path).await;
    assert_scratch_empty(scratch.path()).await;
}

#[tokio::test]
async fn test_declared_oversize_is_rejected_before_transfer() {
    let addr = serve(test_routes()).await;
    let scratch = TempDir::new().unwrap();
    let store = StagingStore::new(scratch.path().to_path_buf()).await.unwrap();
    let acquirer = SourceAcquirer::new(&small_ceiling()).unwrap();

    let err = acquirer
        .fetch(&remote(addr, "/declared-big"), &store, &NoUploads)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::QuotaExceeded { limit_bytes: 1024 }));
    assert_scratch_empty(scratch.path()).await;
}

#[tokio::test]
async fn test_streamed_oversize_aborts_and_removes_the_partial_file() {
    let addr = serve(test_routes()).await;
    let scratch = TempDir::new().unwrap();
    let store = StagingStore::new(scratch.path().to_path_buf()).await.unwrap();
    let acquirer = SourceAcquirer::new(&small_ceiling()).unwrap();

    let err = acquirer
        .fetch(&remote(addr, "/streamed-big"), &store, &NoUploads)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::QuotaExceeded { .. }));
    // The partial file written before the ceiling was hit must be gone.
    assert_scratch_empty(scratch.path()).await;
}

#[tokio::test]
async fn test_http_error_status_is_a_transport_error() {
    let addr = serve(test_routes()).await;
    let scratch = TempDir::new().unwrap();
    let store = StagingStore::new(scratch.path().to_path_buf()).await.unwrap();
    let acquirer = SourceAcquirer::new(&small_ceiling()).unwrap();

    let err = acquirer
        .fetch(&remote(addr, "/missing"), &store, &NoUploads)
        .await
        .unwrap_err();

    match err {
        PipelineError::Transport(msg) => assert!(msg.contains("404")),
        other => panic!("expected transport error, got {:?}", other),
    }
    assert_scratch_empty(scratch.path()).await;
}

#[tokio::test]
async fn test_stalled_transfer_times_out_as_a_transport_error() {
    let addr = serve(test_routes()).await;
    let scratch = TempDir::new().unwrap();
    let store = StagingStore::new(scratch.path().to_path_buf()).await.unwrap();
    let acquirer = SourceAcquirer::new(&DownloadConfig {
        transfer_timeout_seconds: 1,
        ..small_ceiling()
    })
    .unwrap();

    let err = acquirer
        .fetch(&remote(addr, "/slow"), &store, &NoUploads)
        .await
        .unwrap_err();

    match err {
        PipelineError::Transport(msg) => assert!(msg.contains("timed out")),
        other => panic!("expected timeout as transport error, got {:?}", other),
    }
    assert_scratch_empty(scratch.path()).await;
}

#[tokio::test]
async fn test_quota_breach_in_a_full_session_reports_and_cleans_up() {
    use std::sync::Arc;
    use tele_scribe::config::AudioConfig;
    use tele_scribe::normalize::AudioNormalizer;
    use tele_scribe::pipeline::{Pipeline, SessionOutcome, Stage};
    use tele_scribe::transcribe::SpeechToText;
    use tokio::sync::Mutex;

    struct RecordingTransport {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatTransport for RecordingTransport {
        async fn send_message(
            &self,
            _chat_id: i64,
            text: &str,
            _buttons: Option<&[InlineButton]>,
        ) -> PipelineResult<()> {
            self.sent.lock().await.push(text.to_string());
            Ok(())
        }

        async fn resolve_file(&self, _file_id: &str) -> PipelineResult<String> {
            unreachable!()
        }

        async fn download_to_path(&self, _url: &str, _dest: &Path) -> PipelineResult<()> {
            unreachable!()
        }
    }

    struct NoSpeech;

    #[async_trait]
    impl SpeechToText for NoSpeech {
        async fn transcribe(&self, _audio_path: &Path) -> PipelineResult<String> {
            unreachable!("an oversize download must never reach transcription")
        }
    }

    let addr = serve(test_routes()).await;
    let scratch = TempDir::new().unwrap();
    let pipeline = Pipeline::new(
        StagingStore::new(scratch.path().to_path_buf()).await.unwrap(),
        SourceAcquirer::new(&small_ceiling()).unwrap(),
        AudioNormalizer::new(&AudioConfig::default()),
        Arc::new(NoSpeech),
        None,
        Vec::new(),
    );

    let transport = RecordingTransport {
        sent: Mutex::new(Vec::new()),
    };
    let outcome = pipeline
        .run(1, remote(addr, "/streamed-big"), &transport)
        .await;

    match outcome {
        SessionOutcome::Failed { stage, error } => {
            assert_eq!(stage, Stage::Acquiring);
            assert!(matches!(error, PipelineError::QuotaExceeded { .. }));
        }
        other => panic!("expected quota failure, got {:?}", other),
    }

    let sent = transport.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("limit"));
    drop(sent);

    assert_scratch_empty(scratch.path()).await;
}

#[tokio::test]
async fn test_concurrent_remote_fetches_do_not_collide() {
    let addr = serve(test_routes()).await;
    let scratch = TempDir::new().unwrap();
    let store = StagingStore::new(scratch.path().to_path_buf()).await.unwrap();
    let acquirer = SourceAcquirer::new(&small_ceiling()).unwrap();

    // Both descriptors share the `remote_file` staging hint; the store must
    // keep their paths apart.
    let desc_a = remote(addr, "/media.mp3");
    let desc_b = remote(addr, "/media.mp3");
    let (a, b) = tokio::join!(
        acquirer.fetch(&desc_a, &store, &NoUploads),
        acquirer.fetch(&desc_b, &store, &NoUploads),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_ne!(a.path, b.path);
    assert_eq!(tokio::fs::read(&a.path).await.unwrap(), b"tiny audio payload");
    assert_eq!(tokio::fs::read(&b.path).await.unwrap(), b"tiny audio payload");

    store.release(&a.path).await;
    store.release(&b.path).await;
    assert_scratch_empty(scratch.path()).await;
}
