use std::path::Path;
use tracing::debug;

/// Outcome of inspecting a staged file before normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// The file is already in an audio container; transcoding is skipped.
    AlreadyAudio,
    /// The file needs its audio track extracted.
    NeedsExtraction,
}

/// Decide whether a staged file is already audio or needs extraction.
///
/// The decision is made from the file name alone (no content probing): a
/// guessed `audio/*` type means [`MediaKind::AlreadyAudio`], everything
/// else — video, documents, or no recognizable extension — falls through to
/// extraction, which handles audio-bearing containers anyway.
pub fn classify(path: &Path) -> MediaKind {
    let kind = match mime_guess::from_path(path).first() {
        Some(mime) if mime.type_() == mime_guess::mime::AUDIO => MediaKind::AlreadyAudio,
        _ => MediaKind::NeedsExtraction,
    };
    debug!("🔎 Classified {} as {:?}", path.display(), kind);
    kind
}
