use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A file living inside a [`StagingStore`]'s scratch directory.
///
/// The path is owned by the store that allocated it; nothing outside the
/// session's cleanup step may delete it.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl StagedFile {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            created_at: Utc::now(),
        }
    }
}

/// Scratch-directory manager for transient pipeline files.
///
/// Allocated paths are unique across concurrent sessions: each allocation
/// reserves its path on disk, and hints that collide with a live session's
/// file get a random suffix appended.
#[derive(Debug, Clone)]
pub struct StagingStore {
    root: PathBuf,
}

impl StagingStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub async fn new(root: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Allocate a unique path inside the store derived from `hint`.
    ///
    /// The path is reserved by creating an empty file, so no two concurrent
    /// sessions can ever be handed the same path, even with an identical
    /// hint. The caller overwrites the reservation with real content and is
    /// responsible for calling [`release`](Self::release) on it exactly once
    /// when the session ends.
    pub async fn allocate(&self, hint: &str) -> Result<PathBuf> {
        let name = sanitize_file_name(hint);
        let candidate = self.root.join(&name);
        if reserve(&candidate).await? {
            debug!("📦 Allocated staging path: {}", candidate.display());
            return Ok(candidate);
        }

        // Hint collided with a live session's file; disambiguate.
        loop {
            let suffix = uuid::Uuid::new_v4().simple().to_string();
            let unique = self.root.join(format!("{}_{}", name, &suffix[..8]));
            if reserve(&unique).await? {
                debug!("📦 Allocated staging path (suffixed): {}", unique.display());
                return Ok(unique);
            }
        }
    }

    /// Delete the file at `path` if present. Already-missing files are fine;
    /// any other failure is logged and swallowed so cleanup never masks the
    /// session's real outcome.
    pub async fn release(&self, path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!("🧹 Released staged file: {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to release staged file {}: {}", path.display(), e),
        }
    }
}

/// Atomically claim `path` by creating it; false means someone else holds it.
async fn reserve(path: &Path) -> Result<bool> {
    match tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
    {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Reduce an arbitrary hint to a safe flat file name.
///
/// Path separators and parent components are stripped so a hostile hint
/// cannot escape the scratch directory.
fn sanitize_file_name(hint: &str) -> String {
    let base = hint
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(hint)
        .trim_matches('.');

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        format!("file_{}", &uuid::Uuid::new_v4().simple().to_string()[..8])
    } else {
        cleaned
    }
}
