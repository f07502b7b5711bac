//! Ephemeral audio files: uploads awaiting transcription and synthesized replies.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/uploads/<uuid>.wav   deleted right after transcription (UploadGuard)
//! <root>/outputs/<uuid>.mp3   kept for the client to fetch; removed by a later sweep
//! ```
//!
//! Names are random v4 UUIDs, so concurrent requests never collide and outputs cannot be
//! enumerated. `outputs/` is shared between requests: a sweep can remove another request's
//! reply before its client fetched it. That fetch then reports not-found.

use crate::error::{VoiceError, VoiceResult};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};
use uuid::Uuid;

/// What an ephemeral file is for; decides its directory and extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilePurpose {
    Upload,
    Output,
}

impl FilePurpose {
    pub fn dir_name(self) -> &'static str {
        match self {
            FilePurpose::Upload => "uploads",
            FilePurpose::Output => "outputs",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            FilePurpose::Upload => "wav",
            FilePurpose::Output => "mp3",
        }
    }
}

/// A file owned by one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EphemeralAudioFile {
    /// File name (`<uuid>.<ext>`); doubles as the opaque public reference for outputs.
    pub id: String,
    pub path: PathBuf,
    pub purpose: FilePurpose,
    pub created_at: DateTime<Utc>,
}

/// Owns the `uploads/` and `outputs/` directories under one root.
#[derive(Debug, Clone)]
pub struct EphemeralStore {
    root: PathBuf,
}

impl EphemeralStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn dir(&self, purpose: FilePurpose) -> PathBuf {
        self.root.join(purpose.dir_name())
    }

    /// Reserve a fresh unique path for `purpose`, creating its directory. The file itself
    /// is not created.
    pub async fn allocate(&self, purpose: FilePurpose) -> VoiceResult<EphemeralAudioFile> {
        let dir = self.dir(purpose);
        tokio::fs::create_dir_all(&dir).await?;
        let id = format!("{}.{}", Uuid::new_v4(), purpose.extension());
        let path = dir.join(&id);
        debug!(target: "parley::files", path = %path.display(), "Allocated ephemeral file");
        Ok(EphemeralAudioFile {
            id,
            path,
            purpose,
            created_at: Utc::now(),
        })
    }

    /// Allocate an upload and write `bytes` into it. The returned guard deletes the file
    /// when dropped.
    pub async fn persist_upload(&self, bytes: &[u8]) -> VoiceResult<UploadGuard> {
        let file = self.allocate(FilePurpose::Upload).await?;
        let guard = UploadGuard { file: Some(file) };
        tokio::fs::write(guard.path(), bytes).await?;
        Ok(guard)
    }

    /// Allocate an output path wrapped in a guard that removes it unless committed.
    pub async fn allocate_output(&self) -> VoiceResult<OutputGuard> {
        let file = self.allocate(FilePurpose::Output).await?;
        Ok(OutputGuard { file: Some(file) })
    }

    /// Best-effort delete. Failures are logged, never returned; a missing file counts as
    /// released. Blocking; async paths use [`discard`](Self::discard).
    pub fn release(path: &Path) -> bool {
        cleanup_outcome(path, std::fs::remove_file(path))
    }

    /// Async counterpart of [`release`](Self::release).
    pub async fn discard(path: &Path) -> bool {
        cleanup_outcome(path, tokio::fs::remove_file(path).await)
    }

    /// Delete every `purpose` file in its directory. Returns how many were removed.
    pub async fn sweep(&self, purpose: FilePurpose) -> usize {
        self.sweep_older_than(purpose, Duration::ZERO).await
    }

    /// Like [`sweep`](Self::sweep) but keeps files modified less than `min_age` ago.
    pub async fn sweep_older_than(&self, purpose: FilePurpose, min_age: Duration) -> usize {
        let dir = self.dir(purpose);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
            Err(e) => {
                warn!(target: "parley::files", "Cannot read {}: {}", dir.display(), e);
                return 0;
            }
        };

        let now = SystemTime::now();
        let mut removed = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(target: "parley::files", "Sweep of {} interrupted: {}", dir.display(), e);
                    break;
                }
            };
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(purpose.extension()) {
                continue;
            }
            if !min_age.is_zero() {
                let age = entry
                    .metadata()
                    .await
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .and_then(|m| now.duration_since(m).ok())
                    .unwrap_or_default();
                if age < min_age {
                    continue;
                }
            }
            if Self::discard(&path).await {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(target: "parley::files", removed, dir = %dir.display(), "Swept ephemeral files");
        }
        removed
    }

    /// Path of a served output given its opaque id (`<uuid>.mp3` or bare `<uuid>`).
    ///
    /// Anything that is not a canonical UUID, or no longer on disk, is `OutputNotFound`.
    pub async fn resolve_output(&self, id: &str) -> VoiceResult<PathBuf> {
        let ext = FilePurpose::Output.extension();
        let stem = id
            .strip_suffix(ext)
            .and_then(|s| s.strip_suffix('.'))
            .unwrap_or(id);
        let canonical = Uuid::parse_str(stem)
            .ok()
            .map(|u| u.hyphenated().to_string())
            .filter(|c| c == stem)
            .ok_or_else(|| VoiceError::OutputNotFound(id.to_string()))?;
        let path = self.dir(FilePurpose::Output).join(format!("{}.{}", canonical, ext));
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            _ => Err(VoiceError::OutputNotFound(id.to_string())),
        }
    }
}

fn cleanup_outcome(path: &Path, removed: std::io::Result<()>) -> bool {
    match removed {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(source) => {
            let err = VoiceError::FileCleanupFailed {
                path: path.to_path_buf(),
                source,
            };
            warn!(target: "parley::files", "{}", err);
            false
        }
    }
}

/// Upload file that is deleted when the guard goes out of scope, including when the
/// owning request future is dropped mid-flight.
#[derive(Debug)]
pub struct UploadGuard {
    file: Option<EphemeralAudioFile>,
}

impl UploadGuard {
    pub fn path(&self) -> &Path {
        self.file.as_ref().map(|f| f.path.as_path()).unwrap_or(Path::new(""))
    }

    /// Delete now instead of at drop.
    pub async fn release(mut self) -> bool {
        match self.file.take() {
            Some(f) => EphemeralStore::discard(&f.path).await,
            None => true,
        }
    }
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        if let Some(f) = self.file.take() {
            EphemeralStore::release(&f.path);
        }
    }
}

/// Output path that is removed on drop unless [`commit`](Self::commit)ted once synthesis
/// has fully completed.
#[derive(Debug)]
pub struct OutputGuard {
    file: Option<EphemeralAudioFile>,
}

impl OutputGuard {
    pub fn path(&self) -> &Path {
        self.file.as_ref().map(|f| f.path.as_path()).unwrap_or(Path::new(""))
    }

    /// Keep the file; the caller now hands its id to the client.
    pub fn commit(mut self) -> Option<EphemeralAudioFile> {
        self.file.take()
    }
}

impl Drop for OutputGuard {
    fn drop(&mut self) {
        if let Some(f) = self.file.take() {
            EphemeralStore::release(&f.path);
        }
    }
}
