//! Scratch-file management: one isolated workspace per conversion job.
//!
//! Every file a job writes (the staged upload, each rendered page, the
//! archive) lives under a job-specific subdirectory of the process-wide
//! scratch roots:
//!
//! ```text
//! uploads/<job id>/source.pdf
//! output/<job id>/page-1.png … page-N.png
//! output/<job id>/converted_<job id>.zip
//! ```
//!
//! [`JobWorkspace`] is the only component that deletes anything. Paths are
//! registered *before* they are written, so a render task that dies halfway
//! through still leaves a tracked path behind, and a page that never started
//! is simply reported as missing at release time. Release runs in reverse
//! registration order (files before their directories) and happens exactly
//! once: either through [`JobWorkspace::release_all`] or, failing that, on
//! `Drop`.

use crate::config::ServerConfig;
use crate::error::{CleanupError, Pdf2ZipError};
use futures::{Stream, StreamExt};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// File name of the staged upload inside the job's upload directory.
pub const SOURCE_FILE_NAME: &str = "source.pdf";

/// Unique identifier of one conversion job; embedded in every scratch path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    /// Generate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The two process-wide scratch roots shared by all jobs.
#[derive(Debug, Clone)]
pub struct ScratchSpace {
    uploads_root: PathBuf,
    output_root: PathBuf,
}

impl ScratchSpace {
    pub fn new(uploads_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            uploads_root: uploads_root.into(),
            output_root: output_root.into(),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(&config.uploads_dir, &config.output_dir)
    }

    pub fn uploads_root(&self) -> &Path {
        &self.uploads_root
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Create the job's private upload and output directories.
    ///
    /// The roots are created on demand; the per-job directories must not
    /// exist yet, so two jobs can never share one.
    pub async fn open_job(&self, id: JobId) -> Result<JobWorkspace, Pdf2ZipError> {
        let mut workspace = JobWorkspace {
            upload_dir: self.uploads_root.join(id.as_str()),
            output_dir: self.output_root.join(id.as_str()),
            id,
            artifacts: Vec::new(),
        };

        for (root, dir) in [
            (&self.uploads_root, workspace.upload_dir.clone()),
            (&self.output_root, workspace.output_dir.clone()),
        ] {
            tokio::fs::create_dir_all(root)
                .await
                .map_err(|e| Pdf2ZipError::scratch(root, e))?;
            tokio::fs::create_dir(&dir)
                .await
                .map_err(|e| Pdf2ZipError::scratch(&dir, e))?;
            workspace.artifacts.push(Artifact {
                path: dir,
                kind: ArtifactKind::Dir,
            });
        }

        debug!(
            "Opened workspace {} ({} / {})",
            workspace.id,
            workspace.upload_dir.display(),
            workspace.output_dir.display()
        );
        Ok(workspace)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArtifactKind {
    File,
    Dir,
}

#[derive(Debug)]
struct Artifact {
    path: PathBuf,
    kind: ArtifactKind,
}

/// What happened when one artifact was released.
#[derive(Debug)]
pub enum CleanupOutcome {
    /// The file or directory was removed.
    Deleted,
    /// Nothing was on disk (e.g. a page that never rendered).
    Missing,
    /// The path does not belong to this workspace; nothing was touched.
    Untracked,
    /// Deletion failed; already logged.
    Failed(CleanupError),
}

/// Summary of a [`JobWorkspace::release_all`] pass.
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub deleted: usize,
    pub missing: usize,
    pub failed: Vec<CleanupError>,
}

impl CleanupReport {
    /// `true` when every tracked artifact is gone from disk.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Arena of every scratch artifact created on behalf of one job.
#[derive(Debug)]
pub struct JobWorkspace {
    id: JobId,
    upload_dir: PathBuf,
    output_dir: PathBuf,
    artifacts: Vec<Artifact>,
}

impl JobWorkspace {
    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Where the staged upload lives.
    pub fn source_path(&self) -> PathBuf {
        self.upload_dir.join(SOURCE_FILE_NAME)
    }

    /// Where the sealed archive lives.
    pub fn archive_path(&self) -> PathBuf {
        self.output_dir.join(format!("converted_{}.zip", self.id))
    }

    /// Take ownership of `path` so it is deleted when the job ends.
    ///
    /// Registering the same path twice is a no-op.
    pub fn register(&mut self, path: impl Into<PathBuf>) -> PathBuf {
        let path = path.into();
        if !self.is_tracked(&path) {
            self.artifacts.push(Artifact {
                path: path.clone(),
                kind: ArtifactKind::File,
            });
        }
        path
    }

    pub fn is_tracked(&self, path: &Path) -> bool {
        self.artifacts.iter().any(|a| a.path == path)
    }

    /// Paths still owned by this workspace, in registration order.
    pub fn artifacts(&self) -> impl Iterator<Item = &Path> {
        self.artifacts.iter().map(|a| a.path.as_path())
    }

    /// Persist an uploaded document, chunk by chunk, as the job's source file.
    ///
    /// A stream error means the client's body was unreadable, so it is
    /// reported as [`Pdf2ZipError::UploadFailed`]; local write errors are
    /// [`Pdf2ZipError::ScratchIo`].
    pub async fn stage<S, B, E>(&mut self, chunks: S) -> Result<PathBuf, Pdf2ZipError>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: fmt::Display,
    {
        let path = self.register(self.source_path());
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| Pdf2ZipError::scratch(&path, e))?;

        let mut chunks = std::pin::pin!(chunks);
        let mut written: u64 = 0;
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(|e| Pdf2ZipError::UploadFailed {
                reason: e.to_string(),
            })?;
            let bytes = chunk.as_ref();
            file.write_all(bytes)
                .await
                .map_err(|e| Pdf2ZipError::scratch(&path, e))?;
            written += bytes.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| Pdf2ZipError::scratch(&path, e))?;

        info!("Staged upload for job {}: {} bytes", self.id, written);
        Ok(path)
    }

    /// Stage an in-memory document.
    pub async fn stage_bytes(&mut self, bytes: &[u8]) -> Result<PathBuf, Pdf2ZipError> {
        let once = futures::stream::once(async move { Ok::<_, std::convert::Infallible>(bytes) });
        self.stage(once).await
    }

    /// Delete one tracked artifact. Failures are logged, never raised.
    pub fn release(&mut self, path: &Path) -> CleanupOutcome {
        match self.artifacts.iter().position(|a| a.path == path) {
            Some(idx) => {
                let artifact = self.artifacts.remove(idx);
                remove_artifact(&artifact)
            }
            None => {
                warn!(
                    "Refusing to delete '{}': not owned by job {}",
                    path.display(),
                    self.id
                );
                CleanupOutcome::Untracked
            }
        }
    }

    /// Delete every tracked artifact, newest first, continuing past failures.
    pub fn release_all(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();
        while let Some(artifact) = self.artifacts.pop() {
            match remove_artifact(&artifact) {
                CleanupOutcome::Deleted => report.deleted += 1,
                CleanupOutcome::Missing => report.missing += 1,
                CleanupOutcome::Failed(e) => report.failed.push(e),
                CleanupOutcome::Untracked => {}
            }
        }
        debug!(
            "Released job {}: {} deleted, {} missing, {} failed",
            self.id,
            report.deleted,
            report.missing,
            report.failed.len()
        );
        report
    }
}

impl JobWorkspace {
    /// Release every artifact on the blocking pool, consuming the workspace.
    ///
    /// Terminal paths use this; `Drop` remains the synchronous fallback.
    pub async fn close(self) -> CleanupReport {
        let id = self.id.clone();
        let mut workspace = self;
        match tokio::task::spawn_blocking(move || workspace.release_all()).await {
            Ok(report) => report,
            Err(e) => {
                warn!("Cleanup task for job {} failed: {}", id, e);
                CleanupReport::default()
            }
        }
    }
}

impl Drop for JobWorkspace {
    fn drop(&mut self) {
        if !self.artifacts.is_empty() {
            debug!("Workspace {} dropped while holding artifacts", self.id);
            self.release_all();
        }
    }
}

fn remove_artifact(artifact: &Artifact) -> CleanupOutcome {
    let result = match artifact.kind {
        ArtifactKind::File => std::fs::remove_file(&artifact.path),
        ArtifactKind::Dir => std::fs::remove_dir(&artifact.path),
    };
    match result {
        Ok(()) => CleanupOutcome::Deleted,
        Err(e) if e.kind() == ErrorKind::NotFound => CleanupOutcome::Missing,
        Err(e) => {
            let err = CleanupError {
                path: artifact.path.clone(),
                detail: e.to_string(),
            };
            warn!("{}", err);
            CleanupOutcome::Failed(err)
        }
    }
}
