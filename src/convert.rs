//! Job orchestration: inspect → render → package, with cleanup on failure.
//!
//! [`Converter`] drives one [`ConversionJob`] through its lifecycle against a
//! [`JobWorkspace`]. On success it hands back a [`PreparedArchive`], which
//! still owns the workspace: the archive is deleted only after it has been
//! streamed ([`PreparedArchive::into_download`]) or copied out
//! ([`PreparedArchive::persist`]). On failure the workspace is released
//! before the error is returned.

use crate::config::ConversionConfig;
use crate::error::Pdf2ZipError;
use crate::job::{ArchiveHandle, ConversionJob, JobState};
use crate::pipeline::backend::{PdfiumBackend, RasterBackend};
use crate::pipeline::render::PageRenderOptions;
use crate::pipeline::{fanout, inspect, package};
use crate::workspace::{CleanupReport, JobId, JobWorkspace, ScratchSpace};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};

/// Converts staged documents into sealed archives.
#[derive(Clone)]
pub struct Converter {
    backend: Arc<dyn RasterBackend>,
    config: ConversionConfig,
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("backend", &"<dyn RasterBackend>")
            .field("config", &self.config)
            .finish()
    }
}

impl Converter {
    pub fn new(backend: Arc<dyn RasterBackend>, config: ConversionConfig) -> Self {
        Self { backend, config }
    }

    /// Converter backed by pdfium, failing fast if the library cannot be bound.
    pub fn with_pdfium(
        library_dir: Option<PathBuf>,
        config: ConversionConfig,
    ) -> Result<Self, Pdf2ZipError> {
        let backend = PdfiumBackend::bind(library_dir.as_deref())?;
        Ok(Self::new(Arc::new(backend), config))
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Run a staged job to a sealed archive.
    ///
    /// `job.source` must point at the staged upload inside `workspace`.
    /// Every failure releases the workspace before returning.
    pub async fn process(
        &self,
        mut job: ConversionJob,
        mut workspace: JobWorkspace,
    ) -> Result<PreparedArchive, Pdf2ZipError> {
        let started = Instant::now();
        match self.run_stages(&mut job, &mut workspace).await {
            Ok(archive) => {
                info!(
                    "Job {} packaged {} pages in {}ms",
                    job.id,
                    archive.entries.len(),
                    started.elapsed().as_millis()
                );
                job.archive = Some(archive.clone());
                Ok(PreparedArchive {
                    job,
                    archive,
                    workspace,
                })
            }
            Err(e) => {
                warn!("Job {} failed in state {}: {}", job.id, job.state(), e);
                job.fail();
                let report = workspace.close().await;
                log_cleanup(&job.id, &report);
                // Failed → Cleaned is always legal.
                let _ = job.advance(JobState::Cleaned);
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        job: &mut ConversionJob,
        workspace: &mut JobWorkspace,
    ) -> Result<ArchiveHandle, Pdf2ZipError> {
        let source = job
            .source
            .clone()
            .ok_or_else(|| Pdf2ZipError::Internal(format!("job {} has no staged source", job.id)))?;

        // ── Received → Inspected ─────────────────────────────────────────
        let page_count = inspect::inspect(&self.backend, &source).await?;
        job.page_count = Some(page_count);
        job.advance(JobState::Inspected)?;

        // ── Inspected → Rendering ────────────────────────────────────────
        job.advance(JobState::Rendering)?;
        let options = PageRenderOptions::from_config(&self.config, workspace.output_dir());
        let batch = fanout::render_all(
            &self.backend,
            workspace,
            &source,
            page_count,
            &options,
            self.config.concurrency,
        )
        .await;
        job.pages = batch.pages;
        if let Some(e) = batch.first_failure {
            return Err(e);
        }
        job.ensure_complete()?;

        // ── Rendering → Packaging ────────────────────────────────────────
        job.advance(JobState::Packaging)?;
        let archive_path = workspace.register(workspace.archive_path());
        package::package(&job.pages, &archive_path).await
    }

    /// Convert a local PDF into a ZIP archive at `output`.
    ///
    /// Runs the same pipeline and cleanup as the HTTP service, using
    /// `scratch` for intermediate files.
    pub async fn convert_file(
        &self,
        scratch: &ScratchSpace,
        input: &Path,
        output: &Path,
    ) -> Result<ArchiveHandle, Pdf2ZipError> {
        let id = JobId::new();
        let span = info_span!("job", id = %id);
        async move {
            let bytes = tokio::fs::read(input)
                .await
                .map_err(|e| Pdf2ZipError::UploadFailed {
                    reason: format!("cannot read '{}': {}", input.display(), e),
                })?;

            let mut workspace = scratch.open_job(id.clone()).await?;
            let source = workspace.stage_bytes(&bytes).await?;
            let mut job = ConversionJob::new(id);
            job.source = Some(source);

            self.process(job, workspace).await?.persist(output).await
        }
        .instrument(span)
        .await
    }
}

/// A sealed archive still held in its job workspace.
#[derive(Debug)]
pub struct PreparedArchive {
    pub(crate) job: ConversionJob,
    pub(crate) archive: ArchiveHandle,
    pub(crate) workspace: JobWorkspace,
}

impl PreparedArchive {
    pub fn job(&self) -> &ConversionJob {
        &self.job
    }

    pub fn archive(&self) -> &ArchiveHandle {
        &self.archive
    }

    /// Copy the archive to `output` atomically, then release the job.
    pub async fn persist(self, output: &Path) -> Result<ArchiveHandle, Pdf2ZipError> {
        let archive = self.archive().clone();
        let result = copy_atomic(&archive.path, output).await;
        self.close().await;
        result?;
        Ok(ArchiveHandle {
            path: output.to_path_buf(),
            ..archive
        })
    }

    /// Release every artifact without delivering the archive.
    pub async fn release(self) -> CleanupReport {
        self.close().await
    }

    /// Release the workspace on the blocking pool and mark the job cleaned.
    pub(crate) async fn close(self) -> CleanupReport {
        let PreparedArchive {
            mut job, workspace, ..
        } = self;
        let report = workspace.close().await;
        log_cleanup(&job.id, &report);
        mark_cleaned(&mut job);
        report
    }

    /// Synchronous release for `Drop` paths that cannot await.
    pub(crate) fn finish(&mut self) -> CleanupReport {
        let report = self.workspace.release_all();
        log_cleanup(&self.job.id, &report);
        mark_cleaned(&mut self.job);
        report
    }
}

fn mark_cleaned(job: &mut ConversionJob) {
    if job.state() == JobState::Packaging {
        let _ = job.advance(JobState::Streaming);
    }
    let _ = job.advance(JobState::Cleaned);
}

/// Write via a sibling temp file and rename, so `dest` is never partial.
async fn copy_atomic(src: &Path, dest: &Path) -> Result<(), Pdf2ZipError> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Pdf2ZipError::scratch(parent, e))?;
    }

    let tmp = dest.with_extension("zip.tmp");
    tokio::fs::copy(src, &tmp)
        .await
        .map_err(|e| Pdf2ZipError::scratch(&tmp, e))?;
    if let Err(e) = tokio::fs::rename(&tmp, dest).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(Pdf2ZipError::scratch(dest, e));
    }
    Ok(())
}

pub(crate) fn log_cleanup(id: &JobId, report: &CleanupReport) {
    if report.is_clean() {
        info!("Job {} cleaned up ({} artifacts)", id, report.deleted);
    } else {
        warn!(
            "Job {} cleaned up with {} failures ({} artifacts deleted)",
            id,
            report.failed.len(),
            report.deleted
        );
    }
}
