//! The per-request conversion job and its lifecycle.
//!
//! ```text
//! Received ─▶ Inspected ─▶ Rendering ─▶ Packaging ─▶ Streaming ─▶ Cleaned
//!     │            │            │            │
//!     └────────────┴────────────┴────────────┴──▶ Failed ─▶ Cleaned
//! ```
//!
//! A [`ConversionJob`] is owned by exactly one request and never shared.

use crate::error::Pdf2ZipError;
use crate::workspace::JobId;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

/// Lifecycle state of a [`ConversionJob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Received,
    Inspected,
    Rendering,
    Packaging,
    Streaming,
    Cleaned,
    Failed,
}

impl JobState {
    /// Whether `self → next` is a legal transition.
    pub fn can_advance_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Received, Inspected)
                | (Inspected, Rendering)
                | (Rendering, Packaging)
                | (Packaging, Streaming)
                | (Streaming, Cleaned)
                | (Failed, Cleaned)
                | (Received | Inspected | Rendering | Packaging, Failed)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Render status of one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStatus {
    Pending,
    Done,
    Failed,
}

/// One rendered (or attempted) page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageImage {
    /// 1-indexed page number, unique within a job.
    pub index: usize,
    /// Where the image is (or would have been) written.
    pub path: PathBuf,
    pub status: RenderStatus,
}

/// A sealed archive on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveHandle {
    pub path: PathBuf,
    /// Entry names in archive order (basenames only).
    pub entries: Vec<String>,
    /// Size of the finished file; only known after sealing.
    pub size_bytes: u64,
}

/// One document-to-archive conversion, end to end.
#[derive(Debug)]
pub struct ConversionJob {
    pub id: JobId,
    pub source: Option<PathBuf>,
    pub page_count: Option<usize>,
    pub pages: Vec<PageImage>,
    pub archive: Option<ArchiveHandle>,
    state: JobState,
}

impl ConversionJob {
    pub fn new(id: JobId) -> Self {
        Self {
            id,
            source: None,
            page_count: None,
            pages: Vec::new(),
            archive: None,
            state: JobState::Received,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow.
    pub fn advance(&mut self, next: JobState) -> Result<(), Pdf2ZipError> {
        if !self.state.can_advance_to(next) {
            return Err(Pdf2ZipError::Internal(format!(
                "job {}: illegal transition {} → {}",
                self.id, self.state, next
            )));
        }
        debug!("Job {}: {} → {}", self.id, self.state, next);
        self.state = next;
        Ok(())
    }

    /// Mark the job failed. A no-op once the job is already failed or cleaned.
    pub fn fail(&mut self) {
        if self.state.can_advance_to(JobState::Failed) {
            debug!("Job {}: {} → Failed", self.id, self.state);
            self.state = JobState::Failed;
        }
    }

    /// Number of pages whose image is on disk.
    pub fn done_pages(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| p.status == RenderStatus::Done)
            .count()
    }

    /// Check that every reported page rendered before packaging starts.
    pub fn ensure_complete(&self) -> Result<(), Pdf2ZipError> {
        let expected = self.page_count.unwrap_or(0);
        let done = self.done_pages();
        if done != expected || self.pages.len() != expected {
            let page = self
                .pages
                .iter()
                .find(|p| p.status != RenderStatus::Done)
                .map(|p| p.index)
                .unwrap_or(done + 1);
            return Err(Pdf2ZipError::RenderFailure {
                page,
                detail: format!("{done} of {expected} pages rendered"),
            });
        }
        Ok(())
    }
}
