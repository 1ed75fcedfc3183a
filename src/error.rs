//! Error types for the pdf2zip library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Pdf2ZipError`]: **Fatal**, the job cannot produce an archive
//!   (no upload, malformed PDF, a page that will not rasterise, a broken
//!   archive writer). Returned as `Err(Pdf2ZipError)` from every pipeline
//!   stage; the HTTP layer maps it to a 4xx/5xx JSON body.
//!
//! * [`CleanupError`]: **Non-fatal**, one scratch artifact could not be
//!   deleted. Logged by [`crate::workspace::JobWorkspace`] and counted in a
//!   [`crate::workspace::CleanupReport`]; never shown to the client and never
//!   stops the remaining artifacts from being released.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2zip library.
#[derive(Debug, Error)]
pub enum Pdf2ZipError {
    // ── Upload errors ─────────────────────────────────────────────────────
    /// The multipart body did not contain the expected file field.
    #[error("Please upload a PDF file.")]
    MissingUpload { field: String },

    /// The request body could not be read as a multipart upload.
    #[error("Failed to read upload: {reason}")]
    UploadFailed { reason: String },

    // ── Document errors ───────────────────────────────────────────────────
    /// Empty, truncated, non-PDF or otherwise unparseable document.
    #[error("Malformed PDF '{path}': {detail}")]
    MalformedDocument { path: PathBuf, detail: String },

    /// The rasteriser could not produce an image for one page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RenderFailure { page: usize, detail: String },

    // ── Archive errors ────────────────────────────────────────────────────
    /// The ZIP archive could not be created, appended to or sealed.
    #[error("Failed to package archive '{path}': {detail}")]
    PackagingFailure { path: PathBuf, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// A scratch directory or file could not be created or written.
    #[error("Scratch I/O failed for '{path}': {source}")]
    ScratchIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH to the directory containing libpdfium, or install it system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (panicked task, illegal state transition).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2ZipError {
    /// `true` when the caller sent something we cannot convert (HTTP 400);
    /// `false` for failures on our side (HTTP 500).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Pdf2ZipError::MissingUpload { .. }
                | Pdf2ZipError::UploadFailed { .. }
                | Pdf2ZipError::MalformedDocument { .. }
        )
    }

    /// Shorthand for a scratch I/O failure on `path`.
    pub(crate) fn scratch(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Pdf2ZipError::ScratchIo {
            path: path.into(),
            source,
        }
    }
}

/// A non-fatal error for a single scratch artifact.
#[derive(Debug, Clone, Error)]
#[error("Failed to delete '{path}': {detail}")]
pub struct CleanupError {
    pub path: PathBuf,
    pub detail: String,
}
