//! Document inspection: validate the staged upload and count its pages.
//!
//! Runs before any render work is scheduled. Cheap checks (empty file, no
//! `%PDF-` header in the first KiB) happen here without touching the rasteriser at all, so junk
//! uploads are rejected without ever loading pdfium.

use crate::error::Pdf2ZipError;
use crate::pipeline::backend::RasterBackend;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::info;

/// Return the page count of the staged document at `source`.
///
/// # Errors
/// [`Pdf2ZipError::MalformedDocument`] for zero-byte files, non-PDF files,
/// documents the backend cannot parse, and documents with no pages.
pub async fn inspect(
    backend: &Arc<dyn RasterBackend>,
    source: &Path,
) -> Result<usize, Pdf2ZipError> {
    check_magic(source).await?;

    let backend = Arc::clone(backend);
    let path = source.to_path_buf();
    let page_count = tokio::task::spawn_blocking(move || backend.page_count(&path))
        .await
        .map_err(|e| Pdf2ZipError::Internal(format!("Inspect task panicked: {}", e)))??;

    if page_count == 0 {
        return Err(malformed(source, "document has no pages"));
    }

    info!("PDF has {} pages", page_count);
    Ok(page_count)
}

/// Bytes searched for the `%PDF-` header; pdfium accepts it anywhere in this window.
pub const HEADER_SEARCH_WINDOW: usize = 1024;

const PDF_HEADER: &[u8] = b"%PDF-";

/// Reject empty files and files with no `%PDF-` header near the start.
async fn check_magic(source: &Path) -> Result<(), Pdf2ZipError> {
    let file = tokio::fs::File::open(source)
        .await
        .map_err(|e| Pdf2ZipError::scratch(source, e))?;

    let mut head = Vec::with_capacity(HEADER_SEARCH_WINDOW);
    file.take(HEADER_SEARCH_WINDOW as u64)
        .read_to_end(&mut head)
        .await
        .map_err(|e| Pdf2ZipError::scratch(source, e))?;

    if head.is_empty() {
        return Err(malformed(source, "empty upload"));
    }
    if head.windows(PDF_HEADER.len()).any(|w| w == PDF_HEADER) {
        return Ok(());
    }
    Err(malformed(
        source,
        &format!(
            "not a PDF (no %PDF- header in the first {} bytes)",
            HEADER_SEARCH_WINDOW
        ),
    ))
}

fn malformed(source: &Path, detail: &str) -> Pdf2ZipError {
    Pdf2ZipError::MalformedDocument {
        path: source.to_path_buf(),
        detail: detail.to_string(),
    }
}
