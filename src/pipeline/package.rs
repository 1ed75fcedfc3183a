//! Archive packaging: write rendered pages into a sealed ZIP file.
//!
//! The writer runs on the blocking pool; [`package`] only resolves once the
//! central directory has been written, the file flushed and synced, and its
//! final size read back. Callers therefore never see a half-written archive.

use crate::error::Pdf2ZipError;
use crate::job::{ArchiveHandle, PageImage};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Deflate level used for every entry (maximum).
pub const COMPRESSION_LEVEL: i64 = 9;

/// Write `pages` (in the given order) into a new archive at `archive_path`.
///
/// Entries are named by the image's file name only, so no directory
/// structure from the scratch space leaks into the archive.
pub async fn package(
    pages: &[PageImage],
    archive_path: &Path,
) -> Result<ArchiveHandle, Pdf2ZipError> {
    let images: Vec<_> = pages.iter().map(|p| p.path.clone()).collect();
    let path = archive_path.to_path_buf();

    let handle = tokio::task::spawn_blocking(move || package_blocking(&images, &path))
        .await
        .map_err(|e| Pdf2ZipError::PackagingFailure {
            path: archive_path.to_path_buf(),
            detail: format!("packaging task panicked: {}", e),
        })??;

    info!(
        "Created ZIP archive: {} ({} total bytes)",
        handle.path.display(),
        handle.size_bytes
    );
    Ok(handle)
}

/// Blocking implementation of archive packaging.
fn package_blocking(
    images: &[impl AsRef<Path>],
    archive_path: &Path,
) -> Result<ArchiveHandle, Pdf2ZipError> {
    let fail = |detail: String| Pdf2ZipError::PackagingFailure {
        path: archive_path.to_path_buf(),
        detail,
    };

    let file = File::create(archive_path).map_err(|e| fail(format!("create: {}", e)))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(COMPRESSION_LEVEL));

    let mut entries = Vec::with_capacity(images.len());
    for image in images {
        let image = image.as_ref();
        let name = entry_name(image).ok_or_else(|| {
            fail(format!("'{}' has no usable file name", image.display()))
        })?;
        if entries.contains(&name) {
            return Err(fail(format!("duplicate entry '{}'", name)));
        }

        let mut src =
            File::open(image).map_err(|e| fail(format!("open {}: {}", image.display(), e)))?;
        zip.start_file(name.as_str(), options)
            .map_err(|e| fail(format!("start entry {}: {}", name, e)))?;
        std::io::copy(&mut src, &mut zip)
            .map_err(|e| fail(format!("append {}: {}", name, e)))?;
        entries.push(name);
    }

    let writer = zip.finish().map_err(|e| fail(format!("finalize: {}", e)))?;
    let file = writer
        .into_inner()
        .map_err(|e| fail(format!("flush: {}", e.error())))?;
    file.sync_all().map_err(|e| fail(format!("sync: {}", e)))?;
    let size_bytes = file
        .metadata()
        .map_err(|e| fail(format!("stat: {}", e)))?
        .len();

    Ok(ArchiveHandle {
        path: archive_path.to_path_buf(),
        entries,
        size_bytes,
    })
}

/// Basename of `path`, if it is valid UTF-8.
fn entry_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}
