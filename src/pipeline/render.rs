//! Page rendering: rasterise one page, fit it to the target size, write it.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library with thread-local state and no async API, and
//! image resizing/encoding is CPU-bound. [`render`] moves each page onto
//! Tokio's blocking pool so the async workers keep serving other requests.
//!
//! Each call writes exactly one new file, `page-<n>.<ext>`, into the job's
//! output directory and touches nothing else.

use crate::config::{ConversionConfig, OutputFormat};
use crate::error::Pdf2ZipError;
use crate::pipeline::backend::RasterBackend;
use image::imageops::FilterType;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Per-page output settings, resolved for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRenderOptions {
    pub density: u32,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: OutputFormat,
    pub preserve_aspect_ratio: bool,
    /// Destination directory for page images.
    pub output_dir: PathBuf,
}

impl PageRenderOptions {
    pub fn from_config(config: &ConversionConfig, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            density: config.density,
            width: config.width,
            height: config.height,
            format: config.format,
            preserve_aspect_ratio: config.preserve_aspect_ratio,
            output_dir: output_dir.into(),
        }
    }

    /// Deterministic image path for 1-indexed `page`.
    pub fn page_path(&self, page: usize) -> PathBuf {
        self.output_dir
            .join(format!("page-{}.{}", page, self.format.extension()))
    }
}

/// Render `page` of `source` to an image file on the blocking pool.
pub async fn render(
    backend: &Arc<dyn RasterBackend>,
    source: &Path,
    page: usize,
    options: &PageRenderOptions,
) -> Result<PathBuf, Pdf2ZipError> {
    let backend = Arc::clone(backend);
    let source = source.to_path_buf();
    let options = options.clone();

    tokio::task::spawn_blocking(move || render_page(backend.as_ref(), &source, page, &options))
        .await
        .map_err(|e| Pdf2ZipError::RenderFailure {
            page,
            detail: format!("render task panicked: {}", e),
        })?
}

/// Blocking implementation of page rendering.
pub fn render_page(
    backend: &dyn RasterBackend,
    source: &Path,
    page: usize,
    options: &PageRenderOptions,
) -> Result<PathBuf, Pdf2ZipError> {
    let raster = backend.rasterize(source, page, options.density)?;
    let image = fit(raster, options);

    // JPEG has no alpha channel; pdfium hands back RGBA.
    let image = match options.format {
        OutputFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
        OutputFormat::Png => image,
    };

    let path = options.page_path(page);
    image
        .save_with_format(&path, options.format.image_format())
        .map_err(|e| Pdf2ZipError::RenderFailure {
            page,
            detail: format!("failed to write {}: {}", path.display(), e),
        })?;

    debug!(
        "Rendered page {} → {} ({}x{})",
        page,
        path.display(),
        image.width(),
        image.height()
    );
    Ok(path)
}

/// Scale `image` to the configured target size.
fn fit(image: DynamicImage, options: &PageRenderOptions) -> DynamicImage {
    let (w0, h0) = (image.width().max(1), image.height().max(1));
    let (w, h) = match (options.width, options.height) {
        (None, None) => return image,
        (Some(w), Some(h)) if options.preserve_aspect_ratio => {
            return image.resize(w, h, FilterType::Triangle);
        }
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, scale(h0, w, w0)),
        (None, Some(h)) => (scale(w0, h, h0), h),
    };
    if (w, h) == (image.width(), image.height()) {
        image
    } else {
        image.resize_exact(w, h, FilterType::Triangle)
    }
}

/// `value * num / den`, rounded, never zero.
fn scale(value: u32, num: u32, den: u32) -> u32 {
    let scaled = (value as u64 * num as u64 + den as u64 / 2) / den as u64;
    (scaled as u32).max(1)
}
