//! The rasteriser seam: page counting and page rendering behind one trait.
//!
//! ## Why a trait?
//!
//! pdfium is a native library loaded at runtime. Putting it behind
//! [`RasterBackend`] lets the coordinator, the archive writer and the HTTP
//! layer be exercised without libpdfium present, and keeps the pdfium
//! specifics (binding, error strings) in one place.
//!
//! Both methods are blocking; callers run them inside `spawn_blocking`.

use crate::error::Pdf2ZipError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

/// Points per inch in PDF user space.
const PDF_POINTS_PER_INCH: f32 = 72.0;

/// A document rasteriser.
pub trait RasterBackend: Send + Sync + 'static {
    /// Open `source` and report how many pages it has.
    ///
    /// Must fail with [`Pdf2ZipError::MalformedDocument`] when the document
    /// cannot be parsed.
    fn page_count(&self, source: &Path) -> Result<usize, Pdf2ZipError>;

    /// Rasterise page `page` (1-indexed) of `source` at `density` DPI.
    ///
    /// Must fail with [`Pdf2ZipError::RenderFailure`] for that page.
    fn rasterize(
        &self,
        source: &Path,
        page: usize,
        density: u32,
    ) -> Result<DynamicImage, Pdf2ZipError>;
}

/// The process-wide pdfium instance.
///
/// `FPDF_InitLibrary` / `FPDF_DestroyLibrary` must not race, so the library
/// is bound once and never torn down. Sharing it across render threads needs
/// pdfium-render's `sync` feature (`Pdfium: Send + Sync`); `thread_safe`
/// serialises the calls made through it.
static PDFIUM: OnceLock<Pdfium> = OnceLock::new();

fn shared_pdfium(library_dir: Option<&Path>) -> Result<&'static Pdfium, Pdf2ZipError> {
    if let Some(pdfium) = PDFIUM.get() {
        return Ok(pdfium);
    }
    let bindings = match library_dir {
        Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| Pdf2ZipError::PdfiumBindingFailed(format!("{:?}", e)))?;
    Ok(PDFIUM.get_or_init(|| Pdfium::new(bindings)))
}

/// Production backend built on `pdfium-render`.
///
/// The library binding is shared; the document itself is reopened for every
/// call, so each page render is independent of every other.
#[derive(Clone)]
pub struct PdfiumBackend {
    pdfium: &'static Pdfium,
}

impl std::fmt::Debug for PdfiumBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfiumBackend").finish_non_exhaustive()
    }
}

impl PdfiumBackend {
    /// Bind pdfium from `library_dir`, or the system library when `None`.
    ///
    /// Only the first successful bind in a process loads the library; later
    /// calls reuse it whatever directory they name.
    pub fn bind(library_dir: Option<&Path>) -> Result<Self, Pdf2ZipError> {
        let pdfium = shared_pdfium(library_dir)?;
        debug!("pdfium bound");
        Ok(Self { pdfium })
    }
}

impl RasterBackend for PdfiumBackend {
    fn page_count(&self, source: &Path) -> Result<usize, Pdf2ZipError> {
        let document =
            self.pdfium
                .load_pdf_from_file(source, None)
                .map_err(|e| Pdf2ZipError::MalformedDocument {
                    path: source.to_path_buf(),
                    detail: format!("{:?}", e),
                })?;
        Ok(document.pages().len() as usize)
    }

    fn rasterize(
        &self,
        source: &Path,
        page: usize,
        density: u32,
    ) -> Result<DynamicImage, Pdf2ZipError> {
        let render_err = |detail: String| Pdf2ZipError::RenderFailure { page, detail };

        let document = self
            .pdfium
            .load_pdf_from_file(source, None)
            .map_err(|e| render_err(format!("reopen failed: {:?}", e)))?;

        let index = page
            .checked_sub(1)
            .ok_or_else(|| render_err("page numbers start at 1".into()))?;
        let pdf_page = document
            .pages()
            .get(index as u16)
            .map_err(|e| render_err(format!("{:?}", e)))?;

        let render_config =
            PdfRenderConfig::new().scale_page_by_factor(density as f32 / PDF_POINTS_PER_INCH);
        let bitmap = pdf_page
            .render_with_config(&render_config)
            .map_err(|e| render_err(format!("{:?}", e)))?;

        let image = bitmap.as_image();
        debug!(
            "Rasterised page {} at {} DPI → {}x{} px",
            page,
            density,
            image.width(),
            image.height()
        );
        Ok(image)
    }
}

#[cfg(test)]
pub(crate) mod stub {
    //! In-process stand-in for pdfium used by unit tests.
    //!
    //! Documents are text files: a `%PDF` header line followed by
    //! `pages: N` and optionally `fail: K` (page K refuses to rasterise).

    use super::*;
    use image::{Rgb, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug, Default)]
    pub struct StubBackend {
        pub in_flight: Arc<AtomicUsize>,
        pub peak: Arc<AtomicUsize>,
        pub rasterize_calls: Arc<AtomicUsize>,
        pub delay: Duration,
    }

    impl StubBackend {
        pub fn with_delay(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::default()
            }
        }
    }

    fn field(text: &str, key: &str) -> Option<usize> {
        text.lines()
            .filter_map(|l| l.strip_prefix(key))
            .find_map(|v| v.trim().parse().ok())
    }

    impl RasterBackend for StubBackend {
        fn page_count(&self, source: &Path) -> Result<usize, Pdf2ZipError> {
            let text = std::fs::read_to_string(source).unwrap_or_default();
            field(&text, "pages:").ok_or_else(|| Pdf2ZipError::MalformedDocument {
                path: source.to_path_buf(),
                detail: "no page tree".into(),
            })
        }

        fn rasterize(
            &self,
            source: &Path,
            page: usize,
            density: u32,
        ) -> Result<DynamicImage, Pdf2ZipError> {
            self.rasterize_calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let text = std::fs::read_to_string(source).unwrap_or_default();
            if field(&text, "fail:") == Some(page) {
                return Err(Pdf2ZipError::RenderFailure {
                    page,
                    detail: "stub refused".into(),
                });
            }
            // Letter-sized page at the requested density.
            let w = density * 17 / 2;
            let h = density * 11;
            let shade = (page * 40 % 256) as u8;
            Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(
                w,
                h,
                Rgb([shade, 255 - shade, 128]),
            )))
        }
    }
}
