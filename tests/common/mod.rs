//! Shared fixtures for the service tests: an in-process raster backend, a
//! multipart body builder and scratch-directory helpers.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request};
use image::{DynamicImage, Rgb, RgbImage};
use pdf2zip::{
    router, AppState, ConversionConfig, Converter, Pdf2ZipError, RasterBackend, ServerConfig,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const BOUNDARY: &str = "pdf2zip-test-boundary";

/// Reads a tiny text "document": `%PDF-test`, `pages: N`, optional `fail: K`.
#[derive(Debug, Default)]
pub struct FakeBackend {
    pub rasterize_calls: AtomicUsize,
    /// Page `p` sleeps `stagger * (STAGGER_PAGES - p)`, so early pages finish last.
    pub stagger: Duration,
    /// Page numbers in the order their rasterisation finished.
    pub completed: Mutex<Vec<usize>>,
}

pub const STAGGER_PAGES: usize = 32;

impl FakeBackend {
    pub fn staggered(stagger: Duration) -> Self {
        Self {
            stagger,
            ..Self::default()
        }
    }

    pub fn completion_order(&self) -> Vec<usize> {
        self.completed.lock().unwrap().clone()
    }
}

fn field(text: &str, key: &str) -> Option<usize> {
    text.lines()
        .filter_map(|l| l.strip_prefix(key))
        .find_map(|v| v.trim().parse().ok())
}

impl RasterBackend for FakeBackend {
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
        if !self.stagger.is_zero() {
            let steps = STAGGER_PAGES.saturating_sub(page) as u32;
            std::thread::sleep(self.stagger * steps);
        }
        self.completed.lock().unwrap().push(page);
        let text = std::fs::read_to_string(source).unwrap_or_default();
        if field(&text, "fail:") == Some(page) {
            return Err(Pdf2ZipError::RenderFailure {
                page,
                detail: "fake refused".into(),
            });
        }
        Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            density * 17 / 2,
            density * 11,
            Rgb([page as u8, 0, 0]),
        )))
    }
}

pub fn document(pages: usize, fail: Option<usize>) -> Vec<u8> {
    let mut doc = format!("%PDF-test\npages: {pages}\n");
    if let Some(k) = fail {
        doc.push_str(&format!("fail: {k}\n"));
    }
    doc.into_bytes()
}

pub struct TestApp {
    pub root: TempDir,
    pub backend: Arc<FakeBackend>,
    pub server: ServerConfig,
    pub app: axum::Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_backend(FakeBackend::default(), 4)
    }

    pub fn with_backend(backend: FakeBackend, concurrency: usize) -> Self {
        let root = TempDir::new().unwrap();
        let server = ServerConfig::builder()
            .uploads_dir(root.path().join("uploads"))
            .output_dir(root.path().join("output"))
            .build()
            .unwrap();
        let backend = Arc::new(backend);
        let config = ConversionConfig::builder()
            .concurrency(concurrency)
            .build()
            .unwrap();
        let converter = Converter::new(backend.clone(), config);
        let app = router(AppState::new(converter, &server), &server);
        Self {
            root,
            backend,
            server,
            app,
        }
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.server.uploads_dir.clone()
    }

    pub fn output_dir(&self) -> PathBuf {
        self.server.output_dir.clone()
    }

    /// True when neither scratch root holds anything.
    pub fn scratch_is_empty(&self) -> bool {
        [self.uploads_dir(), self.output_dir()].iter().all(|d| {
            std::fs::read_dir(d)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(true)
        })
    }

    pub fn rasterize_calls(&self) -> usize {
        self.backend.rasterize_calls.load(Ordering::SeqCst)
    }
}

/// One `multipart/form-data` part.
pub struct Part<'a> {
    pub name: &'a str,
    pub file_name: Option<&'a str>,
    pub body: &'a [u8],
}

pub fn multipart_request(parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part.file_name {
            Some(f) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                     Content-Type: application/pdf\r\n\r\n",
                    part.name, f
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name)
                    .as_bytes(),
            ),
        }
        body.extend_from_slice(part.body);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn pdf_upload(doc: &[u8]) -> Request<Body> {
    multipart_request(&[Part {
        name: "pdf",
        file_name: Some("doc.pdf"),
        body: doc,
    }])
}
