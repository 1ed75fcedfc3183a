//! # pdf2zip
//!
//! Turn an uploaded PDF into a ZIP archive of per-page images.
//!
//! Each page is rasterised through pdfium, resized to a fixed target box and
//! written as `page-<n>.png` (or `.jpg`). The pages are then packed into a
//! single archive and handed back. Every job works in its own scratch
//! directories and leaves nothing behind, whether it succeeds or fails and
//! even if the client disconnects mid-download.
//!
//! ## Pipeline Overview
//!
//! ```text
//! multipart upload
//!  │
//!  ├─ 1. Stage    stream the `pdf` field to uploads/<job>/source.pdf
//!  ├─ 2. Inspect  %PDF check, page count (spawn_blocking)
//!  ├─ 3. Render   one task per page, bounded fan-out, wait for all to settle
//!  ├─ 4. Package  output/<job>/converted_<job>.zip, deflate level 9
//!  ├─ 5. Stream   64 KiB chunks straight to the response body
//!  └─ 6. Cleanup  every artifact released once, newest first
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2zip::{router, AppState, ConversionConfig, Converter, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = ServerConfig::default();
//!     let converter = Converter::with_pdfium(None, ConversionConfig::default())?;
//!     let app = router(AppState::new(converter, &server), &server);
//!     let listener = tokio::net::TcpListener::bind(server.bind_addr()).await?;
//!     pdf2zip::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2zip` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod server;
pub mod stream;
pub mod workspace;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConversionConfig, ConversionConfigBuilder, OutputFormat, ServerConfig, ServerConfigBuilder,
};
pub use convert::{Converter, PreparedArchive};
pub use error::{CleanupError, Pdf2ZipError};
pub use job::{ArchiveHandle, ConversionJob, JobState, PageImage, RenderStatus};
pub use pipeline::backend::{PdfiumBackend, RasterBackend};
pub use server::{router, serve, AppState, ErrorResponse};
pub use stream::{ArchiveDownload, ArchiveStream};
pub use workspace::{CleanupOutcome, CleanupReport, JobId, JobWorkspace, ScratchSpace};
