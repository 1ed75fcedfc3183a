//! Pipeline stages for PDF-to-ZIP conversion.
//!
//! Each submodule implements exactly one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//! inspect ──▶ fanout ──▶ render × N ──▶ package
//! (%PDF, pages) (bounded)   (pdfium)     (zip, level 9)
//! ```
//!
//! 1. [`inspect`]: reject empty/non-PDF uploads, count pages
//! 2. [`fanout`]:  schedule one render per page, wait for all to settle
//! 3. [`render`]:  rasterise one page through the [`backend`], resize,
//!    encode, write `page-<n>.<ext>`
//! 4. [`package`]: append every page to a ZIP archive and seal it

pub mod backend;
pub mod fanout;
pub mod inspect;
pub mod package;
pub mod render;
