//! Configuration types for page rasterisation and the HTTP service.
//!
//! Conversion behaviour is controlled through [`ConversionConfig`], built via
//! [`ConversionConfigBuilder`]; the listening socket and scratch layout live in
//! [`ServerConfig`]. Both are plain `Clone` structs so the server can share
//! them across request tasks without locking.

use crate::error::Pdf2ZipError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Lowest accepted rasterisation density.
pub const MIN_DENSITY: u32 = 36;
/// Highest accepted rasterisation density.
pub const MAX_DENSITY: u32 = 600;
/// Upper bound for a target width or height in pixels.
pub const MAX_DIMENSION: u32 = 10_000;

/// Configuration for rendering a document's pages to images.
///
/// # Example
/// ```rust
/// use pdf2zip::{ConversionConfig, OutputFormat};
///
/// let config = ConversionConfig::builder()
///     .density(150)
///     .size(1200, 1600)
///     .format(OutputFormat::Jpeg)
///     .concurrency(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.width, Some(1200));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Rasterisation density in dots per inch. Range: 36–600. Default: 100.
    pub density: u32,

    /// Target image width in pixels. `None` keeps the rendered width. Default: 600.
    pub width: Option<u32>,

    /// Target image height in pixels. `None` keeps the rendered height. Default: 600.
    pub height: Option<u32>,

    /// Output image encoding. Default: [`OutputFormat::Png`].
    pub format: OutputFormat,

    /// Fit inside `width × height` instead of stretching to it. Default: false.
    ///
    /// With both dimensions set and this off, every page comes out at exactly
    /// `width × height` regardless of its physical aspect ratio.
    pub preserve_aspect_ratio: bool,

    /// Maximum number of pages rasterised at once. Default: available CPUs.
    ///
    /// Every page is still scheduled up front; this only bounds how many
    /// blocking render tasks run simultaneously, so a 500-page upload cannot
    /// open 500 pdfium documents at the same time.
    pub concurrency: usize,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            density: 100,
            width: Some(600),
            height: Some(600),
            format: OutputFormat::default(),
            preserve_aspect_ratio: false,
            concurrency: default_concurrency(),
        }
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn density(mut self, dpi: u32) -> Self {
        self.config.density = dpi;
        self
    }

    pub fn width(mut self, px: Option<u32>) -> Self {
        self.config.width = px;
        self
    }

    pub fn height(mut self, px: Option<u32>) -> Self {
        self.config.height = px;
        self
    }

    /// Set both target dimensions at once.
    pub fn size(self, width: u32, height: u32) -> Self {
        self.width(Some(width)).height(Some(height))
    }

    pub fn format(mut self, format: OutputFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn preserve_aspect_ratio(mut self, v: bool) -> Self {
        self.config.preserve_aspect_ratio = v;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2ZipError> {
        let c = &self.config;
        if !(MIN_DENSITY..=MAX_DENSITY).contains(&c.density) {
            return Err(Pdf2ZipError::InvalidConfig(format!(
                "density must be {MIN_DENSITY}–{MAX_DENSITY} DPI, got {}",
                c.density
            )));
        }
        for (axis, value) in [("width", c.width), ("height", c.height)] {
            if let Some(px) = value {
                if px == 0 || px > MAX_DIMENSION {
                    return Err(Pdf2ZipError::InvalidConfig(format!(
                        "{axis} must be 1–{MAX_DIMENSION} px, got {px}"
                    )));
                }
            }
        }
        Ok(self.config)
    }
}

/// Image encoding used for every rendered page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Lossless; keeps text edges crisp. (default)
    #[default]
    Png,
    /// Smaller files for photo-heavy documents.
    Jpeg,
}

impl OutputFormat {
    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
        }
    }

    pub(crate) fn image_format(self) -> image::ImageFormat {
        match self {
            OutputFormat::Png => image::ImageFormat::Png,
            OutputFormat::Jpeg => image::ImageFormat::Jpeg,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpeg",
        })
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = Pdf2ZipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            other => Err(Pdf2ZipError::InvalidConfig(format!(
                "unsupported output format '{other}' (expected png or jpeg)"
            ))),
        }
    }
}

/// Settings for the HTTP front of the converter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Interface to bind. Default: `0.0.0.0`.
    pub host: String,
    /// TCP port. Default: 5000.
    pub port: u16,
    /// Root for staged uploads; one subdirectory per job. Default: `uploads`.
    pub uploads_dir: PathBuf,
    /// Root for rendered pages and archives; one subdirectory per job. Default: `output`.
    pub output_dir: PathBuf,
    /// Multipart field carrying the PDF. Default: `pdf`.
    pub upload_field: String,
    /// Request body cap in bytes. Default: 50 MiB.
    pub max_upload_bytes: usize,
    /// Attach a permissive CORS layer for browser clients. Default: false.
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            uploads_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("output"),
            upload_field: "pdf".to_string(),
            max_upload_bytes: 50 * 1024 * 1024,
            cors: false,
        }
    }
}

impl ServerConfig {
    /// Create a new builder for `ServerConfig`.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder {
            config: Self::default(),
        }
    }

    /// `host:port` string suitable for `TcpListener::bind`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn uploads_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.uploads_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn upload_field(mut self, name: impl Into<String>) -> Self {
        self.config.upload_field = name.into();
        self
    }

    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn cors(mut self, v: bool) -> Self {
        self.config.cors = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServerConfig, Pdf2ZipError> {
        let c = &self.config;
        if c.upload_field.trim().is_empty() {
            return Err(Pdf2ZipError::InvalidConfig(
                "upload field name must not be empty".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(Pdf2ZipError::InvalidConfig(
                "max upload size must be > 0".into(),
            ));
        }
        Ok(self.config)
    }
}
