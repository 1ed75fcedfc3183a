//! CLI binary for pdf2zip.
//!
//! `serve` runs the HTTP service; `convert` runs the same pipeline on a
//! local file.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pdf2zip::{router, AppState, ConversionConfig, Converter, OutputFormat, ScratchSpace, ServerConfig};
use std::io;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve on the default port (5000)
  pdf2zip serve

  # Custom port, scratch directories and upload limit
  pdf2zip serve --port 8080 --uploads-dir /tmp/up --output-dir /tmp/out --max-upload-mb 20

  # Convert a local file
  pdf2zip convert report.pdf -o report.zip

  # Larger JPEG pages that keep their aspect ratio
  pdf2zip --format jpeg --width 1200 --height 1200 --preserve-aspect convert scan.pdf -o scan.zip

  # Upload with curl
  curl -F pdf=@report.pdf http://localhost:5000/ -o pages.zip

ENVIRONMENT:
  PORT                 listening port for `serve`
  PDFIUM_LIB_PATH      directory containing the pdfium shared library
  PDF2ZIP_*            defaults for the flags below
  RUST_LOG             overrides --verbose / --quiet
"#;

#[derive(Parser, Debug)]
#[command(
    name = "pdf2zip",
    version,
    about = "Convert PDF files into ZIP archives of page images",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    render: RenderArgs,

    /// Directory containing the pdfium shared library.
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Debug-level logging.
    #[arg(short, long, global = true, env = "PDF2ZIP_VERBOSE")]
    verbose: bool,

    /// Errors only.
    #[arg(short, long, global = true, env = "PDF2ZIP_QUIET")]
    quiet: bool,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Rasterisation density in DPI (36–600).
    #[arg(long, global = true, env = "PDF2ZIP_DENSITY", default_value_t = 100,
          value_parser = clap::value_parser!(u32).range(36..=600))]
    density: u32,

    /// Output width in pixels.
    #[arg(long, global = true, env = "PDF2ZIP_WIDTH", default_value_t = 600)]
    width: u32,

    /// Output height in pixels.
    #[arg(long, global = true, env = "PDF2ZIP_HEIGHT", default_value_t = 600)]
    height: u32,

    /// Image format: png or jpeg.
    #[arg(long, global = true, env = "PDF2ZIP_FORMAT", default_value = "png")]
    format: OutputFormat,

    /// Fit inside width × height instead of stretching to it.
    #[arg(long, global = true, env = "PDF2ZIP_PRESERVE_ASPECT")]
    preserve_aspect: bool,

    /// Pages rendered at once (defaults to the number of CPUs).
    #[arg(short, long, global = true, env = "PDF2ZIP_CONCURRENCY")]
    concurrency: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP conversion service.
    Serve {
        #[arg(long, env = "PDF2ZIP_HOST", default_value = "0.0.0.0")]
        host: String,

        #[arg(short, long, env = "PORT", default_value_t = 5000)]
        port: u16,

        /// Scratch directory for staged uploads.
        #[arg(long, env = "PDF2ZIP_UPLOADS_DIR", default_value = "uploads")]
        uploads_dir: PathBuf,

        /// Scratch directory for rendered pages and archives.
        #[arg(long, env = "PDF2ZIP_OUTPUT_DIR", default_value = "output")]
        output_dir: PathBuf,

        /// Multipart field holding the PDF.
        #[arg(long, env = "PDF2ZIP_UPLOAD_FIELD", default_value = "pdf")]
        field: String,

        /// Upload size limit in MiB.
        #[arg(long, env = "PDF2ZIP_MAX_UPLOAD_MB", default_value_t = 50)]
        max_upload_mb: usize,

        /// Allow cross-origin requests from any origin.
        #[arg(long, env = "PDF2ZIP_CORS")]
        cors: bool,
    },

    /// Convert a local PDF into a ZIP archive.
    Convert {
        /// PDF file to convert.
        input: PathBuf,

        /// Where to write the archive.
        #[arg(short, long)]
        output: PathBuf,

        /// Scratch directory (defaults to the system temp dir).
        #[arg(long, env = "PDF2ZIP_SCRATCH_DIR")]
        scratch_dir: Option<PathBuf>,
    },
}

impl RenderArgs {
    fn to_config(&self) -> Result<ConversionConfig> {
        let mut builder = ConversionConfig::builder()
            .density(self.density)
            .size(self.width, self.height)
            .format(self.format)
            .preserve_aspect_ratio(self.preserve_aspect);
        if let Some(n) = self.concurrency {
            builder = builder.concurrency(n);
        }
        builder.build().context("Invalid rendering options")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Bind pdfium once up front so a missing library fails fast ────────
    let config = cli.render.to_config()?;
    let converter = Converter::with_pdfium(cli.pdfium_lib.clone(), config)
        .context("PDFium engine unavailable (set PDFIUM_LIB_PATH or --pdfium-lib)")?;

    match cli.command {
        Command::Serve {
            host,
            port,
            uploads_dir,
            output_dir,
            field,
            max_upload_mb,
            cors,
        } => {
            let server = ServerConfig::builder()
                .host(host)
                .port(port)
                .uploads_dir(uploads_dir)
                .output_dir(output_dir)
                .upload_field(field)
                .max_upload_bytes(max_upload_mb.saturating_mul(1024 * 1024))
                .cors(cors)
                .build()
                .context("Invalid server options")?;

            let app = router(AppState::new(converter, &server), &server);
            let listener = tokio::net::TcpListener::bind(server.bind_addr())
                .await
                .with_context(|| format!("Failed to bind {}", server.bind_addr()))?;
            tracing::info!("pdf2zip listening on {}", server.bind_addr());
            pdf2zip::serve(listener, app).await.context("Server error")?;
        }

        Command::Convert {
            input,
            output,
            scratch_dir,
        } => {
            let root = scratch_dir.unwrap_or_else(|| std::env::temp_dir().join("pdf2zip"));
            let scratch = ScratchSpace::new(root.join("uploads"), root.join("output"));
            let started = Instant::now();
            let handle = converter
                .convert_file(&scratch, &input, &output)
                .await
                .with_context(|| format!("Failed to convert {}", input.display()))?;

            if !cli.quiet {
                eprintln!(
                    "Wrote {} ({} pages, {} bytes) in {:.1}s",
                    handle.path.display(),
                    handle.entries.len(),
                    handle.size_bytes,
                    started.elapsed().as_secs_f64()
                );
            }
        }
    }

    Ok(())
}
