//! CLI binary for edgequake-pdf2png.
//!
//! `pdf2png serve` runs the HTTP service; `pdf2png convert` runs the same
//! pipeline on a local file and writes the session to disk.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_pdf2png::{
    server, ConversionConfig, ConversionProgressCallback, Converter, ProgressCallback,
    ServerConfig,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner while the PDF opens, then a page bar once the count is known.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} pages  \
                 ⏱ {elapsed_precise}  ETA {eta_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        self.bar.set_length(total_pages as u64);
        self.bar.set_prefix("Rendering");
        self.bar.reset_eta();
    }

    fn on_page_complete(&self, page_num: usize, total_pages: usize, png_bytes: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            page_num,
            total_pages,
            dim(&format!("{:>8} bytes", png_bytes)),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, _total_pages: usize) {
        self.bar.finish_and_clear();
    }
}

// ── Arguments ────────────────────────────────────────────────────────────────

/// Rasterise PDF documents to per-page PNG images.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2png",
    version,
    about = "Rasterise PDF documents to per-page PNG images",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2PNG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF2PNG_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service.
    Serve {
        /// Address to bind.
        #[arg(long, env = "PDF2PNG_HOST", default_value = "0.0.0.0")]
        host: IpAddr,

        /// Port to bind.
        #[arg(short, long, env = "PORT", default_value_t = 8000)]
        port: u16,

        #[command(flatten)]
        conversion: ConversionArgs,
    },

    /// Convert one local PDF into a new session directory.
    Convert {
        /// Path to the PDF file.
        input: PathBuf,

        #[command(flatten)]
        conversion: ConversionArgs,

        /// Print the manifest as JSON instead of a summary.
        #[arg(long)]
        json: bool,

        /// Disable the progress bar.
        #[arg(long, env = "PDF2PNG_NO_PROGRESS")]
        no_progress: bool,
    },
}

#[derive(Args, Debug)]
struct ConversionArgs {
    /// Root directory for session directories.
    #[arg(short, long, env = "PDF2PNG_OUTPUT_DIR", default_value = "/data/output")]
    output_dir: PathBuf,

    /// Rendering DPI (72–400).
    #[arg(long, env = "PDF2PNG_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Largest accepted upload in MiB.
    #[arg(long, env = "PDF2PNG_MAX_UPLOAD_MB", default_value_t = 100)]
    max_upload_mb: usize,

    /// Per-conversion timeout in seconds.
    #[arg(long, env = "PDF2PNG_TIMEOUT", default_value_t = 300)]
    timeout: u64,

    /// Path to libpdfium (file or containing directory).
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,
}

impl ConversionArgs {
    fn to_config(&self, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
        let mut builder = ConversionConfig::builder()
            .output_dir(&self.output_dir)
            .dpi(self.dpi)
            .max_upload_bytes(self.max_upload_mb.saturating_mul(1024 * 1024))
            .timeout_secs(self.timeout);
        if let Some(ref path) = self.pdfium_lib_path {
            builder = builder.pdfium_lib_path(path);
        }
        if let Some(cb) = progress {
            builder = builder.progress_callback(cb);
        }
        builder.build().context("Invalid configuration")
    }
}

// ── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The progress bar replaces INFO logs during `convert`.
    let show_progress = match &cli.command {
        Command::Convert {
            json, no_progress, ..
        } => !cli.quiet && !no_progress && !json,
        Command::Serve { .. } => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
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

    match cli.command {
        Command::Serve {
            host,
            port,
            conversion,
        } => {
            let config = conversion.to_config(None)?;
            let converter = Converter::with_pdfium(config)
                .await
                .context("Failed to initialise converter")?;
            server::serve(converter, &ServerConfig { host, port })
                .await
                .context("Server failed")?;
        }
        Command::Convert {
            input,
            conversion,
            json,
            ..
        } => {
            let progress: Option<ProgressCallback> = if show_progress {
                Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
            } else {
                None
            };
            let config = conversion.to_config(progress)?;
            let converter = Converter::with_pdfium(config)
                .await
                .context("Failed to initialise converter")?;

            let bytes = tokio::fs::read(&input)
                .await
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let filename = input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned());

            let output = converter
                .convert_upload(filename.as_deref(), bytes)
                .await
                .context("Conversion failed")?;

            if json {
                let manifest = serde_json::to_string_pretty(&output.manifest())
                    .context("Failed to serialise manifest")?;
                println!("{manifest}");
            } else if !cli.quiet {
                let dir = converter.store().session_dir(&output.session_id);
                for page in &output.pages {
                    println!("{}", dir.join(&page.file_name).display());
                }
                eprintln!(
                    "{} {} pages  {}  {}ms  →  {}",
                    green("✔"),
                    bold(&output.stats.total_pages.to_string()),
                    dim(&format!("{} bytes", output.stats.total_bytes)),
                    output.stats.total_duration_ms,
                    bold(&dir.display().to_string()),
                );
            }
        }
    }

    Ok(())
}
