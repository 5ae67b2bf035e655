//! # edgequake-pdf2png
//!
//! Rasterise uploaded PDF documents into per-page PNG images and serve them
//! back from session-scoped storage.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Input   non-empty, `%PDF` signature, `.pdf` file name
//!  ├─ 2. Render  open with pdfium and rasterise one page at a time (spawn_blocking)
//!  ├─ 3. Encode  RGBA raster → PNG, raster dropped immediately
//!  ├─ 4. Store   <output_dir>/<session_id>/page_<n>.png, write-once
//!  └─ 5. Output  manifest: session id + ordered download locators
//! ```
//!
//! Pages within one document are strictly sequential. Separate documents
//! convert concurrently: pdfium is bound once per process and serialises
//! only individual native calls, so their pages interleave while encoding
//! and storage run in parallel. Every session owns a fresh directory under
//! the storage root.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2png::{ConversionConfig, Converter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .dpi(150)
//!         .output_dir("/tmp/pdf2png")
//!         .build()?;
//!     let converter = Converter::with_pdfium(config).await?;
//!
//!     let bytes = tokio::fs::read("document.pdf").await?;
//!     let output = converter.convert_upload(Some("document.pdf"), bytes).await?;
//!     for page in &output.pages {
//!         println!("{} → {}x{}", page.locator, page.width, page.height);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Serving over HTTP
//!
//! [`server::router`] builds the axum application (`/healthcheck`,
//! `/convert`, `/download/{session_id}/{filename}`); [`server::serve`] binds
//! it with graceful shutdown.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2png` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when embedding only the library:
//! ```toml
//! edgequake-pdf2png = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod server;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, ServerConfig};
pub use convert::Converter;
pub use error::{ErrorKind, Pdf2PngError};
pub use output::{ConversionManifest, ConversionOutput, ConversionStats, PageArtifact};
pub use pipeline::render::{PageRenderer, PdfiumRenderer, RasterImage, RenderDocument};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use store::{PageName, SessionId, SessionStore};
