//! Shared helpers: a deterministic in-process renderer and converter setup.
//!
//! The stub understands a tiny text format so tests can describe documents
//! without shipping binary fixtures:
//!
//! ```text
//! %PDF-stub
//! page 72x36            width × height in points
//! page 72x72 delay=500  sleep 500ms before rasterising
//! page corrupt          rasterisation fails
//! ```
//!
//! Anything else that starts with `%PDF` fails to open, with a native-looking
//! detail string that must never reach an HTTP client.

#![allow(dead_code)]

use edgequake_pdf2png::pipeline::render::{pixel_extent, DocumentVisitor};
use edgequake_pdf2png::{
    ConversionConfig, ConversionConfigBuilder, Converter, PageRenderer, Pdf2PngError,
    RasterImage, RenderDocument, SessionStore,
};
use image::{Rgba, RgbaImage};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const HEADER: &str = "%PDF-stub";

// ── Stub document format ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum StubPage {
    Sized {
        width_pt: f32,
        height_pt: f32,
        delay_ms: u64,
    },
    Corrupt,
}

fn invalid(detail: &str) -> Pdf2PngError {
    Pdf2PngError::InvalidDocument {
        detail: format!("FPDF_ERR_FORMAT: {detail}"),
    }
}

fn parse_stub(bytes: &[u8]) -> Result<Vec<StubPage>, Pdf2PngError> {
    let text = std::str::from_utf8(bytes).map_err(|_| invalid("not utf-8"))?;
    let mut lines = text.lines();
    if lines.next().map(str::trim) != Some(HEADER) {
        return Err(invalid("missing stub header"));
    }

    let mut pages = Vec::new();
    for line in lines.map(str::trim) {
        if line.is_empty() || line.starts_with('%') {
            continue;
        }
        let mut parts = line.split_whitespace();
        if parts.next() != Some("page") {
            return Err(invalid(line));
        }
        let page = match parts.next() {
            Some("corrupt") => StubPage::Corrupt,
            Some(dims) => {
                let (w, h) = dims.split_once('x').ok_or_else(|| invalid(line))?;
                let delay_ms = match parts.next() {
                    Some(d) => d
                        .strip_prefix("delay=")
                        .and_then(|ms| ms.parse().ok())
                        .ok_or_else(|| invalid(line))?,
                    None => 0,
                };
                StubPage::Sized {
                    width_pt: w.parse().map_err(|_| invalid(line))?,
                    height_pt: h.parse().map_err(|_| invalid(line))?,
                    delay_ms,
                }
            }
            None => return Err(invalid(line)),
        };
        pages.push(page);
    }
    Ok(pages)
}

/// Build a stub document with one page per `(width_pt, height_pt)`.
pub fn stub_pdf(pages: &[(u32, u32)]) -> Vec<u8> {
    let mut doc = format!("{HEADER}\n");
    for (w, h) in pages {
        doc.push_str(&format!("page {w}x{h}\n"));
    }
    doc.into_bytes()
}

/// Build a stub document from raw page lines.
pub fn stub_pdf_lines(lines: &[&str]) -> Vec<u8> {
    let mut doc = format!("{HEADER}\n");
    for line in lines {
        doc.push_str(line);
        doc.push('\n');
    }
    doc.into_bytes()
}

// ── Stub renderer ────────────────────────────────────────────────────────────

/// Counters observed by tests.
#[derive(Debug, Default)]
pub struct StubStats {
    /// Documents currently open.
    pub open: AtomicUsize,
    /// Highest value `open` ever reached.
    pub max_open: AtomicUsize,
    /// Pages rasterised successfully, across all documents.
    pub pages_rendered: AtomicUsize,
}

impl StubStats {
    pub fn open_now(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
pub struct StubRenderer {
    pub stats: Arc<StubStats>,
}

struct OpenGuard<'a>(&'a StubStats);

impl Drop for OpenGuard<'_> {
    fn drop(&mut self) {
        self.0.open.fetch_sub(1, Ordering::SeqCst);
    }
}

struct StubDocument<'a> {
    pages: Vec<StubPage>,
    stats: &'a StubStats,
}

impl RenderDocument for StubDocument<'_> {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn render_page(&self, index: usize, dpi: u32) -> Result<RasterImage, Pdf2PngError> {
        let page = self
            .pages
            .get(index)
            .ok_or(Pdf2PngError::RasterisationFailed {
                page: index + 1,
                detail: "out of range".into(),
            })?;
        match page {
            StubPage::Corrupt => Err(Pdf2PngError::RasterisationFailed {
                page: index + 1,
                detail: "FPDF_ERR_FORMAT: corrupt content stream".into(),
            }),
            StubPage::Sized {
                width_pt,
                height_pt,
                delay_ms,
            } => {
                if *delay_ms > 0 {
                    std::thread::sleep(Duration::from_millis(*delay_ms));
                }
                let w = pixel_extent(*width_pt, dpi);
                let h = pixel_extent(*height_pt, dpi);
                let seed = index as u32;
                let pixels = RgbaImage::from_fn(w, h, |x, y| {
                    Rgba([
                        (x.wrapping_add(seed * 31) % 256) as u8,
                        (y % 256) as u8,
                        ((w + h + seed) % 256) as u8,
                        255,
                    ])
                });
                self.stats.pages_rendered.fetch_add(1, Ordering::SeqCst);
                Ok(RasterImage::new(index, pixels))
            }
        }
    }
}

impl PageRenderer for StubRenderer {
    fn with_document(
        &self,
        bytes: &[u8],
        visit: &mut DocumentVisitor<'_>,
    ) -> Result<(), Pdf2PngError> {
        let pages = parse_stub(bytes)?;

        let now = self.stats.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_open.fetch_max(now, Ordering::SeqCst);
        let _guard = OpenGuard(&self.stats);

        let document = StubDocument {
            pages,
            stats: &self.stats,
        };
        visit(&document as &dyn RenderDocument)
    }
}

// ── Converter setup ──────────────────────────────────────────────────────────

/// Converter over a stub renderer rooted at `root`, with default settings.
pub async fn stub_converter(root: &Path) -> (Converter, Arc<StubStats>) {
    stub_converter_with(root, |b| b).await
}

/// Same as [`stub_converter`], letting the caller adjust the config.
pub async fn stub_converter_with(
    root: &Path,
    configure: impl FnOnce(ConversionConfigBuilder) -> ConversionConfigBuilder,
) -> (Converter, Arc<StubStats>) {
    let config: ConversionConfig = configure(ConversionConfig::builder().output_dir(root))
        .build()
        .expect("valid test config");
    let store = SessionStore::open(root).await.expect("open store");
    let renderer = Arc::new(StubRenderer::default());
    let stats = Arc::clone(&renderer.stats);
    (Converter::new(renderer, store, config), stats)
}

/// Number of entries directly under `dir`.
pub fn entry_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

/// Decode a PNG and return its dimensions.
pub fn png_dimensions(bytes: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)
        .expect("decodable png");
    (img.width(), img.height())
}
