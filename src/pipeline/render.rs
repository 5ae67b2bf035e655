//! PDF rasterisation: the renderer adapter and its pdfium backend.
//!
//! ## Scoped documents
//!
//! A native document handle must be released on every exit path, and no
//! operation may touch it afterwards. Rather than handing out a handle with
//! a `close()` method, [`PageRenderer::with_document`] lends the open
//! document to a visitor closure and releases it when the closure returns,
//! whether it returned `Ok`, `Err`, or unwound. A closed document cannot be
//! reached because it is never nameable outside that call.
//!
//! ## One page at a time
//!
//! [`RenderDocument::render_page`] opens the page, rasterises it and drops
//! the page handle and the pdfium bitmap before returning. Only the decoded
//! [`RasterImage`] escapes, and the encoder consumes it. Peak native memory
//! is therefore about one page regardless of document length.
//!
//! ## One binding per process
//!
//! pdfium keeps process-global state, and pdfium-render's thread-safe
//! bindings hold a process-wide lock from library init until the `Pdfium`
//! is dropped. A binding per document would therefore hold that lock for a
//! whole conversion, page writes included. [`PdfiumRenderer::bind`] binds
//! once into a process-wide slot instead, so the lock is only taken per
//! native call: documents from separate requests interleave page by page,
//! and PNG encoding and storage run outside pdfium altogether.

use crate::error::Pdf2PngError;
use image::RgbaImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use tracing::{debug, info, warn};

/// PDF user space unit: 72 points per inch.
pub const POINTS_PER_INCH: f32 = 72.0;

/// Scale factor applied to page points for a given resolution.
pub fn scale_factor(dpi: u32) -> f32 {
    dpi as f32 / POINTS_PER_INCH
}

/// Pixel extent of a page edge of `points` length at `dpi`.
///
/// Rounded to nearest; never smaller than one pixel.
pub fn pixel_extent(points: f32, dpi: u32) -> u32 {
    let px = (points * scale_factor(dpi)).round();
    if px.is_finite() && px >= 1.0 {
        px as u32
    } else {
        1
    }
}

/// A decoded RGBA8 pixel buffer for one page.
#[derive(Debug, Clone)]
pub struct RasterImage {
    page_index: usize,
    pixels: RgbaImage,
}

impl RasterImage {
    pub fn new(page_index: usize, pixels: RgbaImage) -> Self {
        Self { page_index, pixels }
    }

    /// Zero-based page index.
    pub fn page_index(&self) -> usize {
        self.page_index
    }

    /// One-based page number.
    pub fn page_num(&self) -> usize {
        self.page_index + 1
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn into_pixels(self) -> RgbaImage {
        self.pixels
    }
}

/// An open document, valid only inside [`PageRenderer::with_document`].
pub trait RenderDocument {
    /// Number of pages in the document.
    fn page_count(&self) -> usize;

    /// Rasterise page `index` (zero-based) at `dpi`.
    ///
    /// The page handle is released before this returns, on success and on
    /// failure alike.
    fn render_page(&self, index: usize, dpi: u32) -> Result<RasterImage, Pdf2PngError>;
}

/// Visitor that receives the open document.
pub type DocumentVisitor<'v> =
    dyn FnMut(&dyn RenderDocument) -> Result<(), Pdf2PngError> + 'v;

/// The single capability the orchestrator needs from a PDF backend.
///
/// Implementations must be callable from several blocking threads at once;
/// each call owns its own document exclusively.
pub trait PageRenderer: Send + Sync {
    /// Open `bytes`, pass the document to `visit`, then release it.
    ///
    /// # Errors
    /// - [`Pdf2PngError::InvalidDocument`] when the bytes cannot be opened
    /// - [`Pdf2PngError::PdfiumBindingFailed`] when the backend is unavailable
    /// - whatever `visit` returns
    fn with_document(
        &self,
        bytes: &[u8],
        visit: &mut DocumentVisitor<'_>,
    ) -> Result<(), Pdf2PngError>;
}

/// The process-wide pdfium binding.
static PDFIUM: OnceLock<Pdfium> = OnceLock::new();

/// Held during first-time binding: only one `Pdfium` is ever created.
static BIND_LOCK: Mutex<()> = Mutex::new(());

/// [`PageRenderer`] backed by the pdfium library.
#[derive(Clone, Copy)]
pub struct PdfiumRenderer {
    pdfium: &'static Pdfium,
}

impl PdfiumRenderer {
    /// Bind pdfium, or reuse the binding an earlier call made.
    ///
    /// `lib_path` may name the library file itself or the directory
    /// containing it; `None` uses the system search path. Only the first
    /// successful bind in a process consults it.
    pub fn bind(lib_path: Option<&Path>) -> Result<Self, Pdf2PngError> {
        if let Some(pdfium) = PDFIUM.get() {
            return Ok(Self { pdfium });
        }

        let _guard = BIND_LOCK
            .lock()
            .map_err(|_| Pdf2PngError::Internal("pdfium bind lock poisoned".into()))?;
        if let Some(pdfium) = PDFIUM.get() {
            return Ok(Self { pdfium });
        }

        let bindings = match lib_path {
            Some(path) => Pdfium::bind_to_library(library_file(path)),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| Pdf2PngError::PdfiumBindingFailed(format!("{:?}", e)))?;

        let pdfium = PDFIUM.get_or_init(|| Pdfium::new(bindings));
        info!("pdfium library bound successfully");
        Ok(Self { pdfium })
    }
}

impl std::fmt::Debug for PdfiumRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfiumRenderer").finish_non_exhaustive()
    }
}

fn library_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        Pdfium::pdfium_platform_library_name_at_path(path)
    } else {
        path.to_path_buf()
    }
}

impl PageRenderer for PdfiumRenderer {
    fn with_document(
        &self,
        bytes: &[u8],
        visit: &mut DocumentVisitor<'_>,
    ) -> Result<(), Pdf2PngError> {
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| {
                warn!("pdfium could not open {} bytes: {:?}", bytes.len(), e);
                Pdf2PngError::InvalidDocument {
                    detail: format!("{:?}", e),
                }
            })?;

        let document = PdfiumDocument { document };
        info!(
            "PDF loaded: {} pages, {} bytes",
            document.page_count(),
            bytes.len()
        );

        // `document` is closed on every path out of here.
        visit(&document as &dyn RenderDocument)
    }
}

struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl RenderDocument for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn render_page(&self, index: usize, dpi: u32) -> Result<RasterImage, Pdf2PngError> {
        let page_num = index + 1;
        let total = self.page_count();
        if index >= total {
            return Err(Pdf2PngError::RasterisationFailed {
                page: page_num,
                detail: format!("page out of range (document has {total} pages)"),
            });
        }

        let page = self
            .document
            .pages()
            .get(index as u16)
            .map_err(|e| Pdf2PngError::RasterisationFailed {
                page: page_num,
                detail: format!("{:?}", e),
            })?;

        let width = pixel_extent(page.width().value, dpi);
        let height = pixel_extent(page.height().value, dpi);

        let render_config = PdfRenderConfig::new()
            .set_target_size(width as i32, height as i32)
            .rotate(PdfPageRenderRotation::None, false)
            .set_text_smoothing(true)
            .set_path_smoothing(true)
            .set_image_smoothing(true)
            .render_form_data(true);

        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            Pdf2PngError::RasterisationFailed {
                page: page_num,
                detail: format!("{:?}", e),
            }
        })?;

        let pixels = bitmap.as_image().into_rgba8();
        debug!(
            "Rendered page {} → {}x{} px at {} dpi",
            page_num,
            pixels.width(),
            pixels.height(),
            dpi
        );

        Ok(RasterImage::new(index, pixels))
    }
}
