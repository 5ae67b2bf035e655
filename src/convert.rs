//! Conversion orchestrator: PDF bytes → stored PNG pages → manifest.
//!
//! ## Request lifecycle
//!
//! ```text
//! validate ─▶ open ─▶ create session ─▶ page 1 … page N ─▶ manifest
//!     │         │           │                 │
//!     └─────────┴───────────┴─────────────────┴──▶ error (no manifest)
//! ```
//!
//! ## Why a channel between render and store?
//!
//! pdfium is synchronous and CPU-bound, so the document lives on a
//! `spawn_blocking` thread for its whole life. Each encoded page crosses to
//! the async side through a bounded channel of capacity one, where the
//! session store writes it. This gives three properties at once:
//!
//! * **Bounded memory.** The renderer cannot run ahead of the writer by more
//!   than one page.
//! * **Ordering.** Pages are produced, written and listed in index order.
//! * **Cancellation.** If the request future is dropped (client disconnect,
//!   timeout, storage failure), the receiver goes with it; the renderer sees
//!   a closed channel before the next page and unwinds, releasing the page
//!   and the document.
//!
//! While the render thread waits for the writer it holds no pdfium lock, so
//! a slow disk in one request does not stall rendering in another. pdfium
//! itself still runs one native call at a time across the process.
//!
//! A conversion that fails after the session directory was created leaves
//! that directory behind with whatever pages were written. Sessions are not
//! commits; callers only ever learn a session id from a complete manifest.

use crate::config::ConversionConfig;
use crate::error::Pdf2PngError;
use crate::output::{ConversionOutput, ConversionStats, PageArtifact};
use crate::pipeline::encode;
use crate::pipeline::input;
use crate::pipeline::render::{PageRenderer, PdfiumRenderer, RenderDocument};
use crate::store::{PageName, SessionStore};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Messages from the render thread to the store writer.
#[derive(Debug)]
enum RenderEvent {
    /// The document opened; exactly `page_count` pages follow on success.
    Opened { page_count: usize },
    /// One encoded page.
    Page(RenderedPage),
}

#[derive(Debug)]
struct RenderedPage {
    index: usize,
    png: Vec<u8>,
    width: u32,
    height: u32,
    render_ms: u64,
}

/// Runs conversions against one renderer and one session store.
///
/// Cheap to share behind an `Arc`; every call to
/// [`convert_bytes`](Self::convert_bytes) owns its document, pages and
/// session exclusively. Concurrent conversions only meet inside pdfium,
/// which serialises individual native calls.
pub struct Converter {
    renderer: Arc<dyn PageRenderer>,
    store: SessionStore,
    config: ConversionConfig,
}

impl Converter {
    pub fn new(
        renderer: Arc<dyn PageRenderer>,
        store: SessionStore,
        config: ConversionConfig,
    ) -> Self {
        Self {
            renderer,
            store,
            config,
        }
    }

    /// Build a converter backed by pdfium, rooted at `config.output_dir`.
    ///
    /// Binds pdfium up front so a missing library fails here. The binding
    /// is process-wide and shared with every other pdfium converter.
    pub async fn with_pdfium(config: ConversionConfig) -> Result<Self, Pdf2PngError> {
        let lib_path = config.pdfium_lib_path.clone();
        let renderer =
            tokio::task::spawn_blocking(move || PdfiumRenderer::bind(lib_path.as_deref()))
                .await
                .map_err(|e| Pdf2PngError::Internal(format!("pdfium bind panicked: {e}")))??;

        let store = SessionStore::open(&config.output_dir).await?;
        Ok(Self::new(Arc::new(renderer), store, config))
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Validate an uploaded file, then convert it.
    ///
    /// `filename` is the client-supplied name; it must end in `.pdf`
    /// (any case).
    pub async fn convert_upload<B>(
        &self,
        filename: Option<&str>,
        bytes: B,
    ) -> Result<ConversionOutput, Pdf2PngError>
    where
        B: AsRef<[u8]> + Send + 'static,
    {
        input::validate_upload(filename, bytes.as_ref())?;
        self.convert_bytes(bytes).await
    }

    /// Convert raw PDF bytes into a new session.
    ///
    /// # Errors
    /// - client input: empty body, missing `%PDF` signature
    /// - render: the document would not open, or a page failed to rasterise
    ///   or encode
    /// - storage: the session directory or a page file could not be written
    /// - internal: timeout, pdfium unavailable, render task panic
    pub async fn convert_bytes<B>(&self, bytes: B) -> Result<ConversionOutput, Pdf2PngError>
    where
        B: AsRef<[u8]> + Send + 'static,
    {
        input::check_pdf_bytes(bytes.as_ref())?;

        let secs = self.config.timeout_secs;
        match tokio::time::timeout(self.config.timeout(), self.run(bytes)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Conversion exceeded {}s; abandoning", secs);
                Err(Pdf2PngError::Timeout { secs })
            }
        }
    }

    async fn run<B>(&self, bytes: B) -> Result<ConversionOutput, Pdf2PngError>
    where
        B: AsRef<[u8]> + Send + 'static,
    {
        let total_start = Instant::now();
        let byte_len = bytes.as_ref().len();
        info!("Starting conversion: {} bytes at {} dpi", byte_len, self.config.dpi);

        // ── Step 1: Open the document on a blocking thread ───────────────────
        let (tx, mut rx) = mpsc::channel::<RenderEvent>(1);
        let renderer = Arc::clone(&self.renderer);
        let dpi = self.config.dpi;
        let task = tokio::task::spawn_blocking(move || {
            render_document(renderer.as_ref(), bytes.as_ref(), dpi, &tx)
        });

        let page_count = match rx.recv().await {
            Some(RenderEvent::Opened { page_count }) => page_count,
            Some(RenderEvent::Page(_)) => {
                return Err(Pdf2PngError::Internal(
                    "renderer produced a page before opening the document".into(),
                ))
            }
            None => {
                // The renderer hung up without opening: surface its error.
                return Err(match join_render(task).await {
                    Err(e) => e,
                    Ok(()) => Pdf2PngError::Internal(
                        "renderer exited without opening the document".into(),
                    ),
                });
            }
        };

        // ── Step 2: Allocate the session ─────────────────────────────────────
        let session = self.store.create_session().await?;
        info!(session_id = %session, pages = page_count, "PDF opened; session created");

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_conversion_start(page_count);
        }

        // ── Step 3: Store pages in order as they arrive ──────────────────────
        let mut pages: Vec<PageArtifact> = Vec::with_capacity(page_count);
        let mut stats = ConversionStats {
            total_pages: page_count,
            ..ConversionStats::default()
        };

        while let Some(event) = rx.recv().await {
            let page = match event {
                RenderEvent::Page(page) => page,
                RenderEvent::Opened { .. } => {
                    return Err(Pdf2PngError::Internal(
                        "renderer opened the document twice".into(),
                    ))
                }
            };
            if page.index != pages.len() {
                return Err(Pdf2PngError::Internal(format!(
                    "page {} arrived out of order (expected {})",
                    page.index + 1,
                    pages.len() + 1
                )));
            }

            let name = PageName::for_index(page.index);
            let locator = self.store.put(&session, name, &page.png).await?;

            stats.total_bytes += page.png.len() as u64;
            stats.render_duration_ms += page.render_ms;
            if let Some(ref cb) = self.config.progress_callback {
                cb.on_page_complete(name.page_num(), page_count, page.png.len());
            }

            pages.push(PageArtifact {
                page_num: name.page_num(),
                file_name: name.to_string(),
                locator,
                width: page.width,
                height: page.height,
                size_bytes: page.png.len(),
            });
        }

        // ── Step 4: Collect the renderer's verdict ───────────────────────────
        if let Err(e) = join_render(task).await {
            warn!(session_id = %session, "Conversion failed after {} pages: {}", pages.len(), e);
            return Err(e);
        }
        if pages.len() != page_count {
            return Err(Pdf2PngError::Internal(format!(
                "stored {} of {} pages",
                pages.len(),
                page_count
            )));
        }

        stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
        info!(
            session_id = %session,
            "Conversion complete: {} pages, {} bytes, {}ms total",
            page_count, stats.total_bytes, stats.total_duration_ms
        );

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_conversion_complete(page_count);
        }

        Ok(ConversionOutput {
            session_id: session,
            pages,
            stats,
        })
    }
}

/// Await the render thread and flatten a panic into an error.
async fn join_render(task: JoinHandle<Result<(), Pdf2PngError>>) -> Result<(), Pdf2PngError> {
    task.await
        .map_err(|e| Pdf2PngError::Internal(format!("Render task panicked: {}", e)))?
}

/// Blocking half: open, then render and encode each page in turn.
fn render_document(
    renderer: &dyn PageRenderer,
    bytes: &[u8],
    dpi: u32,
    tx: &mpsc::Sender<RenderEvent>,
) -> Result<(), Pdf2PngError> {
    renderer.with_document(bytes, &mut |doc: &dyn RenderDocument| {
        let page_count = doc.page_count();
        send(tx, RenderEvent::Opened { page_count })?;

        for index in 0..page_count {
            if tx.is_closed() {
                debug!("Receiver gone; stopping before page {}", index + 1);
                return Err(Pdf2PngError::Cancelled);
            }

            let started = Instant::now();
            let raster = doc.render_page(index, dpi)?;
            let (width, height) = (raster.width(), raster.height());
            let png = encode::encode_page(raster)?;

            send(
                tx,
                RenderEvent::Page(RenderedPage {
                    index,
                    png,
                    width,
                    height,
                    render_ms: started.elapsed().as_millis() as u64,
                }),
            )?;
        }
        Ok(())
    })
}

fn send(tx: &mpsc::Sender<RenderEvent>, event: RenderEvent) -> Result<(), Pdf2PngError> {
    tx.blocking_send(event).map_err(|_| Pdf2PngError::Cancelled)
}
