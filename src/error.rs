//! Error types for the edgequake-pdf2png library.
//!
//! Every failure in the pipeline is a [`Pdf2PngError`]. Each variant belongs
//! to exactly one [`ErrorKind`], the coarse category the HTTP layer (or any
//! other caller) uses to decide how to report it:
//!
//! | Kind          | Typical cause                                      | HTTP |
//! |---------------|----------------------------------------------------|------|
//! | `ClientInput` | empty body, wrong extension, not a PDF             | 400  |
//! | `Render`      | `%PDF` body won't open, page fails to render       | 500  |
//! | `Storage`     | session directory or page file cannot be written   | 500  |
//! | `NotFound`    | unknown session or page file                       | 404  |
//! | `Internal`    | pdfium missing, timeout, task panic                | 500  |
//!
//! There is no partial success: a conversion either yields a complete
//! manifest or exactly one of these errors.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse error category, stable across variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller sent something we cannot convert.
    ClientInput,
    /// The document could not be opened, rasterised or encoded.
    Render,
    /// The session store could not create or write an artifact.
    Storage,
    /// The requested session or file does not exist.
    NotFound,
    /// Anything else: misconfiguration, timeouts, panics.
    Internal,
}

impl ErrorKind {
    /// Short machine-readable label used in JSON error bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ClientInput => "client_input",
            ErrorKind::Render => "render_failure",
            ErrorKind::Storage => "storage_failure",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Internal => "internal",
        }
    }
}

/// All errors returned by the edgequake-pdf2png library.
#[derive(Debug, Error)]
pub enum Pdf2PngError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The upload carried no file field or no file name.
    #[error("No file provided. Upload the PDF in a multipart field named 'file'.")]
    MissingFile,

    /// The uploaded file name does not end in `.pdf`.
    #[error("The file must be a PDF (got '{filename}')")]
    NotPdfExtension { filename: String },

    /// The uploaded body is empty.
    #[error("The uploaded file is empty")]
    EmptyUpload,

    /// The body does not start with the `%PDF` signature.
    #[error("The uploaded file is not a valid PDF (first bytes: {magic:?})")]
    NotAPdf { magic: Vec<u8> },

    // ── Render errors ─────────────────────────────────────────────────────
    /// pdfium refused to open a body that carried the `%PDF` signature
    /// (broken xref, encryption, …). `detail` is native and only logged.
    #[error("The PDF could not be opened: {detail}")]
    InvalidDocument { detail: String },

    /// pdfium returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// The raster buffer for a page could not be encoded as PNG.
    #[error("PNG encoding failed for page {page}: {detail}")]
    EncodeFailed { page: usize, detail: String },

    // ── Storage errors ────────────────────────────────────────────────────
    /// A session directory or page file could not be created or written.
    #[error("Storage failure at '{path}': {source}")]
    StorageFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Lookup errors ─────────────────────────────────────────────────────
    /// The session id is malformed or unknown.
    #[error("Session not found")]
    SessionNotFound,

    /// The file name is malformed or absent from the session.
    #[error("File not found")]
    ArtifactNotFound,

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Lifecycle errors ──────────────────────────────────────────────────
    /// The conversion exceeded its wall-clock budget.
    #[error("Conversion timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The consumer of rendered pages went away before the document finished.
    #[error("Conversion cancelled")]
    Cancelled,

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2PngError {
    /// The category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Pdf2PngError::MissingFile
            | Pdf2PngError::NotPdfExtension { .. }
            | Pdf2PngError::EmptyUpload
            | Pdf2PngError::NotAPdf { .. } => ErrorKind::ClientInput,
            Pdf2PngError::InvalidDocument { .. }
            | Pdf2PngError::RasterisationFailed { .. }
            | Pdf2PngError::EncodeFailed { .. } => ErrorKind::Render,
            Pdf2PngError::StorageFailed { .. } => ErrorKind::Storage,
            Pdf2PngError::SessionNotFound | Pdf2PngError::ArtifactNotFound => ErrorKind::NotFound,
            Pdf2PngError::InvalidConfig(_)
            | Pdf2PngError::PdfiumBindingFailed(_)
            | Pdf2PngError::Timeout { .. }
            | Pdf2PngError::Cancelled
            | Pdf2PngError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Shorthand for building a [`Pdf2PngError::StorageFailed`].
    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Pdf2PngError::StorageFailed {
            path: path.into(),
            source,
        }
    }
}
