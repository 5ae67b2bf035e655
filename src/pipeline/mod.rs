//! Pipeline stages for PDF-to-PNG conversion.
//!
//! Each submodule implements exactly one transformation step. The
//! orchestrator in [`crate::convert`] strings them together and the session
//! store in [`crate::store`] persists the result.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ store
//! (gate)    (pdfium)   (PNG)      (session dir)
//! ```
//!
//! 1. [`input`]: reject uploads that are empty, mis-named or lack the
//!    `%PDF` signature before anything is allocated
//! 2. [`render`]: open the document and rasterise one page at a time;
//!    runs in `spawn_blocking` because pdfium is synchronous and CPU-bound
//! 3. [`encode`]: turn one `RasterImage` into PNG bytes, consuming it so
//!    the decoded pixels are released before the next page is rendered

pub mod encode;
pub mod input;
pub mod render;
