//! Upload gate: cheap checks that run before any native or disk resource
//! is acquired.
//!
//! Everything rejected here is a client error, and because the gate runs
//! first no session directory is ever created for such an upload.

use crate::error::Pdf2PngError;
use tracing::debug;

/// Signature every PDF file starts with.
pub const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// `true` when `filename` ends in `.pdf`, ignoring ASCII case.
pub fn has_pdf_extension(filename: &str) -> bool {
    let name = filename.trim();
    name.len() > 4
        && name
            .get(name.len() - 4..)
            .is_some_and(|ext| ext.eq_ignore_ascii_case(".pdf"))
}

/// Check that `bytes` is non-empty and starts with `%PDF`.
pub fn check_pdf_bytes(bytes: &[u8]) -> Result<(), Pdf2PngError> {
    if bytes.is_empty() {
        return Err(Pdf2PngError::EmptyUpload);
    }
    if !bytes.starts_with(PDF_MAGIC) {
        let magic = bytes[..bytes.len().min(PDF_MAGIC.len())].to_vec();
        return Err(Pdf2PngError::NotAPdf { magic });
    }
    Ok(())
}

/// Validate an uploaded file before conversion.
///
/// `filename` is the client-supplied name from the multipart field; `None`
/// means the client sent no file at all.
pub fn validate_upload(filename: Option<&str>, bytes: &[u8]) -> Result<(), Pdf2PngError> {
    let filename = filename.ok_or(Pdf2PngError::MissingFile)?;
    if !has_pdf_extension(filename) {
        return Err(Pdf2PngError::NotPdfExtension {
            filename: filename.to_string(),
        });
    }
    check_pdf_bytes(bytes)?;
    debug!(filename, bytes = bytes.len(), "Upload accepted");
    Ok(())
}
