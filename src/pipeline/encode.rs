//! Image encoding: `RasterImage` → PNG bytes.
//!
//! PNG is lossless, so rasterised text stays crisp, and the `image` crate
//! writes no ancillary metadata chunks beyond what decoders need. The
//! encoder takes the raster by value: once a page is encoded its decoded
//! pixels are gone, which keeps at most one decoded page alive per request.

use crate::error::Pdf2PngError;
use crate::pipeline::render::RasterImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page as PNG, consuming the raster.
pub fn encode_page(raster: RasterImage) -> Result<Vec<u8>, Pdf2PngError> {
    let page = raster.page_num();
    let pixels = raster.into_pixels();

    let mut buf = Vec::new();
    pixels
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| Pdf2PngError::EncodeFailed {
            page,
            detail: e.to_string(),
        })?;

    debug!(
        "Encoded page {} ({}x{}) → {} bytes PNG",
        page,
        pixels.width(),
        pixels.height(),
        buf.len()
    );
    Ok(buf)
}
