//! Image encoding: `DynamicImage` → base64 PNG wrapped in a [`PageImage`].
//!
//! PNG is lossless. Scanned forms are mostly small print on noisy
//! backgrounds, and JPEG artefacts around glyphs cost more OCR accuracy than
//! the larger upload costs time. `detail: "high"` lets GPT-4-class models use
//! their full tile budget instead of one low-resolution overview.

use crate::output::PageImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page for the vision model.
pub fn encode_page(
    img: &DynamicImage,
    page_num: usize,
    source: &str,
    source_page: usize,
) -> Result<PageImage, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded page {} → {} bytes base64", page_num, b64.len());

    Ok(PageImage {
        page_num,
        source: source.to_string(),
        source_page,
        width: img.width(),
        height: img.height(),
        image: ImageData::new(b64, "image/png").with_detail("high"),
    })
}

/// Wrap an already encoded PNG, e.g. a page image the caller rendered itself.
pub fn page_from_png(png: &[u8], page_num: usize, source: &str) -> Result<PageImage, image::ImageError> {
    let img = image::load_from_memory_with_format(png, image::ImageFormat::Png)?;
    Ok(PageImage {
        page_num,
        source: source.to_string(),
        source_page: 1,
        width: img.width(),
        height: img.height(),
        image: ImageData::new(STANDARD.encode(png), "image/png").with_detail("high"),
    })
}
