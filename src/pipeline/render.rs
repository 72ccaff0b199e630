//! PDF rasterisation: render every page of a report to `DynamicImage` via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and blocks for the whole render. `tokio::task::spawn_blocking` keeps
//! that work off the async worker threads.
//!
//! ## Size
//!
//! Pages are rendered at the configured DPI, then capped so neither edge
//! exceeds `max_rendered_pixels`. Phone photos saved as PDF are often huge
//! pages; the cap keeps them inside the vision model's upload limits.

use crate::config::FillConfig;
use crate::error::DocFillError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One rendered page of one report.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// 1-indexed page number inside the report.
    pub source_page: usize,
    pub image: DynamicImage,
}

/// Rasterise every page of the PDF at `pdf_path`.
pub async fn render_report(
    pdf_path: &Path,
    config: &FillConfig,
) -> Result<Vec<RenderedPage>, DocFillError> {
    let path = pdf_path.to_path_buf();
    let dpi = config.dpi;
    let max_pixels = config.max_rendered_pixels;
    let password = config.password.clone();

    tokio::task::spawn_blocking(move || {
        render_report_blocking(&path, dpi, max_pixels, password.as_deref())
    })
    .await
    .map_err(|e| DocFillError::Internal(format!("Render task panicked: {}", e)))?
}

/// Bind to pdfium: `PDFIUM_LIB_PATH` when set, else the system library.
fn bind_pdfium() -> Result<Pdfium, DocFillError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(p) if !p.is_empty() => Pdfium::bind_to_library(PathBuf::from(p)),
        _ => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| DocFillError::PdfiumBindingFailed(e.to_string()))?;
    Ok(Pdfium::new(bindings))
}

fn render_report_blocking(
    pdf_path: &Path,
    dpi: u32,
    max_pixels: u32,
    password: Option<&str>,
) -> Result<Vec<RenderedPage>, DocFillError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_file(pdf_path, password)
        .map_err(|e| classify_load_error(pdf_path, password.is_some(), format!("{:?}", e)))?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("Report {} loaded: {} pages", pdf_path.display(), total_pages);

    let mut results = Vec::with_capacity(total_pages);

    for (idx, page) in pages.iter().enumerate() {
        let (width, height) = target_size(page.width().value, page.height().value, dpi, max_pixels);
        let render_config = PdfRenderConfig::new()
            .set_target_width(width)
            .set_maximum_height(height);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| DocFillError::RasterisationFailed {
                path: pdf_path.to_path_buf(),
                page: idx + 1,
                detail: format!("{:?}", e),
            })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );

        results.push(RenderedPage {
            source_page: idx + 1,
            image,
        });
    }

    Ok(results)
}

/// Pixel size for a page of `w_pt` × `h_pt` points at `dpi`, scaled down so
/// the longer edge fits in `max_pixels`.
fn target_size(w_pt: f32, h_pt: f32, dpi: u32, max_pixels: u32) -> (i32, i32) {
    let scale = dpi as f32 / 72.0;
    let (mut w, mut h) = (w_pt * scale, h_pt * scale);
    let longest = w.max(h);
    if longest > max_pixels as f32 {
        let shrink = max_pixels as f32 / longest;
        w *= shrink;
        h *= shrink;
    }
    ((w.round() as i32).max(1), (h.round() as i32).max(1))
}

fn classify_load_error(path: &Path, had_password: bool, detail: String) -> DocFillError {
    if detail.contains("Password") || detail.contains("password") {
        if had_password {
            DocFillError::WrongPassword {
                path: path.to_path_buf(),
            }
        } else {
            DocFillError::PasswordRequired {
                path: path.to_path_buf(),
            }
        }
    } else {
        DocFillError::CorruptPdf {
            path: path.to_path_buf(),
            detail,
        }
    }
}
