//! Page rasterization
//!
//! Rendering sits behind the [`PageRenderer`] trait so the blank page
//! detector and thumbnails work with any backend. The pdfium backend is
//! compiled with the `pdfium` feature and needs libpdfium at runtime.

use std::io::Cursor;

use base64::Engine;
use image::{ImageFormat, RgbaImage};
use serde::Serialize;

use crate::document::PdfDocument;
use crate::error::{PdfStudioError, Result};

/// RGBA pixels, 4 bytes per pixel, row-major
pub type PixelBuffer = RgbaImage;

/// Scale used for content analysis (blank detection)
pub const ANALYSIS_SCALE: f32 = 0.2;

/// Scale used for preview thumbnails
pub const THUMBNAIL_SCALE: f32 = 0.5;

pub trait PageRenderer {
    /// Rasterize one page (1-based) at `scale` times its size in points
    fn render(&self, doc: &PdfDocument, page_number: u32, scale: f32) -> Result<PixelBuffer>;

    /// Rasterize `pages` in order, handing each buffer to `on_page` before
    /// the next page is rendered
    fn render_pages(
        &self,
        doc: &PdfDocument,
        pages: &[u32],
        scale: f32,
        on_page: &mut dyn FnMut(u32, PixelBuffer) -> Result<()>,
    ) -> Result<()> {
        for &page_number in pages {
            let pixels = self.render(doc, page_number, scale)?;
            on_page(page_number, pixels)?;
        }
        Ok(())
    }
}

fn check_scale(scale: f32) -> Result<()> {
    if !(scale.is_finite() && scale > 0.0) {
        return Err(PdfStudioError::InvalidArgument(format!(
            "Render scale must be positive, got {}",
            scale
        )));
    }
    Ok(())
}

/// 0-based page index as pdfium's `u16`, or a range error
#[cfg_attr(not(feature = "pdfium"), allow(dead_code))]
fn page_index(page_number: u32, page_count: u32) -> Result<u16> {
    page_number
        .checked_sub(1)
        .and_then(|index| u16::try_from(index).ok())
        .ok_or(PdfStudioError::PageRangeError {
            page: page_number,
            page_count,
        })
}

/// PNG-encoded page preview
#[derive(Debug, Clone, Serialize)]
pub struct Thumbnail {
    pub page_number: u32,
    pub width: u32,
    pub height: u32,
    #[serde(skip)]
    pub png: Vec<u8>,
}

impl Thumbnail {
    pub fn to_data_url(&self) -> String {
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&self.png)
        )
    }
}

/// Render a page and encode it as PNG
pub fn preview_thumbnail(
    doc: &PdfDocument,
    renderer: &dyn PageRenderer,
    page_number: u32,
    scale: f32,
) -> Result<Thumbnail> {
    doc.check_page(page_number)?;
    check_scale(scale)?;

    let pixels = renderer.render(doc, page_number, scale)?;
    let mut png = Vec::new();
    pixels
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| PdfStudioError::RenderError(format!("PNG encoding failed: {}", e)))?;

    Ok(Thumbnail {
        page_number,
        width: pixels.width(),
        height: pixels.height(),
        png,
    })
}

#[cfg(feature = "pdfium")]
pub use pdfium_backend::PdfiumRenderer;

#[cfg(feature = "pdfium")]
mod pdfium_backend {
    use std::path::Path;

    use pdfium_render::prelude::*;
    use tracing::debug;

    use super::{check_scale, page_index, PageRenderer, PixelBuffer};
    use crate::document::PdfDocument as Document;
    use crate::error::{PdfStudioError, Result};

    /// Renderer backed by the pdfium library
    pub struct PdfiumRenderer {
        pdfium: Pdfium,
    }

    impl PdfiumRenderer {
        /// Bind to libpdfium, trying `library_dir` first when given and the
        /// system library otherwise
        pub fn new(library_dir: Option<&Path>) -> Result<Self> {
            let bindings = match library_dir {
                Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                    dir,
                ))
                .or_else(|_| Pdfium::bind_to_system_library()),
                None => Pdfium::bind_to_system_library(),
            }
            .map_err(|e| {
                PdfStudioError::RenderError(format!("Failed to bind to Pdfium library: {}", e))
            })?;

            Ok(Self {
                pdfium: Pdfium::new(bindings),
            })
        }

        fn render_loaded(
            &self,
            loaded: &pdfium_render::prelude::PdfDocument,
            page_number: u32,
            scale: f32,
        ) -> Result<PixelBuffer> {
            let index = page_index(page_number, u32::from(loaded.pages().len()))?;
            let page = loaded
                .pages()
                .get(index)
                .map_err(|e| PdfStudioError::RenderError(e.to_string()))?;

            let width = ((page.width().value * scale).round() as i32).max(1);
            let height = ((page.height().value * scale).round() as i32).max(1);
            let config = PdfRenderConfig::new()
                .set_target_width(width)
                .set_target_height(height);

            let bitmap = page
                .render_with_config(&config)
                .map_err(|e| PdfStudioError::RenderError(e.to_string()))?;

            debug!(page = page_number, width, height, "Rendered page");
            Ok(bitmap.as_image().to_rgba8())
        }

        fn open<'a>(
            &'a self,
            doc: &'a Document,
        ) -> Result<pdfium_render::prelude::PdfDocument<'a>> {
            self.pdfium
                .load_pdf_from_byte_slice(doc.bytes(), None)
                .map_err(|e| PdfStudioError::RenderError(e.to_string()))
        }
    }

    impl PageRenderer for PdfiumRenderer {
        fn render(&self, doc: &Document, page_number: u32, scale: f32) -> Result<PixelBuffer> {
            doc.check_page(page_number)?;
            check_scale(scale)?;
            let loaded = self.open(doc)?;
            self.render_loaded(&loaded, page_number, scale)
        }

        fn render_pages(
            &self,
            doc: &Document,
            pages: &[u32],
            scale: f32,
            on_page: &mut dyn FnMut(u32, PixelBuffer) -> Result<()>,
        ) -> Result<()> {
            for &page_number in pages {
                doc.check_page(page_number)?;
            }
            check_scale(scale)?;

            // Parse once for the whole batch
            let loaded = self.open(doc)?;
            for &page_number in pages {
                let pixels = self.render_loaded(&loaded, page_number, scale)?;
                on_page(page_number, pixels)?;
            }
            Ok(())
        }
    }
}
