// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF page rasterisation. The pdfium-backed implementation is compiled only
// with the "render" feature; without it, callers get a Render error.

use image::DynamicImage;
use wandelwerk_core::error::Result;

/// Turns every page of a PDF into a raster image.
pub trait PageRasterizer: Send + Sync {
    /// Render all pages at `scale` pixels per PDF point (dpi / 72).
    fn rasterize(&self, pdf: &[u8], scale: f32) -> Result<Vec<DynamicImage>>;
}

/// The rasteriser compiled into this build, if any.
pub fn default_rasterizer() -> Option<std::sync::Arc<dyn PageRasterizer>> {
    #[cfg(feature = "render")]
    {
        match pdfium::PdfiumRasterizer::bind() {
            Ok(rasterizer) => return Some(std::sync::Arc::new(rasterizer)),
            Err(err) => tracing::warn!(%err, "pdfium unavailable, page rendering disabled"),
        }
    }
    None
}

#[cfg(feature = "render")]
pub mod pdfium {
    use image::DynamicImage;
    use pdfium_render::prelude::*;
    use tracing::{debug, info, instrument};
    use wandelwerk_core::error::{Result, WandelError};

    use super::PageRasterizer;

    /// Rasteriser backed by the system pdfium library. pdfium keeps
    /// thread-local state, so each call binds its own instance.
    pub struct PdfiumRasterizer;

    impl PdfiumRasterizer {
        /// Check that the pdfium shared library can be loaded.
        pub fn bind() -> Result<Self> {
            load()?;
            Ok(Self)
        }
    }

    fn load() -> Result<Pdfium> {
        let bindings = Pdfium::bind_to_system_library()
            .map_err(|err| WandelError::Render(format!("cannot load pdfium: {:?}", err)))?;
        Ok(Pdfium::new(bindings))
    }

    impl PageRasterizer for PdfiumRasterizer {
        #[instrument(skip(self, pdf), fields(bytes_len = pdf.len()))]
        fn rasterize(&self, pdf: &[u8], scale: f32) -> Result<Vec<DynamicImage>> {
            let pdfium = load()?;
            let document = pdfium
                .load_pdf_from_byte_slice(pdf, None)
                .map_err(|err| WandelError::Decode(format!("pdfium could not open PDF: {:?}", err)))?;

            let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
            let pages = document.pages();
            info!(pages = pages.len(), scale, "Rasterising PDF");

            let mut images = Vec::with_capacity(pages.len() as usize);
            for (index, page) in pages.iter().enumerate() {
                let bitmap = page.render_with_config(&render_config).map_err(|err| {
                    WandelError::Render(format!("page {}: {:?}", index + 1, err))
                })?;
                let image = bitmap.as_image();
                debug!(
                    page = index + 1,
                    width = image.width(),
                    height = image.height(),
                    "Page rendered"
                );
                images.push(image);
            }
            Ok(images)
        }
    }
}
