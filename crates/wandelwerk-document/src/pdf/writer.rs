// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF writer: build new PDF documents from raster images using `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: documents are built by constructing
// `PdfPage` structs containing `Vec<Op>` operation lists, then serialised via
// `PdfDocument::save()`.

use image::DynamicImage;
use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, RawImageData,
    RawImageFormat, XObjectTransform,
};
use tracing::{debug, info, instrument};
use wandelwerk_core::PaperSize;
use wandelwerk_core::error::{Result, WandelError};

/// Resolution at which an image's pixel size maps to its natural point size.
const IMAGE_DPI: f32 = 150.0;

/// Creates new PDF documents with one image per page.
pub struct PdfWriter {
    /// Paper size for page creation.
    paper_size: PaperSize,
    /// Blank border around each image, in millimetres.
    margin_mm: f32,
    /// Title metadata embedded in the PDF /Info dictionary.
    title: Option<String>,
}

/// Where an image lands on a page, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub scale: f32,
}

impl PdfWriter {
    /// Create a new writer targeting the given paper size.
    pub fn new(paper_size: PaperSize) -> Self {
        Self {
            paper_size,
            margin_mm: 15.0,
            title: None,
        }
    }

    /// Create a new writer defaulting to A4.
    pub fn a4() -> Self {
        Self::new(PaperSize::A4)
    }

    pub fn with_margin_mm(mut self, margin_mm: f32) -> Self {
        self.margin_mm = margin_mm.max(0.0);
        self
    }

    /// Set a title for the PDF metadata.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    /// Paper dimensions in printpdf's Mm units.
    fn page_dimensions(&self) -> (Mm, Mm) {
        let (w_mm, h_mm) = self.paper_size.dimensions_mm();
        (Mm(w_mm as f32), Mm(h_mm as f32))
    }

    /// Scale and offset that fit an image of `px_w` x `px_h` pixels inside
    /// the page margins, centred, preserving its aspect ratio. Small images
    /// are scaled up to fill the usable area.
    pub fn placement(&self, px_w: u32, px_h: u32) -> Placement {
        let (page_w, page_h) = self.page_dimensions();
        let margin = self.margin_mm.min(page_w.0 / 2.0).min(page_h.0 / 2.0);
        let usable_w_pt = Mm(page_w.0 - 2.0 * margin).into_pt().0;
        let usable_h_pt = Mm(page_h.0 - 2.0 * margin).into_pt().0;

        let img_w_pt = px_w.max(1) as f32 / IMAGE_DPI * 72.0;
        let img_h_pt = px_h.max(1) as f32 / IMAGE_DPI * 72.0;
        let scale = (usable_w_pt / img_w_pt).min(usable_h_pt / img_h_pt);

        let margin_pt = Mm(margin).into_pt().0;
        Placement {
            x: margin_pt + (usable_w_pt - img_w_pt * scale) / 2.0,
            y: margin_pt + (usable_h_pt - img_h_pt * scale) / 2.0,
            scale,
        }
    }

    /// Create a PDF with one page per image, in order.
    #[instrument(skip(self, images), fields(images = images.len()))]
    pub fn create_from_images(&self, images: &[DynamicImage]) -> Result<Vec<u8>> {
        if images.is_empty() {
            return Err(WandelError::Precondition(
                "at least one image is needed to build a PDF".into(),
            ));
        }
        let (page_w, page_h) = self.page_dimensions();
        let title = self.title.as_deref().unwrap_or("Wandelwerk Images");
        info!(paper = ?self.paper_size, title, "Creating image PDF");

        let mut doc = PdfDocument::new(title);
        let mut pages = Vec::with_capacity(images.len());

        for image in images {
            let rgb_image = image.to_rgb8();
            let (px_w, px_h) = rgb_image.dimensions();
            let raw = RawImage {
                pixels: RawImageData::U8(rgb_image.into_raw()),
                width: px_w as usize,
                height: px_h as usize,
                data_format: RawImageFormat::RGB8,
                tag: Vec::new(),
            };
            let xobject_id = doc.add_image(&raw);
            let placement = self.placement(px_w, px_h);

            let ops = vec![Op::UseXobject {
                id: xobject_id,
                transform: XObjectTransform {
                    translate_x: Some(Pt(placement.x)),
                    translate_y: Some(Pt(placement.y)),
                    scale_x: Some(placement.scale),
                    scale_y: Some(placement.scale),
                    dpi: Some(IMAGE_DPI),
                    rotate: None,
                },
            }];
            debug!(px_w, px_h, ?placement, "Image placed on page");
            pages.push(PdfPage::new(page_w, page_h, ops));
        }

        doc.with_pages(pages);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = doc.save(&PdfSaveOptions::default(), &mut warnings);
        debug!(warnings = warnings.len(), output_bytes = output.len(), "Image PDF written");
        Ok(output)
    }

    /// Decode encoded images and build a PDF from them.
    pub fn create_from_encoded(&self, sources: &[&[u8]]) -> Result<Vec<u8>> {
        let images = sources
            .iter()
            .enumerate()
            .map(|(index, bytes)| {
                image::load_from_memory(bytes).map_err(|err| {
                    WandelError::Decode(format!("failed to decode image #{}: {}", index + 1, err))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        self.create_from_images(&images)
    }
}
