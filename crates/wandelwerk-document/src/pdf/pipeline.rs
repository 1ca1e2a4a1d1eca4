// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF operation dispatch: merge, split, compress, watermark, protect stamp,
// rotate, reorder, PDF to images and images to PDF.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use wandelwerk_core::error::{Result, WandelError};
use wandelwerk_core::{
    Blob, CompressionLevel, EngineConfig, OutputFormat, PageRange, PaperSize, SourceFile,
};

use super::builder::{PdfAssembler, save_document};
use super::overlay::{self, PdfWatermark};
use super::reader::{DocumentInfo, PageInfo, PdfReader};
use super::render::{PageRasterizer, default_rasterizer};
use super::writer::PdfWriter;
use crate::image::ImageProcessor;

const PDF_MIME: &str = "application/pdf";

/// Label drawn by [`PdfOperation::Protect`].
pub const PROTECTED_LABEL: &str = "PROTECTED";

/// One operation of the document pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "kebab-case")]
pub enum PdfOperation {
    /// Concatenate all sources in order.
    Merge {
        /// One outline entry per source, titled with its file name.
        #[serde(default = "enabled")]
        bookmarks: bool,
        /// Copy Title/Author/Subject/Keywords from the first source.
        #[serde(default = "enabled")]
        copy_metadata: bool,
    },
    /// One output document per range.
    Split { ranges: Vec<PageRange> },
    /// Deflate streams, drop unused objects and, for the stronger levels,
    /// shrink page content.
    Compress {
        #[serde(default)]
        level: CompressionLevel,
    },
    Watermark(PdfWatermark),
    /// Visual "PROTECTED" stamp. The password is checked for presence only;
    /// no encryption is applied.
    Protect { password: String },
    Rotate {
        /// 1-based page numbers; all pages when absent.
        #[serde(default)]
        pages: Option<Vec<u32>>,
        degrees: i32,
    },
    /// Rebuild with pages in the given 1-based order.
    Reorder { order: Vec<u32> },
    /// One raster image per page.
    ToImages {
        #[serde(default)]
        dpi: Option<f32>,
        #[serde(default = "png")]
        format: OutputFormat,
        #[serde(default = "full_quality")]
        quality: u8,
    },
    /// Sources are images; one page per image.
    FromImages {
        #[serde(default)]
        paper: PaperSize,
    },
}

fn enabled() -> bool {
    true
}

fn png() -> OutputFormat {
    OutputFormat::Png
}

fn full_quality() -> u8 {
    92
}

impl PdfOperation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Merge { .. } => "merge",
            Self::Split { .. } => "split",
            Self::Compress { .. } => "compress",
            Self::Watermark(_) => "watermark",
            Self::Protect { .. } => "protect",
            Self::Rotate { .. } => "rotate",
            Self::Reorder { .. } => "reorder",
            Self::ToImages { .. } => "to-images",
            Self::FromImages { .. } => "from-images",
        }
    }

    /// Operations that consume every source at once and produce a single
    /// combined result.
    pub fn is_combining(&self) -> bool {
        matches!(self, Self::Merge { .. } | Self::FromImages { .. })
    }
}

/// Result of a document operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfOutput {
    Document(Blob),
    Documents(Vec<Blob>),
    Images(Vec<Blob>),
}

impl PdfOutput {
    pub fn into_blobs(self) -> Vec<Blob> {
        match self {
            Self::Document(blob) => vec![blob],
            Self::Documents(blobs) | Self::Images(blobs) => blobs,
        }
    }
}

/// Page count, metadata and page geometry of a document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub page_count: u32,
    pub info: DocumentInfo,
    pub pages: Vec<PageInfo>,
}

/// Runs document operations. Sources are never modified; every output is a
/// freshly serialised document or image.
#[derive(Clone)]
pub struct PdfPipeline {
    creator: String,
    margin_mm: f32,
    render_dpi: f32,
    thumbnail_dpi: f32,
    rasterizer: Option<Arc<dyn PageRasterizer>>,
}

impl std::fmt::Debug for PdfPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfPipeline")
            .field("creator", &self.creator)
            .field("render_dpi", &self.render_dpi)
            .field("rasterizer", &self.rasterizer.is_some())
            .finish()
    }
}

impl PdfPipeline {
    /// Pipeline with the rasteriser compiled into this build, if any.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            creator: config.pdf_creator.clone(),
            margin_mm: config.pdf_image_margin_mm,
            render_dpi: config.render_dpi,
            thumbnail_dpi: config.thumbnail_dpi,
            rasterizer: default_rasterizer(),
        }
    }

    /// Replace the page rasteriser.
    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        self.rasterizer = Some(rasterizer);
        self
    }

    pub fn can_render(&self) -> bool {
        self.rasterizer.is_some()
    }

    #[instrument(skip(self, sources, operation), fields(operation = operation.name(), sources = sources.len()))]
    pub fn operate(&self, sources: &[SourceFile], operation: &PdfOperation) -> Result<PdfOutput> {
        let output = match operation {
            PdfOperation::Merge {
                bookmarks,
                copy_metadata,
            } => PdfOutput::Document(self.merge(sources, *bookmarks, *copy_metadata)?),
            PdfOperation::Split { ranges } => {
                let reader = PdfReader::from_bytes(single(sources)?.bytes())?;
                let parts = reader.split(ranges)?;
                PdfOutput::Documents(parts.into_iter().map(|bytes| Blob::new(bytes, PDF_MIME)).collect())
            }
            PdfOperation::Compress { level } => {
                let source = single(sources)?;
                let reader = PdfReader::from_bytes(source.bytes())?;
                let mut document = reader.to_document();
                overlay::scale_pages(&mut document, level.pdf_scale())?;
                let bytes = save_document(&mut document, true)?;
                info!(
                    before = source.byte_size(),
                    after = bytes.len(),
                    ?level,
                    "PDF compressed"
                );
                PdfOutput::Document(Blob::new(bytes, PDF_MIME))
            }
            PdfOperation::Watermark(watermark) => {
                let reader = PdfReader::from_bytes(single(sources)?.bytes())?;
                let mut document = reader.to_document();
                overlay::apply_watermark(&mut document, watermark)?;
                PdfOutput::Document(Blob::new(save_document(&mut document, false)?, PDF_MIME))
            }
            PdfOperation::Protect { password } => {
                if password.trim().is_empty() {
                    return Err(WandelError::Validation("a password is required".into()));
                }
                let reader = PdfReader::from_bytes(single(sources)?.bytes())?;
                let mut document = reader.to_document();
                overlay::apply_protected_stamp(&mut document, PROTECTED_LABEL)?;
                warn!("protect applies a visual stamp only; the output is not encrypted");
                PdfOutput::Document(Blob::new(save_document(&mut document, false)?, PDF_MIME))
            }
            PdfOperation::Rotate { pages, degrees } => {
                let reader = PdfReader::from_bytes(single(sources)?.bytes())?;
                let bytes = reader.rotate_pages(pages.as_deref(), *degrees)?;
                PdfOutput::Document(Blob::new(bytes, PDF_MIME))
            }
            PdfOperation::Reorder { order } => {
                let reader = PdfReader::from_bytes(single(sources)?.bytes())?;
                PdfOutput::Document(Blob::new(reader.select_pages(order)?, PDF_MIME))
            }
            PdfOperation::ToImages {
                dpi,
                format,
                quality,
            } => {
                let dpi = dpi.unwrap_or(self.render_dpi);
                PdfOutput::Images(self.to_images(single(sources)?.bytes(), dpi, *format, *quality)?)
            }
            PdfOperation::FromImages { paper } => {
                if sources.is_empty() {
                    return Err(WandelError::Precondition(
                        "add at least one image to build a PDF".into(),
                    ));
                }
                let encoded: Vec<&[u8]> = sources.iter().map(SourceFile::bytes).collect();
                let writer = PdfWriter::new(*paper).with_margin_mm(self.margin_mm);
                PdfOutput::Document(Blob::new(writer.create_from_encoded(&encoded)?, PDF_MIME))
            }
        };
        Ok(output)
    }

    /// Concatenate sources in order. Every source is parsed before any
    /// output is assembled, so one bad file fails the whole merge.
    #[instrument(skip(self, sources), fields(sources = sources.len()))]
    pub fn merge(&self, sources: &[SourceFile], bookmarks: bool, copy_metadata: bool) -> Result<Blob> {
        if sources.len() < 2 {
            return Err(WandelError::Precondition(
                "merging needs at least two PDF files".into(),
            ));
        }
        let readers = sources
            .iter()
            .map(|source| {
                PdfReader::from_bytes(source.bytes()).map_err(|err| match err {
                    WandelError::Decode(detail) => {
                        WandelError::Decode(format!("{}: {}", source.name(), detail))
                    }
                    other => other,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut assembler = PdfAssembler::new();
        for (source, reader) in sources.iter().zip(&readers) {
            let appended = assembler.append_pages(reader.document(), &reader.page_ids())?;
            if bookmarks {
                if let Some(first) = appended.first() {
                    assembler.add_bookmark(source.stem(), *first);
                }
            }
        }
        if copy_metadata {
            assembler.copy_info_from(readers[0].document());
        }
        assembler.set_info("Creator", &self.creator);
        assembler.set_info("Producer", &self.creator);

        let total_pages = assembler.page_count();
        let mut document = assembler.finish();
        let bytes = save_document(&mut document, true)?;
        info!(total_pages, output_bytes = bytes.len(), "PDFs merged");
        Ok(Blob::new(bytes, PDF_MIME))
    }

    /// Rasterise every page at `dpi` and encode each as `format`.
    #[instrument(skip(self, pdf), fields(bytes_len = pdf.len()))]
    pub fn to_images(&self, pdf: &[u8], dpi: f32, format: OutputFormat, quality: u8) -> Result<Vec<Blob>> {
        if !format.is_raster() {
            return Err(WandelError::UnsupportedOperation(format!(
                "pages cannot be exported as {}",
                format.extension()
            )));
        }
        if dpi <= 0.0 {
            return Err(WandelError::Validation(format!("dpi {} must be positive", dpi)));
        }
        // Fail on unreadable input before touching the renderer.
        PdfReader::from_bytes(pdf)?;
        let rasterizer = self.rasterizer()?;

        let pages = rasterizer.rasterize(pdf, dpi / 72.0)?;
        pages
            .into_iter()
            .map(|page| {
                let bytes = ImageProcessor::from_dynamic(page).encode(
                    format,
                    quality,
                    CompressionLevel::Medium,
                    wandelwerk_core::color::WHITE,
                )?;
                Ok(Blob::new(bytes, format.mime_type()))
            })
            .collect()
    }

    /// Page count, metadata and geometry, plus PNG thumbnails when a
    /// rasteriser is available.
    #[instrument(skip(self, pdf), fields(bytes_len = pdf.len()))]
    pub fn inspect(&self, pdf: &[u8]) -> Result<DocumentSummary> {
        let reader = PdfReader::from_bytes(pdf)?;
        let mut pages = reader.pages();

        if let Some(rasterizer) = &self.rasterizer {
            match rasterizer.rasterize(pdf, self.thumbnail_dpi / 72.0) {
                Ok(images) => {
                    for (page, image) in pages.iter_mut().zip(images) {
                        let bytes = ImageProcessor::from_dynamic(image).to_png_bytes()?;
                        page.thumbnail = Some(Blob::new(bytes, OutputFormat::Png.mime_type()));
                    }
                }
                Err(err) => warn!(%err, "thumbnails unavailable"),
            }
        }

        Ok(DocumentSummary {
            page_count: reader.page_count(),
            info: reader.metadata(),
            pages,
        })
    }

    fn rasterizer(&self) -> Result<&Arc<dyn PageRasterizer>> {
        self.rasterizer.as_ref().ok_or_else(|| {
            WandelError::Render("no page renderer available in this build".into())
        })
    }
}

fn single(sources: &[SourceFile]) -> Result<&SourceFile> {
    match sources {
        [source] => Ok(source),
        [] => Err(WandelError::Precondition("add a PDF file first".into())),
        _ => Err(WandelError::Precondition(format!(
            "this operation takes one PDF at a time, got {}",
            sources.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::builder::tests::sample_pdf;
    use crate::pdf::builder::{decode_text_string, info_dictionary};
    use image::{DynamicImage, Rgba, RgbaImage};
    use lopdf::Document;

    /// Produces one solid page-sized image per page, without pdfium.
    struct BlankRasterizer;

    impl PageRasterizer for BlankRasterizer {
        fn rasterize(&self, pdf: &[u8], scale: f32) -> Result<Vec<DynamicImage>> {
            let reader = PdfReader::from_bytes(pdf)?;
            Ok(reader
                .pages()
                .iter()
                .map(|page| {
                    let w = (page.width * scale).round() as u32;
                    let h = (page.height * scale).round() as u32;
                    DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255])))
                })
                .collect())
        }
    }

    fn pipeline() -> PdfPipeline {
        let mut pipeline = PdfPipeline::new(&EngineConfig::default());
        pipeline.rasterizer = None;
        pipeline
    }

    fn pdf(name: &str, pages: u32) -> SourceFile {
        SourceFile::new(name, PDF_MIME, sample_pdf(pages))
    }

    fn single_document(output: PdfOutput) -> Document {
        match output {
            PdfOutput::Document(blob) => Document::load_mem(&blob.bytes).unwrap(),
            other => panic!("expected one document, got {other:?}"),
        }
    }

    #[test]
    fn merge_concatenates_with_bookmarks_and_creator() {
        let sources = vec![pdf("first.pdf", 2), pdf("second.pdf", 3)];
        let output = pipeline()
            .operate(
                &sources,
                &PdfOperation::Merge {
                    bookmarks: true,
                    copy_metadata: true,
                },
            )
            .unwrap();
        let merged = single_document(output);
        assert_eq!(merged.get_pages().len(), 5);

        let info = info_dictionary(&merged).unwrap();
        assert_eq!(decode_text_string(info.get(b"Creator").unwrap()).as_deref(), Some("Wandelwerk"));
        assert_eq!(decode_text_string(info.get(b"Title").unwrap()).as_deref(), Some("Sample"));

        let outlines = merged.catalog().unwrap().get(b"Outlines").unwrap().as_reference().unwrap();
        let first = merged.get_dictionary(outlines).unwrap().get(b"First").unwrap().as_reference().unwrap();
        let title = merged.get_dictionary(first).unwrap().get(b"Title").unwrap();
        assert_eq!(decode_text_string(title).as_deref(), Some("first"));
    }

    #[test]
    fn merge_needs_two_files() {
        let result = pipeline().operate(&[pdf("only.pdf", 1)], &PdfOperation::Merge {
            bookmarks: false,
            copy_metadata: false,
        });
        assert!(matches!(result, Err(WandelError::Precondition(_))));
    }

    #[test]
    fn merge_fails_atomically_on_a_bad_source() {
        let sources = vec![
            pdf("good.pdf", 1),
            SourceFile::new("bad.pdf", PDF_MIME, b"%PDF-1.4 garbage".to_vec()),
        ];
        let err = pipeline()
            .merge(&sources, true, true)
            .unwrap_err();
        assert!(matches!(&err, WandelError::Decode(detail) if detail.starts_with("bad.pdf: ")));
        assert_eq!(err.to_string().matches("could not decode input").count(), 1);
    }

    #[test]
    fn split_yields_one_document_per_range() {
        let output = pipeline()
            .operate(
                &[pdf("long.pdf", 6)],
                &PdfOperation::Split {
                    ranges: vec![PageRange::new(1, 1), PageRange::new(2, 6)],
                },
            )
            .unwrap();
        let PdfOutput::Documents(parts) = output else {
            panic!("expected split output");
        };
        assert_eq!(parts.len(), 2);
        assert_eq!(PdfReader::from_bytes(&parts[1].bytes).unwrap().page_count(), 5);
    }

    #[test]
    fn merging_split_parts_restores_page_count() {
        let pipeline = pipeline();
        let output = pipeline
            .operate(
                &[pdf("long.pdf", 5)],
                &PdfOperation::Split {
                    ranges: vec![PageRange::new(1, 2), PageRange::new(3, 5)],
                },
            )
            .unwrap();
        let parts: Vec<SourceFile> = output
            .into_blobs()
            .into_iter()
            .enumerate()
            .map(|(index, blob)| SourceFile::new(format!("part-{}.pdf", index + 1), PDF_MIME, blob.bytes))
            .collect();
        assert_eq!(parts.len(), 2);

        let merged = pipeline.merge(&parts, false, false).unwrap();
        assert_eq!(PdfReader::from_bytes(&merged.bytes).unwrap().page_count(), 5);
    }

    #[test]
    fn compress_keeps_every_page() {
        for level in [CompressionLevel::Low, CompressionLevel::Maximum] {
            let output = pipeline()
                .operate(&[pdf("big.pdf", 4)], &PdfOperation::Compress { level })
                .unwrap();
            assert_eq!(single_document(output).get_pages().len(), 4);
        }
    }

    #[test]
    fn protect_requires_password_and_stamps() {
        let missing = pipeline().operate(
            &[pdf("secret.pdf", 1)],
            &PdfOperation::Protect {
                password: " ".into(),
            },
        );
        assert!(matches!(missing, Err(WandelError::Validation(_))));

        let output = pipeline()
            .operate(
                &[pdf("secret.pdf", 1)],
                &PdfOperation::Protect {
                    password: "hunter2".into(),
                },
            )
            .unwrap();
        let document = single_document(output);
        let page = document.get_pages()[&1];
        let content = document.get_page_content(page).unwrap();
        assert!(String::from_utf8_lossy(&content).contains("(PROTECTED) Tj"));
    }

    #[test]
    fn to_images_without_renderer_is_a_render_error() {
        let result = pipeline().operate(
            &[pdf("pages.pdf", 2)],
            &PdfOperation::ToImages {
                dpi: None,
                format: OutputFormat::Png,
                quality: 90,
            },
        );
        assert!(matches!(result, Err(WandelError::Render(_))));
    }

    #[test]
    fn to_images_scales_by_dpi_over_72() {
        let pipeline = pipeline().with_rasterizer(Arc::new(BlankRasterizer));
        let output = pipeline
            .operate(
                &[pdf("pages.pdf", 2)],
                &PdfOperation::ToImages {
                    dpi: Some(144.0),
                    format: OutputFormat::Jpeg,
                    quality: 80,
                },
            )
            .unwrap();
        let PdfOutput::Images(images) = output else {
            panic!("expected images");
        };
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].mime_type, "image/jpeg");
        let first = image::load_from_memory(&images[0].bytes).unwrap();
        assert_eq!((first.width(), first.height()), (1190, 1684));
    }

    #[test]
    fn inspect_attaches_thumbnails_when_rendering() {
        let plain = pipeline().inspect(&sample_pdf(2)).unwrap();
        assert_eq!(plain.page_count, 2);
        assert!(plain.pages.iter().all(|p| p.thumbnail.is_none()));

        let rendered = pipeline()
            .with_rasterizer(Arc::new(BlankRasterizer))
            .inspect(&sample_pdf(2))
            .unwrap();
        assert!(rendered.pages.iter().all(|p| p.thumbnail.is_some()));
    }

    #[test]
    fn images_become_pages() {
        let png = ImageProcessor::from_dynamic(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            20,
            10,
            Rgba([0, 0, 255, 255]),
        )))
        .to_png_bytes()
        .unwrap();
        let sources = vec![
            SourceFile::new("a.png", "image/png", png.clone()),
            SourceFile::new("b.png", "image/png", png),
        ];
        let output = pipeline()
            .operate(&sources, &PdfOperation::FromImages { paper: PaperSize::Letter })
            .unwrap();
        assert_eq!(single_document(output).get_pages().len(), 2);
    }

    #[test]
    fn single_document_operations_reject_many_inputs() {
        let result = pipeline().operate(
            &[pdf("a.pdf", 1), pdf("b.pdf", 1)],
            &PdfOperation::Reorder { order: vec![1] },
        );
        assert!(matches!(result, Err(WandelError::Precondition(_))));
    }

    #[test]
    fn operations_deserialize_from_tagged_json() {
        let op: PdfOperation =
            serde_json::from_str(r#"{"operation": "split", "ranges": [{"from": 1, "to": 2}]}"#)
                .unwrap();
        assert_eq!(
            op,
            PdfOperation::Split {
                ranges: vec![PageRange::new(1, 2)]
            }
        );
        let merge: PdfOperation = serde_json::from_str(r#"{"operation": "merge"}"#).unwrap();
        assert!(merge.is_combining());
    }
}
