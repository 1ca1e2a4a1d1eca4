// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Format conversion routing between raster images and PDF.
//
// Every input is classified by its sniffed media kind and sent down the one
// route that reaches the requested output format:
//   image → raster   re-encode through the image pipeline
//   image → PDF      one page per image
//   PDF   → raster   rasterise every page
//   PDF   → PDF      compact re-save
// SVG output and non-image, non-PDF inputs have no route.

use tracing::{debug, info, instrument};

use wandelwerk_core::error::{Result, WandelError};
use wandelwerk_core::{Blob, ImageTool, MediaKind, OutputFormat, ProcessingOptions, SourceFile};

use crate::image::ImagePipeline;
use crate::pdf::{PdfOperation, PdfPipeline};

/// The route a conversion takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionRoute {
    ImageToRaster,
    ImageToPdf,
    PdfToRaster,
    PdfToPdf,
}

/// Pick the route from `kind` to `target`.
pub fn conversion_route(kind: MediaKind, target: OutputFormat) -> Result<ConversionRoute> {
    let route = match (kind, target) {
        (_, OutputFormat::Svg) => None,
        (MediaKind::Image, OutputFormat::Pdf) => Some(ConversionRoute::ImageToPdf),
        (MediaKind::Image, _) => Some(ConversionRoute::ImageToRaster),
        (MediaKind::Pdf, OutputFormat::Pdf) => Some(ConversionRoute::PdfToPdf),
        (MediaKind::Pdf, _) => Some(ConversionRoute::PdfToRaster),
        (MediaKind::Other, _) => None,
    };
    route.ok_or_else(|| {
        WandelError::UnsupportedOperation(format!(
            "no conversion from {:?} input to {}",
            kind,
            target.extension()
        ))
    })
}

/// Converts uploads between formats using the image and document pipelines.
pub struct DocumentConverter {
    images: ImagePipeline,
    documents: PdfPipeline,
}

impl DocumentConverter {
    pub fn new(images: ImagePipeline, documents: PdfPipeline) -> Self {
        Self { images, documents }
    }

    /// Convert `source` to `target`. PDF to raster yields one blob per page;
    /// every other route yields exactly one.
    #[instrument(skip(self, source, options), fields(name = source.name(), mime = source.mime_type()))]
    pub fn convert(
        &self,
        source: &SourceFile,
        target: OutputFormat,
        options: &ProcessingOptions,
    ) -> Result<Vec<Blob>> {
        let route = conversion_route(source.kind(), target)?;
        info!(?route, to = target.extension(), "Converting");

        let blobs = match route {
            ConversionRoute::ImageToRaster | ConversionRoute::ImageToPdf => {
                let options = ProcessingOptions {
                    output_format: target,
                    ..options.clone()
                };
                vec![self.images.transform(source.bytes(), ImageTool::Convert, &options)?]
            }
            ConversionRoute::PdfToRaster => self
                .documents
                .operate(
                    std::slice::from_ref(source),
                    &PdfOperation::ToImages {
                        dpi: None,
                        format: target,
                        quality: options.quality,
                    },
                )?
                .into_blobs(),
            ConversionRoute::PdfToPdf => self
                .documents
                .operate(
                    std::slice::from_ref(source),
                    &PdfOperation::Compress {
                        level: wandelwerk_core::CompressionLevel::Low,
                    },
                )?
                .into_blobs(),
        };

        debug!(outputs = blobs.len(), "Conversion complete");
        Ok(blobs)
    }
}
