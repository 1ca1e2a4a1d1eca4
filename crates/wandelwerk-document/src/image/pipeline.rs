// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster tool dispatch: decode, apply one tool, encode.

use tracing::{info, instrument};
use wandelwerk_core::color::{WHITE, parse_color};
use wandelwerk_core::error::Result;
use wandelwerk_core::{Blob, EngineConfig, ImageTool, OutputFormat, PaperSize, ProcessingOptions};

use super::processor::ImageProcessor;
use crate::pdf::writer::PdfWriter;

/// Applies a single image tool to encoded bytes and returns a new encoded
/// blob. The source bytes are never modified.
#[derive(Debug, Clone)]
pub struct ImagePipeline {
    background_threshold: f32,
    watermark_size_ratio: f32,
    pdf_margin_mm: f32,
}

impl ImagePipeline {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            background_threshold: config.background_threshold,
            watermark_size_ratio: config.watermark_size_ratio,
            pdf_margin_mm: config.pdf_image_margin_mm,
        }
    }

    #[instrument(skip(self, source, tool, options), fields(tool = tool.name(), data_len = source.len()))]
    pub fn transform(
        &self,
        source: &[u8],
        tool: ImageTool,
        options: &ProcessingOptions,
    ) -> Result<Blob> {
        options.validate_for(tool)?;

        let background = match options.background_color.as_deref() {
            Some(color) => parse_color(color)?,
            None => WHITE,
        };
        let processor = ImageProcessor::from_bytes(source)?;

        let mut format = options.output_format;
        let mut quality = options.quality;
        let processor = match tool {
            ImageTool::Resize => {
                let mode = if options.maintain_aspect_ratio {
                    options.resize_mode
                } else {
                    wandelwerk_core::ResizeMode::Stretch
                };
                processor.resize_to(options.width, options.height, mode)
            }
            ImageTool::Crop => match options.crop_area {
                Some(area) => processor.crop_percent(area),
                None => processor,
            },
            ImageTool::Rotate => processor.rotate(options.rotation_degrees),
            ImageTool::Compress => {
                quality = options.compression_level.clamp_quality(options.quality);
                processor
            }
            ImageTool::Watermark => {
                let label = options.watermark_text.as_deref().unwrap_or_default();
                processor.watermark(
                    label.trim(),
                    options.watermark_opacity,
                    options.watermark_position,
                    self.watermark_size_ratio,
                )
            }
            ImageTool::RemoveBackground => {
                format = OutputFormat::Png;
                processor.remove_background(self.background_threshold)
            }
            ImageTool::Filters => processor.apply_filters(&options.filters),
            ImageTool::Convert => processor,
        };

        let blob = if format == OutputFormat::Pdf {
            let writer = PdfWriter::new(PaperSize::A4).with_margin_mm(self.pdf_margin_mm);
            let image = processor.flatten(background).into_dynamic();
            Blob::new(writer.create_from_images(&[image])?, format.mime_type())
        } else {
            let bytes = processor.encode(format, quality, options.compression_level, background)?;
            Blob::new(bytes, format.mime_type())
        };

        info!(
            output_bytes = blob.len(),
            mime = %blob.mime_type,
            "Image tool applied"
        );
        Ok(blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};
    use wandelwerk_core::{CompressionLevel, CropArea, ResizeMode, WandelError};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            if (x / 4 + y / 4) % 2 == 0 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([(x * 7) as u8, (y * 5) as u8, 90, 255])
            }
        });
        ImageProcessor::from_dynamic(DynamicImage::ImageRgba8(img))
            .to_png_bytes()
            .unwrap()
    }

    fn dims(blob: &Blob) -> (u32, u32) {
        let img = image::load_from_memory(&blob.bytes).unwrap();
        (img.width(), img.height())
    }

    fn pipeline() -> ImagePipeline {
        ImagePipeline::new(&EngineConfig::default())
    }

    #[test]
    fn resize_fit_to_own_size_keeps_dimensions() {
        let options = ProcessingOptions {
            width: Some(64),
            height: Some(48),
            output_format: OutputFormat::Png,
            ..Default::default()
        };
        let blob = pipeline()
            .transform(&png(64, 48), ImageTool::Resize, &options)
            .unwrap();
        assert_eq!(dims(&blob), (64, 48));
        assert_eq!(blob.mime_type, "image/png");
    }

    #[test]
    fn resize_without_aspect_lock_stretches() {
        let options = ProcessingOptions {
            width: Some(20),
            height: Some(60),
            maintain_aspect_ratio: false,
            resize_mode: ResizeMode::Fit,
            output_format: OutputFormat::Png,
            ..Default::default()
        };
        let blob = pipeline()
            .transform(&png(64, 48), ImageTool::Resize, &options)
            .unwrap();
        assert_eq!(dims(&blob), (20, 60));
    }

    #[test]
    fn crop_by_percentages() {
        let options = ProcessingOptions {
            crop_area: Some(CropArea::new(25.0, 25.0, 50.0, 50.0)),
            output_format: OutputFormat::Png,
            ..Default::default()
        };
        let blob = pipeline()
            .transform(&png(80, 40), ImageTool::Crop, &options)
            .unwrap();
        assert_eq!(dims(&blob), (40, 20));
    }

    #[test]
    fn compression_output_shrinks_with_level() {
        let source = png(160, 160);
        let sizes: Vec<usize> = [
            CompressionLevel::Low,
            CompressionLevel::Medium,
            CompressionLevel::High,
            CompressionLevel::Maximum,
        ]
        .into_iter()
            .map(|level| {
                let options = ProcessingOptions {
                    quality: 100,
                    compression_level: level,
                    output_format: OutputFormat::Jpeg,
                    ..Default::default()
                };
                pipeline()
                    .transform(&source, ImageTool::Compress, &options)
                    .unwrap()
                    .len()
            })
            .collect();
        for pair in sizes.windows(2) {
            assert!(pair[1] <= pair[0], "sizes not monotonic: {:?}", sizes);
        }
    }

    #[test]
    fn background_removal_always_outputs_png() {
        let options = ProcessingOptions {
            output_format: OutputFormat::Jpeg,
            ..Default::default()
        };
        let blob = pipeline()
            .transform(&png(16, 16), ImageTool::RemoveBackground, &options)
            .unwrap();
        assert_eq!(blob.mime_type, "image/png");
        let out = image::load_from_memory(&blob.bytes).unwrap().to_rgba8();
        assert_eq!(out.get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn watermark_keeps_dimensions() {
        let options = ProcessingOptions {
            watermark_text: Some("DRAFT".into()),
            output_format: OutputFormat::Png,
            ..Default::default()
        };
        let source = png(200, 100);
        let blob = pipeline()
            .transform(&source, ImageTool::Watermark, &options)
            .unwrap();
        assert_eq!(dims(&blob), (200, 100));
        assert_ne!(blob.bytes, source);
    }

    #[test]
    fn convert_to_pdf_produces_a_document() {
        let options = ProcessingOptions {
            output_format: OutputFormat::Pdf,
            ..Default::default()
        };
        let blob = pipeline()
            .transform(&png(30, 20), ImageTool::Convert, &options)
            .unwrap();
        assert_eq!(blob.mime_type, "application/pdf");
        assert!(blob.bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn bad_options_are_rejected_before_decoding() {
        let options = ProcessingOptions::default();
        let result = pipeline().transform(b"not an image", ImageTool::Resize, &options);
        assert!(matches!(result, Err(WandelError::UnsupportedOperation(_))));
    }

    #[test]
    fn corrupt_input_is_a_decode_error() {
        let result = pipeline().transform(b"not an image", ImageTool::Convert, &Default::default());
        assert!(matches!(result, Err(WandelError::Decode(_))));
    }
}
