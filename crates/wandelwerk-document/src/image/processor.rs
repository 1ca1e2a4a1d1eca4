// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor: resize, crop, rotate, watermark, background removal,
// colour filters and encoding. Operates on in-memory images using the `image`
// and `imageproc` crates.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::geometric_transformations::{self, Interpolation};
use tracing::{debug, info, instrument};
use wandelwerk_core::color::BLACK;
use wandelwerk_core::error::{Result, WandelError};
use wandelwerk_core::{Anchor, CompressionLevel, CropArea, FilterSettings, OutputFormat, ResizeMode};

use super::{background, filters, text};

/// Image processing pipeline operating on a single in-memory image.
///
/// All operations are non-destructive: each method consumes `self` and returns a
/// new `ImageProcessor` wrapping the transformed image, enabling method chaining.
///
/// ```ignore
/// let png = ImageProcessor::from_bytes(&bytes)?
///     .resize_to(Some(800), None, ResizeMode::Fit)
///     .rotate(15.0)
///     .encode(OutputFormat::Png, 80, CompressionLevel::Medium, WHITE)?;
/// ```
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Create a processor from raw encoded bytes (JPEG, PNG, WebP, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(data)
            .map_err(|err| WandelError::Decode(format!("failed to decode image: {}", err)))?;
        debug!(
            width = img.width(),
            height = img.height(),
            "Image decoded from bytes"
        );
        Ok(Self { image: img })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    /// Current image width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Current image height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Borrow the underlying `DynamicImage`.
    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    /// Consume the processor and return the underlying `DynamicImage`.
    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Geometry -------------------------------------------------------------

    /// Resize towards the requested dimensions.
    ///
    /// With only one side given the other follows the aspect ratio. With both,
    /// `Fit` shrinks the larger relative side so the result fits inside the
    /// box, `Fill` covers the box and centre-crops to exactly the requested
    /// size, and `Stretch` ignores the aspect ratio.
    #[instrument(skip(self), fields(from_w = self.width(), from_h = self.height()))]
    pub fn resize_to(self, width: Option<u32>, height: Option<u32>, mode: ResizeMode) -> Self {
        let (target_w, target_h) =
            resize_dimensions(self.width(), self.height(), width, height, mode);

        let resized = match (width, height, mode) {
            (Some(_), Some(_), ResizeMode::Fill) => {
                self.image
                    .resize_to_fill(target_w, target_h, FilterType::Lanczos3)
            }
            _ => self
                .image
                .resize_exact(target_w, target_h, FilterType::Lanczos3),
        };
        info!(
            new_w = resized.width(),
            new_h = resized.height(),
            ?mode,
            "Resize complete"
        );
        Self { image: resized }
    }

    /// Crop a region given in percentages of the current size.
    #[instrument(skip(self))]
    pub fn crop_percent(self, area: CropArea) -> Self {
        let (x, y, w, h) = area.to_pixels(self.width(), self.height());
        info!(x, y, w, h, "Cropping image");
        Self {
            image: self.image.crop_imm(x, y, w, h),
        }
    }

    /// Rotate the image by an arbitrary angle in degrees (clockwise).
    ///
    /// For 90/180/270 degree rotations, lossless rotation is used. For other
    /// angles the canvas grows to the rotated bounding box
    /// `W|cos θ| + H|sin θ|` by `W|sin θ| + H|cos θ|` and the uncovered corners
    /// are left transparent.
    #[instrument(skip(self), fields(degrees))]
    pub fn rotate(self, degrees: f32) -> Self {
        info!(degrees, "Rotating image");

        // Fast-path for exact multiples of 90.
        let normalised = degrees.rem_euclid(360.0);
        if (normalised - 90.0).abs() < 0.01 {
            return Self {
                image: self.image.rotate90(),
            };
        }
        if (normalised - 180.0).abs() < 0.01 {
            return Self {
                image: self.image.rotate180(),
            };
        }
        if (normalised - 270.0).abs() < 0.01 {
            return Self {
                image: self.image.rotate270(),
            };
        }
        if normalised < 0.01 || (normalised - 360.0).abs() < 0.01 {
            return self;
        }

        let (src_w, src_h) = (self.width(), self.height());
        let (out_w, out_h) = rotated_bounds(src_w, src_h, degrees);

        // Work on a canvas large enough for both the source and the rotated
        // result, then cut the bounding box out of its centre.
        let work_w = src_w.max(out_w);
        let work_h = src_h.max(out_h);
        let mut canvas = RgbaImage::from_pixel(work_w, work_h, Rgba([0, 0, 0, 0]));
        image::imageops::overlay(
            &mut canvas,
            &self.image.to_rgba8(),
            i64::from((work_w - src_w) / 2),
            i64::from((work_h - src_h) / 2),
        );

        let rotated = geometric_transformations::rotate_about_center(
            &canvas,
            degrees.to_radians(),
            Interpolation::Bilinear,
            Rgba([0, 0, 0, 0]),
        );
        let left = (work_w - out_w) / 2;
        let top = (work_h - out_h) / 2;
        let cropped = image::imageops::crop_imm(&rotated, left, top, out_w, out_h).to_image();

        debug!(out_w, out_h, "General rotation applied");
        Self {
            image: DynamicImage::ImageRgba8(cropped),
        }
    }

    // -- Pixel operations -----------------------------------------------------

    /// Draw `label` with a drop shadow at the given anchor. Glyph height is
    /// `size_ratio` of the shorter side.
    #[instrument(skip(self, label), fields(label_len = label.len()))]
    pub fn watermark(self, label: &str, opacity: f32, anchor: Anchor, size_ratio: f32) -> Self {
        let mut canvas = self.image.to_rgba8();
        text::draw_watermark(&mut canvas, label, opacity, anchor, size_ratio);
        Self {
            image: DynamicImage::ImageRgba8(canvas),
        }
    }

    /// Make every pixel close to the sampled background colour transparent.
    pub fn remove_background(self, threshold: f32) -> Self {
        Self {
            image: DynamicImage::ImageRgba8(background::remove_background(&self.image, threshold)),
        }
    }

    /// Apply brightness, contrast, saturation, blur, sepia and grayscale.
    pub fn apply_filters(self, settings: &FilterSettings) -> Self {
        if settings.is_identity() {
            return self;
        }
        let mut canvas = self.image.to_rgba8();
        filters::apply(&mut canvas, settings);
        Self {
            image: DynamicImage::ImageRgba8(canvas),
        }
    }

    /// Composite the image over an opaque background colour.
    pub fn flatten(self, background: Rgba<u8>) -> Self {
        if !self.image.color().has_alpha() {
            return self;
        }
        let mut canvas = self.image.to_rgba8();
        let Rgba([br, bg, bb, _]) = background;
        for pixel in canvas.pixels_mut() {
            let Rgba([r, g, b, a]) = *pixel;
            let alpha = f32::from(a) / 255.0;
            let mix = |fg: u8, bk: u8| {
                (f32::from(fg) * alpha + f32::from(bk) * (1.0 - alpha)).round() as u8
            };
            *pixel = Rgba([mix(r, br), mix(g, bg), mix(b, bb), 255]);
        }
        Self {
            image: DynamicImage::ImageRgba8(canvas),
        }
    }

    // -- Output ---------------------------------------------------------------

    /// Encode to a raster format. Formats without an alpha channel are
    /// flattened over `background` first. `quality` drives JPEG; `level`
    /// drives PNG deflate effort. WebP output is lossless.
    #[instrument(skip(self, background))]
    pub fn encode(
        self,
        format: OutputFormat,
        quality: u8,
        level: CompressionLevel,
        background: Rgba<u8>,
    ) -> Result<Vec<u8>> {
        let image = if format.supports_alpha() {
            self.image
        } else {
            self.flatten(background).image
        };

        let mut buffer = Vec::new();
        match format {
            OutputFormat::Jpeg => {
                let rgb = image.to_rgb8();
                let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
                rgb.write_with_encoder(encoder).map_err(|err| {
                    WandelError::Encode(format!("JPEG encoding failed: {}", err))
                })?;
            }
            OutputFormat::Png => {
                let encoder = PngEncoder::new_with_quality(
                    &mut buffer,
                    png_compression(level),
                    PngFilterType::Adaptive,
                );
                image.write_with_encoder(encoder).map_err(|err| {
                    WandelError::Encode(format!("PNG encoding failed: {}", err))
                })?;
            }
            OutputFormat::Webp => {
                let rgba = image.to_rgba8();
                let encoder = WebPEncoder::new_lossless(Cursor::new(&mut buffer));
                rgba.write_with_encoder(encoder).map_err(|err| {
                    WandelError::Encode(format!("WebP encoding failed: {}", err))
                })?;
            }
            OutputFormat::Svg | OutputFormat::Pdf => {
                return Err(WandelError::UnsupportedOperation(format!(
                    "{} is not a raster output format",
                    format.extension()
                )));
            }
        }

        debug!(output_bytes = buffer.len(), "Image encoded");
        Ok(buffer)
    }

    /// Encode as PNG with default settings.
    pub fn to_png_bytes(self) -> Result<Vec<u8>> {
        self.encode(OutputFormat::Png, 100, CompressionLevel::Medium, BLACK)
    }
}

fn png_compression(level: CompressionLevel) -> CompressionType {
    match level {
        CompressionLevel::Low => CompressionType::Fast,
        CompressionLevel::Medium => CompressionType::Default,
        CompressionLevel::High | CompressionLevel::Maximum => CompressionType::Best,
    }
}

/// Target size for a resize request. Never returns a zero side.
pub fn resize_dimensions(
    src_w: u32,
    src_h: u32,
    width: Option<u32>,
    height: Option<u32>,
    mode: ResizeMode,
) -> (u32, u32) {
    let aspect = src_w as f64 / src_h.max(1) as f64;
    let (w, h) = match (width, height) {
        (Some(w), None) => (w, (w as f64 / aspect).round() as u32),
        (None, Some(h)) => ((h as f64 * aspect).round() as u32, h),
        (Some(w), Some(h)) => match mode {
            ResizeMode::Fit => {
                if w as f64 / h as f64 > aspect {
                    ((h as f64 * aspect).round() as u32, h)
                } else {
                    (w, (w as f64 / aspect).round() as u32)
                }
            }
            ResizeMode::Fill | ResizeMode::Stretch => (w, h),
        },
        (None, None) => (src_w, src_h),
    };
    (w.max(1), h.max(1))
}

/// Bounding box of a `width` x `height` image rotated by `degrees`.
pub fn rotated_bounds(width: u32, height: u32, degrees: f32) -> (u32, u32) {
    let theta = (degrees as f64).to_radians();
    let (sin, cos) = (theta.sin().abs(), theta.cos().abs());
    let (w, h) = (width as f64, height as f64);
    let out_w = (w * cos + h * sin).round() as u32;
    let out_h = (w * sin + h * cos).round() as u32;
    (out_w.max(1), out_h.max(1))
}
