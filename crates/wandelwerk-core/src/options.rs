// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Processing options: the shared vocabulary consumed by every pipeline.
//
// `ProcessingOptions` is the flat record a caller edits; `ImageTool` selects
// the operation and `ProcessingOptions::validate_for` checks that the fields
// the tool needs are present before anything is dispatched.

use serde::{Deserialize, Serialize};

use crate::error::{Result, WandelError};

/// Encoded output formats a pipeline can be asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    Webp,
    Svg,
    Pdf,
}

impl OutputFormat {
    /// MIME type string for the encoded blob.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Svg => "image/svg+xml",
            Self::Pdf => "application/pdf",
        }
    }

    /// Conventional file extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Svg => "svg",
            Self::Pdf => "pdf",
        }
    }

    /// Whether the format can carry an alpha channel.
    pub fn supports_alpha(&self) -> bool {
        matches!(self, Self::Png | Self::Webp | Self::Svg)
    }

    /// Whether the format is a raster image encoding.
    pub fn is_raster(&self) -> bool {
        matches!(self, Self::Jpeg | Self::Png | Self::Webp)
    }

    /// Look up a format by MIME type.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::Webp),
            "image/svg+xml" => Some(Self::Svg),
            "application/pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// Look up a format by name or extension ("jpg", "JPEG", "png", ...).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::Webp),
            "svg" => Some(Self::Svg),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }
}

/// How target dimensions are reconciled with the source aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMode {
    /// Scale to fit inside the target box, preserving aspect ratio.
    #[default]
    Fit,
    /// Scale to cover the target box, then centre-crop the overflow.
    Fill,
    /// Map directly onto the target box, ignoring aspect ratio.
    Stretch,
}

/// Compression presets. Each level owns a quality band; the caller's quality
/// value is clamped into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    Low,
    #[default]
    Medium,
    High,
    Maximum,
}

impl CompressionLevel {
    /// Inclusive quality band `(min, max)` for this level.
    pub fn quality_band(&self) -> (u8, u8) {
        match self {
            Self::Low => (85, 100),
            Self::Medium => (60, 85),
            Self::High => (40, 70),
            Self::Maximum => (0, 50),
        }
    }

    /// Clamp `quality` into this level's band. The result is never below 1
    /// because lossy encoders reject a quality of zero.
    pub fn clamp_quality(&self, quality: u8) -> u8 {
        let (min, max) = self.quality_band();
        quality.clamp(min, max).max(1)
    }

    /// Content scale factor used when rebuilding PDF pages.
    pub fn pdf_scale(&self) -> f32 {
        match self {
            Self::Maximum => 0.7,
            Self::High => 0.85,
            Self::Low | Self::Medium => 1.0,
        }
    }
}

/// Where a text watermark is anchored on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
    #[default]
    Center,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Crop rectangle expressed in percentages of the source dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropArea {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl CropArea {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }.clamped()
    }

    /// Clamp into percentage space so that `x + width <= 100` and
    /// `y + height <= 100`.
    pub fn clamped(self) -> Self {
        let x = self.x.clamp(0.0, 100.0);
        let y = self.y.clamp(0.0, 100.0);
        Self {
            x,
            y,
            width: self.width.clamp(0.0, 100.0 - x),
            height: self.height.clamp(0.0, 100.0 - y),
        }
    }

    /// Convert to a pixel rectangle `(x, y, width, height)` inside a
    /// `source_w` x `source_h` image. The size is `round(pct / 100 * dim)`
    /// (at least one pixel); the origin is shifted back if rounding would
    /// push the rectangle past the edge.
    pub fn to_pixels(&self, source_w: u32, source_h: u32) -> (u32, u32, u32, u32) {
        let area = self.clamped();
        let axis = |origin_pct: f32, size_pct: f32, dim: u32| -> (u32, u32) {
            let size = ((size_pct / 100.0 * dim as f32).round() as u32).clamp(1, dim.max(1));
            let origin = (origin_pct / 100.0 * dim as f32).round() as u32;
            (origin.min(dim.saturating_sub(size)), size)
        };
        let (px, pw) = axis(area.x, area.width, source_w);
        let (py, ph) = axis(area.y, area.height, source_h);
        (px, py, pw, ph)
    }
}

/// Photometric filters. Brightness, contrast, and saturation are percentages
/// where 100 is the identity; blur is a Gaussian sigma in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub blur: f32,
    pub sepia: bool,
    pub grayscale: bool,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            brightness: 100.0,
            contrast: 100.0,
            saturation: 100.0,
            blur: 0.0,
            sepia: false,
            grayscale: false,
        }
    }
}

impl FilterSettings {
    /// True when applying the filters would not change any pixel.
    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }
}

/// The flat option record shared by every pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessingOptions {
    /// Encoder quality, 1-100. Only JPEG output uses it; WebP is always
    /// written lossless.
    pub quality: u8,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub maintain_aspect_ratio: bool,
    pub resize_mode: ResizeMode,
    pub output_format: OutputFormat,
    /// Colour string used when flattening transparency (defaults to white).
    pub background_color: Option<String>,
    pub crop_area: Option<CropArea>,
    pub rotation_degrees: f32,
    pub watermark_text: Option<String>,
    /// Watermark opacity, 0.0-1.0.
    pub watermark_opacity: f32,
    pub watermark_position: Anchor,
    /// Bands the JPEG quality and picks the PNG deflate effort. WebP output
    /// is lossless and ignores it.
    pub compression_level: CompressionLevel,
    pub filters: FilterSettings,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            quality: 80,
            width: None,
            height: None,
            maintain_aspect_ratio: true,
            resize_mode: ResizeMode::Fit,
            output_format: OutputFormat::Jpeg,
            background_color: None,
            crop_area: None,
            rotation_degrees: 0.0,
            watermark_text: None,
            watermark_opacity: 0.5,
            watermark_position: Anchor::Center,
            compression_level: CompressionLevel::Medium,
            filters: FilterSettings::default(),
        }
    }
}

/// Raster operations selectable for a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageTool {
    Resize,
    Crop,
    Rotate,
    Compress,
    Watermark,
    RemoveBackground,
    Filters,
    Convert,
}

impl ImageTool {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Resize => "resize",
            Self::Crop => "crop",
            Self::Rotate => "rotate",
            Self::Compress => "compress",
            Self::Watermark => "watermark",
            Self::RemoveBackground => "remove-background",
            Self::Filters => "filters",
            Self::Convert => "convert",
        }
    }
}

impl ProcessingOptions {
    /// Check that every field `tool` relies on is present and in range.
    pub fn validate_for(&self, tool: ImageTool) -> Result<()> {
        if !(1..=100).contains(&self.quality) {
            return Err(WandelError::Validation(format!(
                "quality must be between 1 and 100, got {}",
                self.quality
            )));
        }
        if !(0.0..=1.0).contains(&self.watermark_opacity) {
            return Err(WandelError::Validation(format!(
                "watermark opacity must be between 0 and 1, got {}",
                self.watermark_opacity
            )));
        }
        if self.output_format == OutputFormat::Svg {
            return Err(WandelError::UnsupportedOperation(
                "raster images cannot be written as SVG".into(),
            ));
        }
        if let Some(color) = self.background_color.as_deref() {
            crate::color::parse_color(color)?;
        }

        match tool {
            ImageTool::Resize => {
                if self.width.is_none() && self.height.is_none() {
                    return Err(WandelError::UnsupportedOperation(
                        "resize needs a target width or height".into(),
                    ));
                }
                if self.width == Some(0) || self.height == Some(0) {
                    return Err(WandelError::Validation(
                        "target dimensions must be greater than zero".into(),
                    ));
                }
                Ok(())
            }
            ImageTool::Crop => match self.crop_area {
                None => Err(WandelError::UnsupportedOperation(
                    "crop requested without a crop area".into(),
                )),
                Some(area) if area.clamped().width <= 0.0 || area.clamped().height <= 0.0 => {
                    Err(WandelError::Validation("crop area is empty".into()))
                }
                Some(_) => Ok(()),
            },
            ImageTool::Watermark => match self.watermark_text.as_deref().map(str::trim) {
                Some(text) if !text.is_empty() => Ok(()),
                _ => Err(WandelError::UnsupportedOperation(
                    "watermark requested without watermark text".into(),
                )),
            },
            ImageTool::Filters => {
                let f = &self.filters;
                if f.brightness < 0.0 || f.contrast < 0.0 || f.saturation < 0.0 || f.blur < 0.0 {
                    return Err(WandelError::Validation(
                        "filter values cannot be negative".into(),
                    ));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Paper size for pages built from images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperSize {
    #[default]
    A4,
    A3,
    A5,
    Letter,
    Legal,
    Custom { width_mm: u32, height_mm: u32 },
}

impl PaperSize {
    /// Dimensions in millimetres (width, height).
    pub fn dimensions_mm(&self) -> (u32, u32) {
        match self {
            Self::A4 => (210, 297),
            Self::A3 => (297, 420),
            Self::A5 => (148, 210),
            Self::Letter => (216, 279),
            Self::Legal => (216, 356),
            Self::Custom {
                width_mm,
                height_mm,
            } => (*width_mm, *height_mm),
        }
    }
}

/// Inclusive, 1-based page range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub from: u32,
    pub to: u32,
}

impl PageRange {
    pub fn new(from: u32, to: u32) -> Self {
        Self { from, to }
    }

    pub fn single(page: u32) -> Self {
        Self { from: page, to: page }
    }

    /// Check the range against a document of `page_count` pages.
    pub fn check(&self, page_count: u32) -> Result<()> {
        if self.from == 0 || self.to < self.from || self.to > page_count {
            return Err(WandelError::PageRange {
                from: self.from,
                to: self.to,
                page_count,
            });
        }
        Ok(())
    }

    pub fn len(&self) -> u32 {
        if self.is_empty() {
            return 0;
        }
        self.to - self.from + 1
    }

    pub fn is_empty(&self) -> bool {
        self.to < self.from
    }

    pub fn pages(&self) -> impl Iterator<Item = u32> {
        self.from..=self.to
    }

    /// Parse a list such as `"1-3, 5, 8-9"`.
    pub fn parse_list(input: &str) -> Result<Vec<Self>> {
        let mut ranges = Vec::new();
        for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let number = |s: &str| {
                s.trim().parse::<u32>().map_err(|_| {
                    WandelError::Validation(format!("'{part}' is not a page or page range"))
                })
            };
            let range = match part.split_once('-') {
                Some((from, to)) => Self::new(number(from)?, number(to)?),
                None => Self::single(number(part)?),
            };
            ranges.push(range);
        }
        if ranges.is_empty() {
            return Err(WandelError::Validation("no page ranges given".into()));
        }
        Ok(ranges)
    }
}
