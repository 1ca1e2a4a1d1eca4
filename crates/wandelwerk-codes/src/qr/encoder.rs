// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// QR encoding: build the module matrix with `qrcode`, then paint it either
// into a raster of exactly `size` pixels or into an SVG whose viewBox is
// measured in modules. Both paths draw the same quiet zone and logo box.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};
use qrcode::{Color, EcLevel, QrCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use wandelwerk_core::color::{WHITE, parse_color, to_hex};
use wandelwerk_core::error::{Result, WandelError};
use wandelwerk_core::{Blob, CompressionLevel, OutputFormat};
use wandelwerk_document::ImageProcessor;

use super::payload::QrPayload;

/// QR error correction level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorCorrection {
    /// ~7% error recovery.
    #[serde(rename = "L")]
    Low,
    /// ~15% error recovery.
    #[default]
    #[serde(rename = "M")]
    Medium,
    /// ~25% error recovery.
    #[serde(rename = "Q")]
    Quartile,
    /// ~30% error recovery.
    #[serde(rename = "H")]
    High,
}

impl ErrorCorrection {
    fn to_level(self) -> EcLevel {
        match self {
            Self::Low => EcLevel::L,
            Self::Medium => EcLevel::M,
            Self::Quartile => EcLevel::Q,
            Self::High => EcLevel::H,
        }
    }
}

/// An image composited over the centre of the code.
#[derive(Debug, Clone)]
pub struct LogoOverlay {
    /// Encoded logo image (any format `image` can read).
    pub bytes: Vec<u8>,
    /// Logo edge as a fraction of the code size.
    pub size_ratio: f32,
    /// White border around the logo, in pixels of the output raster.
    pub padding: u32,
    /// Shift from the centre, in output pixels.
    pub offset: (i32, i32),
}

impl LogoOverlay {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            size_ratio: 0.2,
            padding: 4,
            offset: (0, 0),
        }
    }
}

/// QR generation options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QrOptions {
    /// Edge length of the raster output in pixels, quiet zone included.
    pub size: u32,
    /// Quiet zone width in modules.
    pub margin: u32,
    pub error_correction: ErrorCorrection,
    /// Module colour.
    pub dark: String,
    /// Background colour.
    pub light: String,
    pub format: OutputFormat,
    #[serde(skip)]
    pub logo: Option<LogoOverlay>,
}

impl Default for QrOptions {
    fn default() -> Self {
        Self {
            size: 300,
            margin: 4,
            error_correction: ErrorCorrection::default(),
            dark: "#000000".into(),
            light: "#ffffff".into(),
            format: OutputFormat::Png,
            logo: None,
        }
    }
}

impl QrOptions {
    /// Create options with a specific output size.
    pub fn with_size(size: u32) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }

    pub fn with_error_correction(mut self, level: ErrorCorrection) -> Self {
        self.error_correction = level;
        self
    }

    pub fn with_margin(mut self, margin: u32) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_logo(mut self, logo: LogoOverlay) -> Self {
        self.logo = Some(logo);
        self
    }
}

/// Square grid of modules; `true` is dark.
#[derive(Debug, Clone)]
pub struct QrMatrix {
    width: usize,
    modules: Vec<bool>,
}

impl QrMatrix {
    /// Build the matrix for `content` at the given correction level.
    pub fn build(content: &str, level: ErrorCorrection) -> Result<Self> {
        let code = QrCode::with_error_correction_level(content.as_bytes(), level.to_level())
            .map_err(|err| {
                WandelError::Encode(format!(
                    "cannot build QR code for {} bytes: {}",
                    content.len(),
                    err
                ))
            })?;
        let width = code.width();
        let modules = code
            .to_colors()
            .into_iter()
            .map(|color| color == Color::Dark)
            .collect();
        Ok(Self { width, modules })
    }

    /// Modules per side, quiet zone excluded.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.width && self.modules[y * self.width + x]
    }
}

/// Renders text payloads to QR images.
pub struct QrEncoder {
    options: QrOptions,
}

impl QrEncoder {
    pub fn new(options: QrOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &QrOptions {
        &self.options
    }

    /// Serialise `payload` and encode it.
    pub fn encode_payload(&self, payload: &QrPayload) -> Result<Blob> {
        self.encode(&payload.to_content()?)
    }

    /// Encode `content` into the configured output format.
    #[instrument(skip(self, content), fields(content_len = content.len(), format = self.options.format.extension()))]
    pub fn encode(&self, content: &str) -> Result<Blob> {
        if content.is_empty() {
            return Err(WandelError::Validation("QR content cannot be empty".into()));
        }
        let options = &self.options;
        if options.logo.is_some() && options.error_correction < ErrorCorrection::Quartile {
            warn!(
                level = ?options.error_correction,
                "logo overlay with low error correction may not scan"
            );
        }

        let matrix = QrMatrix::build(content, options.error_correction)?;
        info!(modules = matrix.width(), level = ?options.error_correction, "Encoding QR code");

        match options.format {
            OutputFormat::Svg => {
                let svg = self.render_svg(&matrix)?;
                debug!(output_bytes = svg.len(), "QR SVG written");
                Ok(Blob::new(svg.into_bytes(), OutputFormat::Svg.mime_type()))
            }
            OutputFormat::Pdf => Err(WandelError::UnsupportedOperation(
                "QR codes are produced as raster images or SVG".into(),
            )),
            format => {
                let canvas = self.render_raster(&matrix)?;
                let light = parse_color(&options.light)?;
                let bytes = ImageProcessor::from_dynamic(DynamicImage::ImageRgba8(canvas))
                    .encode(format, 95, CompressionLevel::Medium, light)?;
                Ok(Blob::new(bytes, format.mime_type()))
            }
        }
    }

    /// Paint the matrix into a `size` x `size` canvas.
    pub fn render_raster(&self, matrix: &QrMatrix) -> Result<RgbaImage> {
        let options = &self.options;
        let dark = parse_color(&options.dark)?;
        let light = parse_color(&options.light)?;
        let total = matrix.width() + 2 * options.margin as usize;
        let size = options.size as usize;
        if size < total {
            return Err(WandelError::Validation(format!(
                "size {} px is smaller than the {} modules the code needs",
                size, total
            )));
        }

        let margin = options.margin as usize;
        let mut canvas = RgbaImage::from_fn(options.size, options.size, |x, y| {
            // Nearest module for this pixel, in quiet-zone coordinates.
            let mx = x as usize * total / size;
            let my = y as usize * total / size;
            let dark_module = mx >= margin
                && my >= margin
                && matrix.is_dark(mx - margin, my - margin);
            if dark_module { dark } else { light }
        });

        if let Some(logo) = &options.logo {
            composite_logo(&mut canvas, logo)?;
        }
        Ok(canvas)
    }

    /// Vector rendering of the same matrix, one unit per module.
    pub fn render_svg(&self, matrix: &QrMatrix) -> Result<String> {
        let options = &self.options;
        let dark = to_hex(parse_color(&options.dark)?);
        let light = to_hex(parse_color(&options.light)?);
        let margin = options.margin as usize;
        let total = matrix.width() + 2 * margin;

        let mut path = String::new();
        for y in 0..matrix.width() {
            for x in 0..matrix.width() {
                if matrix.is_dark(x, y) {
                    path.push_str(&format!("M{} {}h1v1h-1z", x + margin, y + margin));
                }
            }
        }

        let mut svg = format!(
            concat!(
                r#"<svg xmlns="http://www.w3.org/2000/svg" width="{size}" height="{size}" "#,
                r#"viewBox="0 0 {total} {total}" shape-rendering="crispEdges">"#,
                r#"<rect width="{total}" height="{total}" fill="{light}"/>"#,
                r#"<path d="{path}" fill="{dark}"/>"#
            ),
            size = options.size,
            total = total,
            light = light,
            path = path,
            dark = dark,
        );

        if let Some(logo) = &options.logo {
            svg.push_str(&svg_logo(logo, options.size, total)?);
        }
        svg.push_str("</svg>");
        Ok(svg)
    }
}

/// Logo box geometry on a `canvas_size` canvas: (backing x, backing y,
/// backing side, logo side).
fn logo_box(logo: &LogoOverlay, canvas_size: u32) -> (i64, i64, u32, u32) {
    let logo_side = ((canvas_size as f32 * logo.size_ratio.clamp(0.05, 0.4)).round() as u32).max(1);
    let backing = logo_side + 2 * logo.padding;
    let x = (canvas_size as i64 - backing as i64) / 2 + logo.offset.0 as i64;
    let y = (canvas_size as i64 - backing as i64) / 2 + logo.offset.1 as i64;
    (x, y, backing, logo_side)
}

fn decode_logo(logo: &LogoOverlay) -> Result<DynamicImage> {
    image::load_from_memory(&logo.bytes)
        .map_err(|err| WandelError::Decode(format!("cannot read logo image: {}", err)))
}

fn composite_logo(canvas: &mut RgbaImage, logo: &LogoOverlay) -> Result<()> {
    let (x, y, backing, logo_side) = logo_box(logo, canvas.width());
    let backing_tile = RgbaImage::from_pixel(backing, backing, WHITE);
    imageops::overlay(canvas, &backing_tile, x, y);

    let resized = decode_logo(logo)?
        .resize(logo_side, logo_side, FilterType::Lanczos3)
        .to_rgba8();
    // Centre the (possibly non-square) logo inside its square slot.
    let lx = x + logo.padding as i64 + (logo_side as i64 - resized.width() as i64) / 2;
    let ly = y + logo.padding as i64 + (logo_side as i64 - resized.height() as i64) / 2;
    imageops::overlay(canvas, &resized, lx, ly);
    debug!(backing, logo_side, x, y, "Logo composited");
    Ok(())
}

fn svg_logo(logo: &LogoOverlay, size: u32, total_modules: usize) -> Result<String> {
    let decoded = decode_logo(logo)?;
    let mime = image::guess_format(&logo.bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or("image/png");

    // Output pixels to viewBox units.
    let unit = total_modules as f32 / size.max(1) as f32;
    let (x, y, backing, logo_side) = logo_box(logo, size);
    let aspect = decoded.width() as f32 / decoded.height().max(1) as f32;
    let (w, h) = if aspect >= 1.0 {
        (logo_side as f32, logo_side as f32 / aspect)
    } else {
        (logo_side as f32 * aspect, logo_side as f32)
    };
    let lx = x as f32 + logo.padding as f32 + (logo_side as f32 - w) / 2.0;
    let ly = y as f32 + logo.padding as f32 + (logo_side as f32 - h) / 2.0;

    Ok(format!(
        concat!(
            r##"<rect x="{bx:.3}" y="{by:.3}" width="{bs:.3}" height="{bs:.3}" fill="#ffffff"/>"##,
            r#"<image x="{lx:.3}" y="{ly:.3}" width="{lw:.3}" height="{lh:.3}" "#,
            r#"href="data:{mime};base64,{data}"/>"#
        ),
        bx = x as f32 * unit,
        by = y as f32 * unit,
        bs = backing as f32 * unit,
        lx = lx * unit,
        ly = ly * unit,
        lw = w * unit,
        lh = h * unit,
        mime = mime,
        data = BASE64.encode(&logo.bytes),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn logo_png() -> Vec<u8> {
        ImageProcessor::from_dynamic(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            40,
            20,
            Rgba([200, 0, 0, 255]),
        )))
        .to_png_bytes()
        .unwrap()
    }

    #[test]
    fn raster_has_requested_size_and_quiet_zone() {
        let encoder = QrEncoder::new(QrOptions::with_size(290).with_margin(4));
        let matrix = QrMatrix::build("https://example.org", ErrorCorrection::Medium).unwrap();
        let canvas = encoder.render_raster(&matrix).unwrap();
        assert_eq!(canvas.dimensions(), (290, 290));
        // Corners sit inside the quiet zone.
        assert_eq!(*canvas.get_pixel(0, 0), WHITE);
        assert_eq!(*canvas.get_pixel(289, 289), WHITE);
        // The top-left finder pattern starts right after the quiet zone.
        let module_px = 290 / (matrix.width() as u32 + 8);
        let finder = canvas.get_pixel(4 * module_px + module_px, 4 * module_px + module_px);
        assert_eq!(*finder, Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn higher_correction_needs_more_modules() {
        let text = "The quick brown fox jumps over the lazy dog";
        let low = QrMatrix::build(text, ErrorCorrection::Low).unwrap();
        let high = QrMatrix::build(text, ErrorCorrection::High).unwrap();
        assert!(high.width() > low.width());
    }

    #[test]
    fn size_below_module_count_is_rejected() {
        let encoder = QrEncoder::new(QrOptions::with_size(10));
        assert!(matches!(
            encoder.encode("hello"),
            Err(WandelError::Validation(_))
        ));
    }

    #[test]
    fn oversized_content_is_an_encode_error() {
        let encoder = QrEncoder::new(QrOptions::default());
        let content = "x".repeat(5000);
        assert!(matches!(encoder.encode(&content), Err(WandelError::Encode(_))));
    }

    #[test]
    fn png_and_jpeg_outputs_decode() {
        for format in [OutputFormat::Png, OutputFormat::Jpeg] {
            let blob = QrEncoder::new(QrOptions::default().with_format(format))
                .encode("hello")
                .unwrap();
            assert_eq!(blob.mime_type, format.mime_type());
            let decoded = image::load_from_memory(&blob.bytes).unwrap();
            assert_eq!(decoded.width(), 300);
        }
    }

    #[test]
    fn svg_uses_module_viewbox() {
        let options = QrOptions::with_size(500)
            .with_margin(2)
            .with_format(OutputFormat::Svg);
        let blob = QrEncoder::new(options).encode("hello").unwrap();
        let svg = String::from_utf8(blob.bytes).unwrap();
        // "hello" fits a version 1 code: 21 modules plus 2 x 2 quiet zone.
        assert!(svg.contains(r#"viewBox="0 0 25 25""#));
        assert!(svg.contains(r#"width="500""#));
        assert!(svg.contains("M2 2h1v1h-1z"));
        assert!(svg.ends_with("</svg>"));
    }

    #[test]
    fn logo_sits_on_white_backing() {
        let logo = LogoOverlay {
            padding: 6,
            ..LogoOverlay::new(logo_png())
        };
        let encoder = QrEncoder::new(
            QrOptions::with_size(300)
                .with_error_correction(ErrorCorrection::High)
                .with_logo(logo.clone()),
        );
        let matrix = QrMatrix::build("https://example.org/logo", ErrorCorrection::High).unwrap();
        let canvas = encoder.render_raster(&matrix).unwrap();

        let (x, y, backing, _) = logo_box(&logo, 300);
        assert_eq!(backing, 60 + 12);
        // Padding strip is white, the centre is the logo colour.
        assert_eq!(*canvas.get_pixel(x as u32 + 1, y as u32 + 1), WHITE);
        assert_eq!(*canvas.get_pixel(150, 150), Rgba([200, 0, 0, 255]));
    }

    #[test]
    fn svg_logo_is_embedded_inline() {
        let options = QrOptions::default()
            .with_format(OutputFormat::Svg)
            .with_logo(LogoOverlay::new(logo_png()));
        let blob = QrEncoder::new(options).encode("logo").unwrap();
        let svg = String::from_utf8(blob.bytes).unwrap();
        assert!(svg.contains("data:image/png;base64,"));
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: QrOptions =
            serde_json::from_str(r#"{"size": 512, "errorCorrection": "H", "format": "svg"}"#)
                .unwrap();
        assert_eq!(options.size, 512);
        assert_eq!(options.margin, 4);
        assert_eq!(options.error_correction, ErrorCorrection::High);
        assert_eq!(options.format, OutputFormat::Svg);
    }
}
