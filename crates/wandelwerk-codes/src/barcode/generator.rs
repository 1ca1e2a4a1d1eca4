// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Barcode rendering. `barcoders` turns validated input into a module
// sequence (1 = bar); bars are then painted to a raster or written as SVG
// rectangles, with the human-readable text underneath when requested.

use barcoders::sym::code39::Code39;
use barcoders::sym::code128::Code128;
use barcoders::sym::ean8::EAN8;
use barcoders::sym::ean13::EAN13;
use image::{DynamicImage, RgbaImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use wandelwerk_core::color::{parse_color, to_hex};
use wandelwerk_core::error::{Result, WandelError};
use wandelwerk_core::{Blob, CompressionLevel, OutputFormat};
use wandelwerk_document::ImageProcessor;
use wandelwerk_document::image::text::{GLYPH_SIZE, draw_text, text_extent};

use super::validate::{BarcodeFormat, check_digit, validate};

/// Code 128 input prefix selecting character set B (printable ASCII).
const CODE128_SET_B: char = 'Ɓ';

/// Barcode rendering options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BarcodeOptions {
    /// Width of one module in pixels.
    pub bar_width: u32,
    /// Bar height in pixels.
    pub height: u32,
    /// Blank border on every side, in pixels.
    pub margin: u32,
    /// Print the encoded value under the bars.
    pub show_text: bool,
    pub foreground: String,
    pub background: String,
    pub format: OutputFormat,
}

impl Default for BarcodeOptions {
    fn default() -> Self {
        Self {
            bar_width: 2,
            height: 100,
            margin: 10,
            show_text: true,
            foreground: "#000000".into(),
            background: "#ffffff".into(),
            format: OutputFormat::Png,
        }
    }
}

/// Bars plus the text printed under them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarPattern {
    pub modules: Vec<u8>,
    pub label: String,
}

/// Validate `data` and encode it into modules. The label carries the
/// computed check digit for EAN and UPC.
pub fn bar_pattern(format: BarcodeFormat, data: &str) -> Result<BarPattern> {
    let validation = validate(format, data);
    if !validation.valid {
        return Err(WandelError::Validation(
            validation.error.unwrap_or_else(|| "invalid barcode data".into()),
        ));
    }

    let encode_error =
        |err: barcoders::error::Error| WandelError::Encode(format!("{}: {}", format.name(), err));

    let (modules, label) = match format {
        BarcodeFormat::Ean13 => {
            let body = &data[..12];
            let modules = EAN13::new(body).map_err(encode_error)?.encode();
            (modules, format!("{}{}", body, check_digit(body)))
        }
        BarcodeFormat::Ean8 => {
            let body = &data[..7];
            let modules = EAN8::new(body).map_err(encode_error)?.encode();
            (modules, format!("{}{}", body, check_digit(body)))
        }
        BarcodeFormat::Upc => {
            // UPC-A is EAN-13 with a leading zero.
            let body = &data[..11];
            let modules = EAN13::new(format!("0{}", body))
                .map_err(encode_error)?
                .encode();
            (modules, format!("{}{}", body, check_digit(body)))
        }
        BarcodeFormat::Code39 => {
            let modules = Code39::new(data).map_err(encode_error)?.encode();
            (modules, data.to_string())
        }
        BarcodeFormat::Code128 => {
            let modules = Code128::new(format!("{}{}", CODE128_SET_B, data))
                .map_err(encode_error)?
                .encode();
            (modules, data.to_string())
        }
    };

    if label != data {
        debug!(given = data, encoded = %label, "Check digit recomputed");
    }
    Ok(BarPattern { modules, label })
}

/// Renders barcodes to raster or SVG.
pub struct BarcodeGenerator {
    options: BarcodeOptions,
}

impl BarcodeGenerator {
    pub fn new(options: BarcodeOptions) -> Self {
        Self { options }
    }

    #[instrument(skip(self, data), fields(format = format.name(), data_len = data.len()))]
    pub fn generate(&self, format: BarcodeFormat, data: &str) -> Result<Blob> {
        let pattern = bar_pattern(format, data)?;
        info!(modules = pattern.modules.len(), "Rendering barcode");

        match self.options.format {
            OutputFormat::Svg => {
                let svg = self.render_svg(&pattern)?;
                Ok(Blob::new(svg.into_bytes(), OutputFormat::Svg.mime_type()))
            }
            OutputFormat::Pdf => Err(WandelError::UnsupportedOperation(
                "barcodes are produced as raster images or SVG".into(),
            )),
            output => {
                let background = parse_color(&self.options.background)?;
                let canvas = self.render_raster(&pattern)?;
                let bytes = ImageProcessor::from_dynamic(DynamicImage::ImageRgba8(canvas))
                    .encode(output, 95, CompressionLevel::Medium, background)?;
                debug!(output_bytes = bytes.len(), "Barcode encoded");
                Ok(Blob::new(bytes, output.mime_type()))
            }
        }
    }

    /// Height of the text strip under the bars (0 without text).
    fn text_strip(&self) -> u32 {
        if self.options.show_text {
            GLYPH_SIZE * self.text_scale() + self.options.margin / 2
        } else {
            0
        }
    }

    fn text_scale(&self) -> u32 {
        self.options.bar_width.clamp(1, 4)
    }

    fn canvas_size(&self, pattern: &BarPattern) -> (u32, u32) {
        let options = &self.options;
        let bars = pattern.modules.len() as u32 * options.bar_width.max(1);
        let (text_w, _) = text_extent(&pattern.label, self.text_scale());
        let width = bars.max(if options.show_text { text_w } else { 0 }) + 2 * options.margin;
        let height = options.height + self.text_strip() + 2 * options.margin;
        (width, height)
    }

    pub fn render_raster(&self, pattern: &BarPattern) -> Result<RgbaImage> {
        let options = &self.options;
        let foreground = parse_color(&options.foreground)?;
        let background = parse_color(&options.background)?;
        let (width, height) = self.canvas_size(pattern);
        let mut canvas = RgbaImage::from_pixel(width, height, background);

        let bar_width = options.bar_width.max(1);
        let bars_width = pattern.modules.len() as u32 * bar_width;
        let left = (width - bars_width) / 2;
        for (index, module) in pattern.modules.iter().enumerate() {
            if *module == 0 {
                continue;
            }
            let x0 = left + index as u32 * bar_width;
            for x in x0..x0 + bar_width {
                for y in options.margin..options.margin + options.height {
                    canvas.put_pixel(x, y, foreground);
                }
            }
        }

        if options.show_text {
            let scale = self.text_scale();
            let (text_w, _) = text_extent(&pattern.label, scale);
            let x = (width as i64 - text_w as i64) / 2;
            let y = (options.margin + options.height + options.margin / 2) as i64;
            draw_text(&mut canvas, &pattern.label, x, y, scale, foreground, 1.0);
        }
        Ok(canvas)
    }

    pub fn render_svg(&self, pattern: &BarPattern) -> Result<String> {
        let options = &self.options;
        let foreground = to_hex(parse_color(&options.foreground)?);
        let background = to_hex(parse_color(&options.background)?);
        let (width, height) = self.canvas_size(pattern);
        let bar_width = options.bar_width.max(1);
        let left = (width - pattern.modules.len() as u32 * bar_width) / 2;

        let mut svg = format!(
            concat!(
                r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" "#,
                r#"viewBox="0 0 {w} {h}" shape-rendering="crispEdges">"#,
                r#"<rect width="{w}" height="{h}" fill="{bg}"/>"#
            ),
            w = width,
            h = height,
            bg = background,
        );

        // Adjacent bar modules merge into one rectangle.
        let mut index = 0;
        while index < pattern.modules.len() {
            if pattern.modules[index] == 0 {
                index += 1;
                continue;
            }
            let start = index;
            while index < pattern.modules.len() && pattern.modules[index] == 1 {
                index += 1;
            }
            svg.push_str(&format!(
                r#"<rect x="{}" y="{}" width="{}" height="{}" fill="{}"/>"#,
                left + start as u32 * bar_width,
                options.margin,
                (index - start) as u32 * bar_width,
                options.height,
                foreground
            ));
        }

        if options.show_text {
            let scale = self.text_scale();
            svg.push_str(&format!(
                concat!(
                    r#"<text x="{}" y="{}" font-family="monospace" font-size="{}" "#,
                    r#"text-anchor="middle" dominant-baseline="hanging" fill="{}">{}</text>"#
                ),
                width / 2,
                options.margin + options.height + options.margin / 2,
                GLYPH_SIZE * scale,
                foreground,
                escape_xml(&pattern.label)
            ));
        }
        svg.push_str("</svg>");
        Ok(svg)
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
