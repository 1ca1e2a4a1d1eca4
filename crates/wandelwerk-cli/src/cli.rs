// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde::de::DeserializeOwned;
use wandelwerk_batch::NamingStrategy;
use wandelwerk_codes::BarcodeFormat;
use wandelwerk_codes::qr::ErrorCorrection;
use wandelwerk_core::error::{Result, WandelError};
use wandelwerk_core::{
    Anchor, CompressionLevel, CropArea, ImageTool, OutputFormat, PageRange, PaperSize,
    ProcessingOptions, ResizeMode,
};
use wandelwerk_document::pdf::PdfWatermark;
use wandelwerk_document::PdfOperation;

/// Local image, PDF and QR/barcode transformations.
#[derive(Debug, Parser)]
#[command(name = "wandelwerk", version, arg_required_else_help = true)]
pub struct Cli {
    /// Engine configuration file (JSON). Defaults apply when it is absent.
    #[arg(long, env = "WANDELWERK_CONFIG", default_value = "wandelwerk.json", global = true)]
    pub config: PathBuf,

    /// Enable DEBUG-level logs.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Apply one raster tool to every input image.
    Image(ImageArgs),
    /// Run a PDF operation over the inputs.
    Pdf(PdfArgs),
    /// Convert inputs to another format.
    Convert(ConvertArgs),
    /// Print page count, metadata and page sizes of a PDF.
    Inspect {
        input: PathBuf,
    },
    /// Generate one QR code.
    Qr(QrArgs),
    /// Generate QR codes from a JSON list of `{content, filename}` entries.
    QrBulk(QrBulkArgs),
    /// Generate a barcode, or only validate its data.
    Barcode(BarcodeArgs),
    /// Read the QR code in each input image.
    Decode {
        #[command(flatten)]
        batch: BatchArgs,
    },
    /// Print the effective configuration.
    Config {
        /// Also write it to the configuration path.
        #[arg(long)]
        write: bool,
    },
}

/// Inputs and delivery shared by every batch command.
#[derive(Debug, Clone, Args)]
pub struct BatchArgs {
    /// Files to process, in order.
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Directory outputs are written to.
    #[arg(short, long, default_value = ".")]
    pub out_dir: PathBuf,

    /// Write one zip instead of individual files.
    #[arg(long)]
    pub zip: bool,

    /// Entry naming inside the zip: original, sequential, timestamp or prefix:<text>.
    #[arg(long, default_value = "original", value_parser = parse_naming)]
    pub naming: NamingStrategy,

    /// Space individual writes by the configured stagger delay.
    #[arg(long)]
    pub stagger: bool,
}

// -- Image --------------------------------------------------------------------

#[derive(Debug, Args)]
pub struct ImageArgs {
    /// resize, crop, rotate, compress, watermark, remove-background, filters or convert.
    #[arg(value_parser = serde_value::<ImageTool>)]
    pub tool: ImageTool,

    /// Start from options in a JSON file; flags below override it.
    #[arg(long)]
    pub options: Option<PathBuf>,

    #[arg(long)]
    pub quality: Option<u8>,
    #[arg(long)]
    pub width: Option<u32>,
    #[arg(long)]
    pub height: Option<u32>,
    /// fit, fill or stretch.
    #[arg(long, value_parser = serde_value::<ResizeMode>)]
    pub mode: Option<ResizeMode>,
    /// Ignore the source aspect ratio when only one side is given.
    #[arg(long)]
    pub free_aspect: bool,
    /// jpeg, png or webp.
    #[arg(long, value_parser = serde_value::<OutputFormat>)]
    pub format: Option<OutputFormat>,
    /// Fill colour for transparent areas, `#rrggbb`.
    #[arg(long)]
    pub background: Option<String>,
    /// Crop rectangle in percent of the source: `x,y,width,height`.
    #[arg(long, value_parser = parse_crop)]
    pub crop: Option<CropArea>,
    /// Clockwise rotation in degrees.
    #[arg(long, allow_negative_numbers = true)]
    pub rotate: Option<f32>,
    /// Watermark text.
    #[arg(long)]
    pub text: Option<String>,
    #[arg(long)]
    pub opacity: Option<f32>,
    /// center, top-left, top-right, bottom-left or bottom-right.
    #[arg(long, value_parser = serde_value::<Anchor>)]
    pub position: Option<Anchor>,
    /// low, medium, high or maximum.
    #[arg(long, value_parser = serde_value::<CompressionLevel>)]
    pub level: Option<CompressionLevel>,
    #[arg(long, allow_negative_numbers = true)]
    pub brightness: Option<f32>,
    #[arg(long)]
    pub contrast: Option<f32>,
    #[arg(long)]
    pub saturation: Option<f32>,
    #[arg(long)]
    pub blur: Option<f32>,
    #[arg(long)]
    pub grayscale: bool,
    #[arg(long)]
    pub sepia: bool,

    #[command(flatten)]
    pub batch: BatchArgs,
}

impl ImageArgs {
    /// Options snapshot for the run: the JSON file (if any) with flags on top.
    pub fn processing_options(&self) -> Result<ProcessingOptions> {
        let mut options = match &self.options {
            Some(path) => {
                let data = std::fs::read_to_string(path)?;
                serde_json::from_str(&data).map_err(|err| {
                    WandelError::Validation(format!("invalid options {}: {}", path.display(), err))
                })?
            }
            None => ProcessingOptions::default(),
        };

        if let Some(quality) = self.quality {
            options.quality = quality;
        }
        if self.width.is_some() {
            options.width = self.width;
        }
        if self.height.is_some() {
            options.height = self.height;
        }
        if let Some(mode) = self.mode {
            options.resize_mode = mode;
        }
        if self.free_aspect {
            options.maintain_aspect_ratio = false;
        }
        if let Some(format) = self.format {
            options.output_format = format;
        }
        if self.background.is_some() {
            options.background_color = self.background.clone();
        }
        if self.crop.is_some() {
            options.crop_area = self.crop;
        }
        if let Some(degrees) = self.rotate {
            options.rotation_degrees = degrees;
        }
        if self.text.is_some() {
            options.watermark_text = self.text.clone();
        }
        if let Some(opacity) = self.opacity {
            options.watermark_opacity = opacity;
        }
        if let Some(position) = self.position {
            options.watermark_position = position;
        }
        if let Some(level) = self.level {
            options.compression_level = level;
        }

        let filters = &mut options.filters;
        if let Some(value) = self.brightness {
            filters.brightness = value;
        }
        if let Some(value) = self.contrast {
            filters.contrast = value;
        }
        if let Some(value) = self.saturation {
            filters.saturation = value;
        }
        if let Some(value) = self.blur {
            filters.blur = value;
        }
        filters.grayscale |= self.grayscale;
        filters.sepia |= self.sepia;

        Ok(options)
    }
}

// -- PDF ----------------------------------------------------------------------

#[derive(Debug, Args)]
pub struct PdfArgs {
    #[command(subcommand)]
    pub operation: PdfCommand,
}

#[derive(Debug, Subcommand)]
pub enum PdfCommand {
    /// Concatenate all inputs into merged.pdf.
    Merge {
        /// Skip the per-file outline entries.
        #[arg(long)]
        no_bookmarks: bool,
        /// Do not copy metadata from the first input.
        #[arg(long)]
        no_metadata: bool,
        #[command(flatten)]
        batch: BatchArgs,
    },
    /// One document per page range, e.g. `--ranges 1-3,4,5-9`.
    Split {
        #[arg(long)]
        ranges: String,
        #[command(flatten)]
        batch: BatchArgs,
    },
    Compress {
        #[arg(long, default_value = "medium", value_parser = serde_value::<CompressionLevel>)]
        level: CompressionLevel,
        #[command(flatten)]
        batch: BatchArgs,
    },
    /// Stamp text across every page.
    Watermark {
        #[arg(long)]
        text: String,
        #[arg(long, default_value_t = 0.3)]
        opacity: f32,
        #[arg(long, default_value_t = 45.0, allow_negative_numbers = true)]
        angle: f32,
        #[arg(long)]
        font_size: Option<f32>,
        #[arg(long)]
        tiled: bool,
        #[command(flatten)]
        batch: BatchArgs,
    },
    /// Stamp PROTECTED on every page. No encryption is applied.
    Protect {
        #[arg(long, env = "WANDELWERK_PDF_PASSWORD")]
        password: String,
        #[command(flatten)]
        batch: BatchArgs,
    },
    Rotate {
        /// Multiple of 90.
        #[arg(long, allow_negative_numbers = true)]
        degrees: i32,
        /// Pages to rotate, e.g. `1,3-4`. All pages when omitted.
        #[arg(long)]
        pages: Option<String>,
        #[command(flatten)]
        batch: BatchArgs,
    },
    /// Rebuild with pages in a new order, e.g. `--order 3,1,2`.
    Reorder {
        #[arg(long)]
        order: String,
        #[command(flatten)]
        batch: BatchArgs,
    },
    /// Render each page to an image.
    ToImages {
        #[arg(long)]
        dpi: Option<f32>,
        #[arg(long, default_value = "png", value_parser = serde_value::<OutputFormat>)]
        format: OutputFormat,
        #[arg(long, default_value_t = 92)]
        quality: u8,
        #[command(flatten)]
        batch: BatchArgs,
    },
    /// Place every input image on its own page of images.pdf.
    FromImages {
        #[arg(long, default_value = "a4", value_parser = serde_value::<PaperSize>)]
        paper: PaperSize,
        #[command(flatten)]
        batch: BatchArgs,
    },
}

impl PdfCommand {
    /// The operation to run and the inputs to run it on.
    pub fn into_parts(self) -> Result<(PdfOperation, BatchArgs)> {
        let parts = match self {
            Self::Merge {
                no_bookmarks,
                no_metadata,
                batch,
            } => (
                PdfOperation::Merge {
                    bookmarks: !no_bookmarks,
                    copy_metadata: !no_metadata,
                },
                batch,
            ),
            Self::Split { ranges, batch } => (
                PdfOperation::Split {
                    ranges: PageRange::parse_list(&ranges)?,
                },
                batch,
            ),
            Self::Compress { level, batch } => (PdfOperation::Compress { level }, batch),
            Self::Watermark {
                text,
                opacity,
                angle,
                font_size,
                tiled,
                batch,
            } => (
                PdfOperation::Watermark(PdfWatermark {
                    text,
                    font_size,
                    opacity,
                    angle,
                    tiled,
                    ..Default::default()
                }),
                batch,
            ),
            Self::Protect { password, batch } => (PdfOperation::Protect { password }, batch),
            Self::Rotate {
                degrees,
                pages,
                batch,
            } => {
                let pages = pages.as_deref().map(page_numbers).transpose()?;
                (PdfOperation::Rotate { pages, degrees }, batch)
            }
            Self::Reorder { order, batch } => (
                PdfOperation::Reorder {
                    order: page_numbers(&order)?,
                },
                batch,
            ),
            Self::ToImages {
                dpi,
                format,
                quality,
                batch,
            } => (
                PdfOperation::ToImages {
                    dpi,
                    format,
                    quality,
                },
                batch,
            ),
            Self::FromImages { paper, batch } => (PdfOperation::FromImages { paper }, batch),
        };
        Ok(parts)
    }
}

// -- Conversion ---------------------------------------------------------------

#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// jpeg, png, webp or pdf.
    #[arg(long, value_parser = serde_value::<OutputFormat>)]
    pub to: OutputFormat,
    #[arg(long, default_value_t = 92)]
    pub quality: u8,
    #[command(flatten)]
    pub batch: BatchArgs,
}

// -- Codes --------------------------------------------------------------------

#[derive(Debug, Args)]
pub struct QrArgs {
    /// Plain text or URL to encode.
    #[arg(required_unless_present = "payload", conflicts_with = "payload")]
    pub content: Option<String>,

    /// Structured payload as JSON, e.g. `{"type":"wifi","ssid":"Home","password":"pw"}`.
    #[arg(long)]
    pub payload: Option<String>,

    #[arg(long, default_value_t = 300)]
    pub size: u32,
    /// Quiet zone in modules.
    #[arg(long, default_value_t = 4)]
    pub margin: u32,
    /// L, M, Q or H.
    #[arg(long, default_value = "M", value_parser = serde_value::<ErrorCorrection>)]
    pub ec: ErrorCorrection,
    /// png, jpeg, webp or svg.
    #[arg(long, default_value = "png", value_parser = serde_value::<OutputFormat>)]
    pub format: OutputFormat,
    #[arg(long, default_value = "#000000")]
    pub dark: String,
    #[arg(long, default_value = "#ffffff")]
    pub light: String,
    /// Image placed in the centre of the code.
    #[arg(long)]
    pub logo: Option<PathBuf>,

    #[arg(short, long)]
    pub output: PathBuf,
}

#[derive(Debug, Args)]
pub struct QrBulkArgs {
    /// JSON array of `{"content": ..., "filename": ...}`.
    pub entries: PathBuf,
    #[arg(long, default_value_t = 300)]
    pub size: u32,
    #[arg(long, default_value = "png", value_parser = serde_value::<OutputFormat>)]
    pub format: OutputFormat,
    #[arg(short, long, default_value = ".")]
    pub out_dir: PathBuf,
    /// Write one zip instead of individual files.
    #[arg(long)]
    pub zip: bool,
}

#[derive(Debug, Args)]
pub struct BarcodeArgs {
    /// EAN13, EAN8, UPC, CODE39 or CODE128.
    #[arg(long, value_parser = serde_value::<BarcodeFormat>)]
    pub symbology: BarcodeFormat,
    pub data: String,
    /// Only report whether the data is valid.
    #[arg(long)]
    pub check: bool,
    #[arg(long, default_value_t = 2)]
    pub bar_width: u32,
    #[arg(long, default_value_t = 100)]
    pub height: u32,
    #[arg(long)]
    pub no_text: bool,
    /// png, jpeg, webp or svg.
    #[arg(long, default_value = "png", value_parser = serde_value::<OutputFormat>)]
    pub format: OutputFormat,
    #[arg(short, long, required_unless_present = "check")]
    pub output: Option<PathBuf>,
}

// -- Value parsers ------------------------------------------------------------

/// Parse a bare word through the type's serde names, so the CLI accepts
/// exactly what the JSON options accept.
fn serde_value<T: DeserializeOwned>(raw: &str) -> std::result::Result<T, String> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|err| format!("'{}': {}", raw, err))
}

fn parse_naming(raw: &str) -> std::result::Result<NamingStrategy, String> {
    match raw {
        "original" => Ok(NamingStrategy::Original),
        "sequential" => Ok(NamingStrategy::Sequential),
        "timestamp" => Ok(NamingStrategy::Timestamp),
        other => match other.strip_prefix("prefix:") {
            Some(prefix) if !prefix.is_empty() => Ok(NamingStrategy::CustomPrefix(prefix.into())),
            _ => Err(format!(
                "'{}': expected original, sequential, timestamp or prefix:<text>",
                raw
            )),
        },
    }
}

fn parse_crop(raw: &str) -> std::result::Result<CropArea, String> {
    let values: Vec<f32> = raw
        .split(',')
        .map(|part| part.trim().parse::<f32>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|err| format!("'{}': {}", raw, err))?;
    match values.as_slice() {
        [x, y, width, height] => Ok(CropArea::new(*x, *y, *width, *height)),
        _ => Err(format!("'{}': expected x,y,width,height", raw)),
    }
}

/// Expand `1,3-4` into `[1, 3, 4]`.
fn page_numbers(raw: &str) -> Result<Vec<u32>> {
    Ok(PageRange::parse_list(raw)?
        .iter()
        .flat_map(|range| range.pages())
        .collect())
}
