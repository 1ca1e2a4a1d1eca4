// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// wandelwerk-document: Raster image and PDF pipelines for Wandelwerk.
//
// Provides the image tools (resize, crop, rotate, compress, watermark,
// background removal, filters, conversion) and the PDF operations (merge,
// split, compress, watermark, protect stamp, rotate, reorder, PDF to images,
// images to PDF), plus routing between the two.

pub mod convert;
pub mod image;
pub mod pdf;

// Re-export the primary structs so callers can use `wandelwerk_document::PdfReader` etc.
pub use convert::DocumentConverter;
pub use image::{ImagePipeline, ImageProcessor};
pub use pdf::{PdfOperation, PdfOutput, PdfPipeline, PdfReader, PdfWriter};
