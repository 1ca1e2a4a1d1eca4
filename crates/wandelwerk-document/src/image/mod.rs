// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module: raster tools (resize, crop, rotate, compress, watermark,
// background removal, filters, conversion) and the bitmap text they share.

pub mod background;
pub mod filters;
pub mod pipeline;
pub mod processor;
pub mod text;

pub use pipeline::ImagePipeline;
pub use processor::ImageProcessor;
