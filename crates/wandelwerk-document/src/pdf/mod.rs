// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module: reading, assembling, overlaying, rendering and creating PDFs.

pub mod builder;
pub mod overlay;
pub mod pipeline;
pub mod reader;
pub mod render;
pub mod writer;

pub use builder::PdfAssembler;
pub use overlay::PdfWatermark;
pub use pipeline::{DocumentSummary, PdfOperation, PdfOutput, PdfPipeline};
pub use reader::{DocumentInfo, PageInfo, PdfReader};
pub use render::PageRasterizer;
pub use writer::PdfWriter;
