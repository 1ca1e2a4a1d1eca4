// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// What a batch run does to each file. Every pipeline is wrapped behind
// `FileProcessor` so the runner only sees "bytes in, blob out".

use wandelwerk_codes::CodePipeline;
use wandelwerk_core::error::{Result, WandelError};
use wandelwerk_core::{Blob, ImageTool, OutputFormat, ProcessingOptions, SourceFile};
use wandelwerk_document::{DocumentConverter, ImagePipeline, PdfOperation, PdfOutput, PdfPipeline};

use crate::archive::bundle_parts;

/// A per-file (or, when combining, whole-batch) transformation.
pub trait FileProcessor: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Fewest files the tool can run on.
    fn min_files(&self) -> usize {
        1
    }

    /// Whether the tool turns all files into a single output.
    fn is_combining(&self) -> bool {
        false
    }

    /// Transform one file.
    fn process(&self, source: &SourceFile) -> Result<Blob>;

    /// Transform all files at once. Only called when `is_combining`.
    fn combine(&self, sources: &[SourceFile]) -> Result<Blob> {
        let _ = sources;
        Err(WandelError::UnsupportedOperation(format!(
            "{} does not combine files",
            self.name()
        )))
    }

    /// Name of the combined output.
    fn combined_name(&self) -> String {
        format!("{}-output", self.name())
    }
}

/// Several blobs from one file travel as one zip.
fn single_blob(source: &SourceFile, mut blobs: Vec<Blob>) -> Result<Blob> {
    match blobs.len() {
        0 => Err(WandelError::Encode(format!("{} produced no output", source.name()))),
        1 => Ok(blobs.remove(0)),
        _ => bundle_parts(source.stem(), blobs),
    }
}

// -- Image tools --------------------------------------------------------------

pub struct ImageToolProcessor {
    pipeline: ImagePipeline,
    tool: ImageTool,
    options: ProcessingOptions,
}

impl ImageToolProcessor {
    /// Options are validated here, before any file is touched.
    pub fn new(pipeline: ImagePipeline, tool: ImageTool, options: ProcessingOptions) -> Result<Self> {
        options.validate_for(tool)?;
        Ok(Self {
            pipeline,
            tool,
            options,
        })
    }
}

impl FileProcessor for ImageToolProcessor {
    fn name(&self) -> &str {
        self.tool.name()
    }

    fn process(&self, source: &SourceFile) -> Result<Blob> {
        self.pipeline.transform(source.bytes(), self.tool, &self.options)
    }
}

// -- PDF operations -----------------------------------------------------------

pub struct PdfToolProcessor {
    pipeline: PdfPipeline,
    operation: PdfOperation,
}

impl PdfToolProcessor {
    pub fn new(pipeline: PdfPipeline, operation: PdfOperation) -> Self {
        Self {
            pipeline,
            operation,
        }
    }
}

impl FileProcessor for PdfToolProcessor {
    fn name(&self) -> &str {
        self.operation.name()
    }

    fn min_files(&self) -> usize {
        match self.operation {
            PdfOperation::Merge { .. } => 2,
            _ => 1,
        }
    }

    fn is_combining(&self) -> bool {
        self.operation.is_combining()
    }

    fn process(&self, source: &SourceFile) -> Result<Blob> {
        let output = self
            .pipeline
            .operate(std::slice::from_ref(source), &self.operation)?;
        match output {
            PdfOutput::Document(blob) => Ok(blob),
            other => single_blob(source, other.into_blobs()),
        }
    }

    fn combine(&self, sources: &[SourceFile]) -> Result<Blob> {
        let output = self.pipeline.operate(sources, &self.operation)?;
        match output {
            PdfOutput::Document(blob) => Ok(blob),
            other => {
                let blobs = other.into_blobs();
                bundle_parts(&self.combined_name(), blobs)
            }
        }
    }

    fn combined_name(&self) -> String {
        match self.operation {
            PdfOperation::Merge { .. } => "merged.pdf".into(),
            PdfOperation::FromImages { .. } => "images.pdf".into(),
            _ => format!("{}.zip", self.operation.name()),
        }
    }
}

// -- Format conversion --------------------------------------------------------

pub struct ConvertProcessor {
    converter: DocumentConverter,
    target: OutputFormat,
    options: ProcessingOptions,
}

impl ConvertProcessor {
    pub fn new(converter: DocumentConverter, target: OutputFormat, options: ProcessingOptions) -> Self {
        Self {
            converter,
            target,
            options,
        }
    }
}

impl FileProcessor for ConvertProcessor {
    fn name(&self) -> &str {
        "convert"
    }

    fn process(&self, source: &SourceFile) -> Result<Blob> {
        let blobs = self.converter.convert(source, self.target, &self.options)?;
        single_blob(source, blobs)
    }
}

// -- QR reading ---------------------------------------------------------------

/// Reads the QR code in each uploaded image; outputs are text blobs.
#[derive(Debug, Default)]
pub struct QrDecodeProcessor {
    pipeline: CodePipeline,
}

impl QrDecodeProcessor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FileProcessor for QrDecodeProcessor {
    fn name(&self) -> &str {
        "qr-decode"
    }

    fn process(&self, source: &SourceFile) -> Result<Blob> {
        let decoded = self.pipeline.decode(source.bytes())?;
        Ok(Blob::new(decoded.text.into_bytes(), "text/plain"))
    }
}

// -- Caller-supplied ----------------------------------------------------------

/// Wraps a closure as a per-file processor.
pub struct ProcessFn<F> {
    name: String,
    function: F,
}

impl<F> ProcessFn<F>
where
    F: Fn(&SourceFile) -> Result<Blob> + Send + Sync,
{
    pub fn new(name: impl Into<String>, function: F) -> Self {
        Self {
            name: name.into(),
            function,
        }
    }
}

impl<F> FileProcessor for ProcessFn<F>
where
    F: Fn(&SourceFile) -> Result<Blob> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&self, source: &SourceFile) -> Result<Blob> {
        (self.function)(source)
    }
}
