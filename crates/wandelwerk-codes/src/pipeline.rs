// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Matrix code dispatch: one closed tool enum covering QR generation, barcode
// generation and QR reading.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use wandelwerk_core::Blob;
use wandelwerk_core::error::Result;

use crate::barcode::{BarcodeFormat, BarcodeGenerator, BarcodeOptions};
use crate::qr::bulk::{BulkEntry, BulkReport, generate_bulk};
use crate::qr::{DecodedCode, QrDecoder, QrEncoder, QrOptions, QrPayload};

/// A matrix-code job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "kebab-case")]
pub enum CodeTool {
    /// Generate one QR code.
    Qr {
        payload: QrPayload,
        #[serde(default)]
        options: QrOptions,
    },
    /// Generate one barcode.
    Barcode {
        format: BarcodeFormat,
        data: String,
        #[serde(default)]
        options: BarcodeOptions,
    },
    /// Read the QR code in each input image; outputs are plain text.
    Decode,
}

impl CodeTool {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Qr { .. } => "qr",
            Self::Barcode { .. } => "barcode",
            Self::Decode => "decode",
        }
    }

    /// Whether the tool reads uploaded files rather than generating from
    /// its own parameters.
    pub fn needs_input(&self) -> bool {
        matches!(self, Self::Decode)
    }
}

/// Front door for the matrix code tools.
#[derive(Debug, Default, Clone, Copy)]
pub struct CodePipeline {
    decoder: QrDecoder,
}

impl CodePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a generating tool. `Decode` reads from `input`.
    #[instrument(skip(self, tool, input), fields(tool = tool.name()))]
    pub fn run(&self, tool: &CodeTool, input: Option<&[u8]>) -> Result<Blob> {
        let blob = match tool {
            CodeTool::Qr { payload, options } => {
                QrEncoder::new(options.clone()).encode_payload(payload)?
            }
            CodeTool::Barcode {
                format,
                data,
                options,
            } => BarcodeGenerator::new(options.clone()).generate(*format, data)?,
            CodeTool::Decode => {
                let decoded = self.decode(input.unwrap_or_default())?;
                Blob::new(decoded.text.into_bytes(), "text/plain")
            }
        };
        info!(output_bytes = blob.len(), mime = %blob.mime_type, "Code tool finished");
        Ok(blob)
    }

    pub fn decode(&self, data: &[u8]) -> Result<DecodedCode> {
        self.decoder.decode(data)
    }

    pub fn bulk(&self, entries: &[BulkEntry], options: QrOptions) -> BulkReport {
        generate_bulk(&QrEncoder::new(options), entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wandelwerk_core::WandelError;

    #[test]
    fn qr_then_decode() {
        let pipeline = CodePipeline::new();
        let qr = pipeline
            .run(
                &CodeTool::Qr {
                    payload: QrPayload::text("wandelwerk"),
                    options: QrOptions::default(),
                },
                None,
            )
            .unwrap();
        let text = pipeline.run(&CodeTool::Decode, Some(&qr.bytes)).unwrap();
        assert_eq!(text.mime_type, "text/plain");
        assert_eq!(text.bytes, b"wandelwerk");
    }

    #[test]
    fn decode_without_input_finds_nothing() {
        assert!(matches!(
            CodePipeline::new().run(&CodeTool::Decode, None),
            Err(WandelError::Decode(_))
        ));
    }

    #[test]
    fn tools_deserialize_from_tagged_json() {
        let tool: CodeTool = serde_json::from_str(
            r#"{"tool": "barcode", "format": "EAN8", "data": "96385074"}"#,
        )
        .unwrap();
        assert_eq!(tool.name(), "barcode");
        let blob = CodePipeline::new().run(&tool, None).unwrap();
        assert_eq!(blob.mime_type, "image/png");

        let tool: CodeTool = serde_json::from_str(
            r#"{"tool": "qr", "payload": {"type": "url", "url": "https://example.org"}, "options": {"format": "svg"}}"#,
        )
        .unwrap();
        assert_eq!(CodePipeline::new().run(&tool, None).unwrap().mime_type, "image/svg+xml");
    }
}
