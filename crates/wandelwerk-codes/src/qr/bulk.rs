// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bulk QR generation. Entries are encoded in order; an entry that fails is
// logged and recorded, and the run carries on with the next one.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use wandelwerk_core::Blob;

use super::encoder::QrEncoder;

/// One code to generate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkEntry {
    pub content: String,
    /// Output file name. Blank names become `qr_0001.png` and so on; a
    /// missing extension is added from the output format.
    #[serde(default)]
    pub filename: String,
}

impl BulkEntry {
    pub fn new(content: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            filename: filename.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeneratedCode {
    pub filename: String,
    pub blob: Blob,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkFailure {
    /// 0-based position in the input list.
    pub index: usize,
    pub filename: String,
    pub error: String,
}

/// Outcome of a bulk run: generated codes in input order, plus failures.
#[derive(Debug, Clone, Default)]
pub struct BulkReport {
    pub generated: Vec<GeneratedCode>,
    pub failures: Vec<BulkFailure>,
}

/// Encode every entry with `encoder`.
#[instrument(skip_all, fields(entries = entries.len()))]
pub fn generate_bulk(encoder: &QrEncoder, entries: &[BulkEntry]) -> BulkReport {
    let extension = encoder.options().format.extension();
    let mut report = BulkReport::default();

    for (index, entry) in entries.iter().enumerate() {
        let filename = output_name(&entry.filename, index, extension);
        match encoder.encode(&entry.content) {
            Ok(blob) => report.generated.push(GeneratedCode { filename, blob }),
            Err(err) => {
                warn!(index, %filename, %err, "Skipping QR entry");
                report.failures.push(BulkFailure {
                    index,
                    filename,
                    error: err.to_string(),
                });
            }
        }
    }

    info!(
        generated = report.generated.len(),
        failed = report.failures.len(),
        "Bulk QR generation finished"
    );
    report
}

fn output_name(requested: &str, index: usize, extension: &str) -> String {
    let requested = requested.trim();
    if requested.is_empty() {
        return format!("qr_{:04}.{}", index + 1, extension);
    }
    let suffix = format!(".{}", extension);
    if requested.to_ascii_lowercase().ends_with(&suffix) {
        requested.to_string()
    } else {
        format!("{}{}", requested, suffix)
    }
}
