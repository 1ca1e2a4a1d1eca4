// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// A batch: the uploads a user has queued, each paired with its processing
// state, plus the combined output of atomic multi-input runs.

use serde::Serialize;
use tracing::{debug, info};
use wandelwerk_core::error::{Result, WandelError};
use wandelwerk_core::{Blob, FileId, FileStatus, OutputFormat, ProcessedFile, SourceFile};

use crate::intake::IntakePolicy;

/// One upload and its state.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub source: SourceFile,
    pub state: ProcessedFile,
}

/// An output ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedOutput {
    pub name: String,
    pub blob: Blob,
}

/// A failed file and its message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileError {
    pub name: String,
    pub message: String,
}

/// File counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Queued uploads in input order.
#[derive(Debug, Default)]
pub struct Batch {
    items: Vec<BatchItem>,
    policy: IntakePolicy,
    processing: bool,
    combined: Option<NamedOutput>,
}

impl Batch {
    pub fn new(policy: IntakePolicy) -> Self {
        Self {
            items: Vec::new(),
            policy,
            processing: false,
            combined: None,
        }
    }

    // -- Intake ---------------------------------------------------------------

    /// Queue a file after checking it against the intake policy.
    pub fn add(&mut self, source: SourceFile) -> Result<FileId> {
        self.ensure_idle()?;
        self.policy.check(self.items.len(), &source)?;
        let id = source.id();
        info!(%id, name = source.name(), "File added to batch");
        self.items.push(BatchItem {
            source,
            state: ProcessedFile::default(),
        });
        Ok(id)
    }

    /// Drop a file and its state.
    pub fn remove(&mut self, id: FileId) -> Result<SourceFile> {
        self.ensure_idle()?;
        let index = self
            .position(id)
            .ok_or_else(|| WandelError::Validation(format!("no file with id {}", id)))?;
        debug!(%id, "File removed from batch");
        Ok(self.items.remove(index).source)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.ensure_idle()?;
        self.items.clear();
        self.combined = None;
        Ok(())
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.processing {
            return Err(WandelError::Busy);
        }
        Ok(())
    }

    // -- Access ---------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[BatchItem] {
        &self.items
    }

    pub fn get(&self, id: FileId) -> Option<&BatchItem> {
        self.items.iter().find(|item| item.source.id() == id)
    }

    fn position(&self, id: FileId) -> Option<usize> {
        self.items.iter().position(|item| item.source.id() == id)
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub(crate) fn set_processing(&mut self, processing: bool) {
        self.processing = processing;
    }

    pub(crate) fn item_mut(&mut self, index: usize) -> &mut BatchItem {
        &mut self.items[index]
    }

    pub(crate) fn set_combined(&mut self, output: Option<NamedOutput>) {
        self.combined = output;
    }

    /// Output of the last merge-style run, if any.
    pub fn combined(&self) -> Option<&NamedOutput> {
        self.combined.as_ref()
    }

    // -- Aggregation ----------------------------------------------------------

    /// Successful outputs in input order, followed by the combined output.
    pub fn outputs(&self) -> Vec<NamedOutput> {
        let mut outputs: Vec<NamedOutput> = self
            .items
            .iter()
            .filter(|item| item.state.status == FileStatus::Completed)
            .filter_map(|item| {
                let blob = item.state.output.clone()?;
                Some(NamedOutput {
                    name: output_name(item.source.name(), &blob.mime_type),
                    blob,
                })
            })
            .collect();
        outputs.extend(self.combined.clone());
        outputs
    }

    /// Error messages of failed files, in input order.
    pub fn errors(&self) -> Vec<FileError> {
        self.items
            .iter()
            .filter_map(|item| {
                item.state.error.as_ref().map(|message| FileError {
                    name: item.source.name().to_string(),
                    message: message.clone(),
                })
            })
            .collect()
    }

    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary {
            total: self.items.len(),
            ..Default::default()
        };
        for item in &self.items {
            match item.state.status {
                FileStatus::Pending => summary.pending += 1,
                FileStatus::Processing => summary.processing += 1,
                FileStatus::Completed => summary.completed += 1,
                FileStatus::Error => summary.failed += 1,
            }
        }
        summary
    }
}

/// Name for an output derived from its source: the extension follows the
/// output MIME type (`photo.png` compressed to JPEG becomes `photo.jpg`).
pub fn output_name(source_name: &str, mime_type: &str) -> String {
    let stem = match source_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => source_name,
    };
    let extension = match mime_type {
        "application/zip" => Some("zip"),
        "text/plain" => Some("txt"),
        other => OutputFormat::from_mime(other).map(|format| format.extension()),
    };
    match extension {
        Some(extension) => format!("{}.{}", stem, extension),
        None => source_name.to_string(),
    }
}
