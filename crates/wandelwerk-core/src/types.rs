// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types: uploaded source files, per-file processing state, and
// the encoded blobs pipelines hand back.

use std::io::Cursor;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one upload event. Two uploads of identical bytes get
/// different ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId(pub Uuid);

impl FileId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Broad family of an input, used to route it to a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Image,
    Pdf,
    Other,
}

impl MediaKind {
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.to_ascii_lowercase();
        if mime == "application/pdf" {
            Self::Pdf
        } else if mime.starts_with("image/") && mime != "image/svg+xml" {
            Self::Image
        } else {
            Self::Other
        }
    }
}

/// Pixel dimensions of a raster image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// An original upload. Immutable once created; the byte buffer is shared
/// read-only with in-flight pipeline calls.
#[derive(Debug, Clone)]
pub struct SourceFile {
    id: FileId,
    name: String,
    mime_type: String,
    bytes: Arc<[u8]>,
    dimensions: OnceLock<Option<Dimensions>>,
}

impl SourceFile {
    /// Wrap uploaded bytes with a declared MIME type.
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            id: FileId::new(),
            name: name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
            dimensions: OnceLock::new(),
        }
    }

    /// Wrap uploaded bytes, sniffing the MIME type from magic bytes. Falls
    /// back to `application/octet-stream` when the content is unrecognised.
    pub fn sniffed(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let mime = infer::get(&bytes)
            .map(|kind| kind.mime_type())
            .unwrap_or("application/octet-stream");
        Self::new(name, mime, bytes)
    }

    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn byte_size(&self) -> usize {
        self.bytes.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Cheap handle on the byte buffer for moving into a worker thread.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn kind(&self) -> MediaKind {
        MediaKind::from_mime(&self.mime_type)
    }

    /// Image dimensions, read from the header on first access. `None` for
    /// non-images and undecodable headers.
    pub fn dimensions(&self) -> Option<Dimensions> {
        *self.dimensions.get_or_init(|| {
            if self.kind() != MediaKind::Image {
                return None;
            }
            image::ImageReader::new(Cursor::new(&self.bytes[..]))
                .with_guessed_format()
                .ok()?
                .into_dimensions()
                .ok()
                .map(|(width, height)| Dimensions { width, height })
        })
    }

    /// File name without its final extension.
    pub fn stem(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.name,
        }
    }
}

/// Encoded output of one pipeline call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl Blob {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Lifecycle states of a file inside a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

/// Per-file processing state tracked by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedFile {
    pub status: FileStatus,
    pub progress: u8,
    pub output: Option<Blob>,
    pub error: Option<String>,
}

impl Default for ProcessedFile {
    fn default() -> Self {
        Self {
            status: FileStatus::Pending,
            progress: 0,
            output: None,
            error: None,
        }
    }
}

impl ProcessedFile {
    /// Enter `processing`, dropping any previous output or error.
    pub fn start(&mut self) {
        self.status = FileStatus::Processing;
        self.progress = 0;
        self.output = None;
        self.error = None;
    }

    /// Raise progress to `value`. Never moves backwards and never reaches 100
    /// before completion.
    pub fn advance(&mut self, value: u8) {
        if self.status == FileStatus::Processing {
            self.progress = self.progress.max(value.min(99));
        }
    }

    pub fn complete(&mut self, output: Blob) {
        self.status = FileStatus::Completed;
        self.progress = 100;
        self.output = Some(output);
        self.error = None;
    }

    /// Mark an atomic multi-input run as done; the combined output lives on
    /// the batch, not on the individual record.
    pub fn complete_without_output(&mut self) {
        self.status = FileStatus::Completed;
        self.progress = 100;
        self.output = None;
        self.error = None;
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = FileStatus::Error;
        self.output = None;
        self.error = Some(message.into());
    }

    /// Return to `pending` (used when a run is stopped mid-file).
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn output_byte_size(&self) -> Option<usize> {
        self.output.as_ref().map(Blob::len)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, FileStatus::Completed | FileStatus::Error)
    }
}

/// Status update emitted to the caller for every state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileUpdate {
    pub id: FileId,
    pub status: FileStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileUpdate {
    pub fn of(id: FileId, state: &ProcessedFile) -> Self {
        Self {
            id,
            status: state.status,
            progress: state.progress,
            error: state.error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[test]
    fn ids_are_unique_per_upload() {
        let bytes = png_bytes(2, 2);
        let a = SourceFile::new("a.png", "image/png", bytes.clone());
        let b = SourceFile::new("a.png", "image/png", bytes);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn sniffing_detects_png() {
        let file = SourceFile::sniffed("upload", png_bytes(3, 2));
        assert_eq!(file.mime_type(), "image/png");
        assert_eq!(file.kind(), MediaKind::Image);
    }

    #[test]
    fn dimensions_are_read_lazily() {
        let file = SourceFile::new("p.png", "image/png", png_bytes(7, 5));
        assert_eq!(file.dimensions(), Some(Dimensions { width: 7, height: 5 }));
        let junk = SourceFile::new("x.png", "image/png", vec![1, 2, 3]);
        assert_eq!(junk.dimensions(), None);
    }

    #[test]
    fn stem_strips_last_extension() {
        let file = SourceFile::new("report.final.pdf", "application/pdf", vec![]);
        assert_eq!(file.stem(), "report.final");
        let dotfile = SourceFile::new(".hidden", "text/plain", vec![]);
        assert_eq!(dotfile.stem(), ".hidden");
    }

    #[test]
    fn progress_is_monotonic_and_capped_until_completion() {
        let mut state = ProcessedFile::default();
        state.start();
        state.advance(40);
        state.advance(20);
        assert_eq!(state.progress, 40);
        state.advance(100);
        assert_eq!(state.progress, 99);
        state.complete(Blob::new(vec![1, 2, 3], "image/png"));
        assert_eq!(state.progress, 100);
        assert_eq!(state.output_byte_size(), Some(3));
    }

    #[test]
    fn restarting_drops_previous_output() {
        let mut state = ProcessedFile::default();
        state.start();
        state.complete(Blob::new(vec![9; 4], "image/png"));
        state.start();
        assert_eq!(state.status, FileStatus::Processing);
        assert!(state.output.is_none());
        assert_eq!(state.progress, 0);
    }

    #[test]
    fn failure_keeps_message() {
        let mut state = ProcessedFile::default();
        state.start();
        state.fail("could not decode input");
        assert_eq!(state.status, FileStatus::Error);
        assert_eq!(state.error.as_deref(), Some("could not decode input"));
        assert!(state.is_finished());
    }
}
