// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Upload intake policy: which files a batch accepts.

use tracing::debug;
use wandelwerk_core::error::{Result, WandelError};
use wandelwerk_core::{EngineConfig, SourceFile};

/// MIME types accepted by default: raster images and PDF.
const DEFAULT_ALLOWED: &[&str] = &["image/*", "application/pdf"];

/// Limits applied when files are added to a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakePolicy {
    /// Exact MIME types or `type/*` wildcards.
    pub allowed_mime: Vec<String>,
    pub max_files: usize,
    pub max_file_bytes: usize,
}

impl Default for IntakePolicy {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl IntakePolicy {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            allowed_mime: DEFAULT_ALLOWED.iter().map(|m| m.to_string()).collect(),
            max_files: config.max_files,
            max_file_bytes: config.max_file_bytes,
        }
    }

    /// Restrict intake to the given MIME patterns.
    pub fn with_allowed<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_mime = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn allows_mime(&self, mime: &str) -> bool {
        let mime = mime.to_ascii_lowercase();
        self.allowed_mime.iter().any(|pattern| {
            let pattern = pattern.to_ascii_lowercase();
            match pattern.strip_suffix("/*") {
                Some(family) => mime
                    .split_once('/')
                    .is_some_and(|(kind, _)| kind == family),
                None => mime == pattern,
            }
        })
    }

    /// Check whether `file` may join a batch that already holds
    /// `current_count` files.
    pub fn check(&self, current_count: usize, file: &SourceFile) -> Result<()> {
        if current_count >= self.max_files {
            return Err(WandelError::Validation(format!(
                "a batch holds at most {} files",
                self.max_files
            )));
        }
        if file.byte_size() > self.max_file_bytes {
            return Err(WandelError::Validation(format!(
                "{} is {} bytes, the limit is {}",
                file.name(),
                file.byte_size(),
                self.max_file_bytes
            )));
        }
        if !self.allows_mime(file.mime_type()) {
            return Err(WandelError::Validation(format!(
                "{} has unsupported type {}",
                file.name(),
                file.mime_type()
            )));
        }
        debug!(name = file.name(), bytes = file.byte_size(), "File accepted");
        Ok(())
    }
}
