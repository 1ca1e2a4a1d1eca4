// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Wandelwerk.

use thiserror::Error;

/// Top-level error type for all Wandelwerk operations.
#[derive(Debug, Error)]
pub enum WandelError {
    // -- Input errors --
    #[error("could not decode input: {0}")]
    Decode(String),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("page range {from}-{to} is outside the document (1-{page_count})")]
    PageRange { from: u32, to: u32, page_count: u32 },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("precondition not met: {0}")]
    Precondition(String),

    // -- Output errors --
    #[error("encoding failed: {0}")]
    Encode(String),

    #[error("page rendering failed: {0}")]
    Render(String),

    #[error("archive creation failed: {0}")]
    Archive(String),

    // -- Run control --
    #[error("processing was stopped")]
    Cancelled,

    #[error("a batch is already being processed")]
    Busy,

    // -- Configuration / persistence --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, WandelError>;
