// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages attached to the file or operation that failed.
//
// Every technical error is mapped to plain English with a clear suggestion.
// Severity drives how the caller presents it.

use crate::error::WandelError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The input itself is the problem (damaged, wrong format).
    BadInput,
    /// The user can fix it by changing an option or adding files.
    ActionRequired,
    /// Something outside the user's control; trying again may help.
    Transient,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown next to the file).
    pub message: String,
    /// What the user should try.
    pub suggestion: String,
    /// Severity level.
    pub severity: Severity,
}

impl std::fmt::Display for HumanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.message, self.suggestion)
    }
}

/// Convert a `WandelError` into a `HumanError`.
pub fn humanize_error(err: &WandelError) -> HumanError {
    match err {
        WandelError::Decode(detail) if detail.contains("No code found") => HumanError {
            message: "We couldn't find a QR code in this image.".into(),
            suggestion: "Make sure the whole code is visible, in focus, and not too small.".into(),
            severity: Severity::BadInput,
        },

        WandelError::Decode(_) => HumanError {
            message: "This file couldn't be opened.".into(),
            suggestion: "It may be damaged or in a format we don't support. Try re-saving it as PNG, JPEG, or PDF.".into(),
            severity: Severity::BadInput,
        },

        WandelError::UnsupportedOperation(detail) => HumanError {
            message: "This operation can't run with the current settings.".into(),
            suggestion: format!("Check the options for this tool. ({detail})"),
            severity: Severity::ActionRequired,
        },

        WandelError::PageRange { from, to, page_count } => HumanError {
            message: format!("Pages {from}-{to} don't exist in this document."),
            suggestion: format!("This document has {page_count} page(s). Choose a range inside it."),
            severity: Severity::ActionRequired,
        },

        WandelError::Validation(detail) => HumanError {
            message: "Some of the input isn't valid.".into(),
            suggestion: detail.clone(),
            severity: Severity::ActionRequired,
        },

        WandelError::Precondition(detail) => HumanError {
            message: "This tool needs more input before it can start.".into(),
            suggestion: detail.clone(),
            severity: Severity::ActionRequired,
        },

        WandelError::Encode(_) => HumanError {
            message: "We couldn't save the result in the chosen format.".into(),
            suggestion: "Try a different output format or lower the output size.".into(),
            severity: Severity::Transient,
        },

        WandelError::Render(_) => HumanError {
            message: "We couldn't draw the pages of this document.".into(),
            suggestion: "The PDF renderer may be unavailable or the file damaged. Try another file.".into(),
            severity: Severity::Transient,
        },

        WandelError::Archive(_) => HumanError {
            message: "The zip file couldn't be created.".into(),
            suggestion: "Try downloading the files one by one instead.".into(),
            severity: Severity::Transient,
        },

        WandelError::Cancelled => HumanError {
            message: "Processing was stopped.".into(),
            suggestion: "Start the batch again to process the remaining files.".into(),
            severity: Severity::ActionRequired,
        },

        WandelError::Busy => HumanError {
            message: "Files are still being processed.".into(),
            suggestion: "Wait for the current batch to finish, or stop it first.".into(),
            severity: Severity::ActionRequired,
        },

        WandelError::Config(detail) => HumanError {
            message: "The settings file has a problem.".into(),
            suggestion: format!("Fix or remove the settings file to use defaults. ({detail})"),
            severity: Severity::ActionRequired,
        },

        WandelError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                HumanError {
                    message: "The file couldn't be found.".into(),
                    suggestion: "It may have been moved or deleted. Try choosing the file again.".into(),
                    severity: Severity::ActionRequired,
                }
            } else if io_err.kind() == std::io::ErrorKind::PermissionDenied {
                HumanError {
                    message: "We don't have permission to use that file.".into(),
                    suggestion: "Check the file permissions, or copy the file somewhere else first.".into(),
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "There was a problem reading or writing a file.".into(),
                    suggestion: "Try again. If this keeps happening, your disk may be full.".into(),
                    severity: Severity::Transient,
                }
            }
        }

        WandelError::Serialization(_) => HumanError {
            message: "We had an internal data problem.".into(),
            suggestion: "Try again. If this keeps happening, please report it.".into(),
            severity: Severity::Transient,
        },
    }
}
