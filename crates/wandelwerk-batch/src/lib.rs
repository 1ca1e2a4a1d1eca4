// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// wandelwerk-batch: drives a queue of uploads through one tool.
//
// A `Batch` holds the uploads and their per-file state. `BatchRunner` walks it
// in input order on tokio, reporting progress over a channel and honouring
// pause and stop from a `RunControl`. Finished outputs are handed back one at
// a time or bundled into a zip.

pub mod archive;
pub mod batch;
pub mod control;
pub mod delivery;
pub mod intake;
pub mod runner;
pub mod tools;

pub use archive::{NamingStrategy, build_zip, entry_names};
pub use batch::{Batch, BatchItem, BatchSummary, FileError, NamedOutput, output_name};
pub use control::{RunControl, RunState};
pub use delivery::{Delivery, archive_outputs, deliver, deliver_staggered, stagger_schedule};
pub use intake::IntakePolicy;
pub use runner::{BatchRunner, RunReport, UpdateSender};
pub use tools::{
    ConvertProcessor, FileProcessor, ImageToolProcessor, PdfToolProcessor, ProcessFn,
    QrDecodeProcessor,
};
