// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// 1D barcodes: input validation and bar rendering.

pub mod generator;
pub mod validate;

pub use generator::{BarcodeGenerator, BarcodeOptions};
pub use validate::{BarcodeFormat, BarcodeValidation, validate};
