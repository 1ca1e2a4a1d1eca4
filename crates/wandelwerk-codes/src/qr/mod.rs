// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// QR module: payload text, encoding to raster/SVG, decoding, bulk runs.

pub mod bulk;
pub mod decoder;
pub mod encoder;
pub mod payload;

pub use bulk::{BulkEntry, BulkFailure, BulkReport, GeneratedCode, generate_bulk};
pub use decoder::{DecodedCode, QrDecoder};
pub use encoder::{ErrorCorrection, LogoOverlay, QrEncoder, QrOptions};
pub use payload::{CalendarEvent, Contact, QrPayload, WifiNetwork, WifiSecurity};
