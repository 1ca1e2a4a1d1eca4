// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// wandelwerk-codes: QR codes and 1D barcodes.
//
// QR payload serialisation (text, URL, e-mail, phone, SMS, WiFi, vCard,
// calendar event), raster and SVG rendering with an optional logo, decoding
// from uploaded images, and bulk generation. Barcodes cover EAN-13, EAN-8,
// UPC-A, Code 39 and Code 128 with input validation ahead of rendering.

pub mod barcode;
pub mod pipeline;
pub mod qr;

pub use barcode::{BarcodeFormat, BarcodeGenerator, BarcodeOptions, BarcodeValidation};
pub use pipeline::{CodePipeline, CodeTool};
pub use qr::{DecodedCode, QrDecoder, QrEncoder, QrOptions, QrPayload};
