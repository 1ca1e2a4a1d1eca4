// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Barcode input validation. Results are values, not errors: they feed form
// feedback while the user is still typing.

use serde::{Deserialize, Serialize};

/// Supported 1D symbologies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarcodeFormat {
    #[serde(rename = "EAN13")]
    Ean13,
    #[serde(rename = "EAN8")]
    Ean8,
    #[serde(rename = "UPC")]
    Upc,
    #[serde(rename = "CODE39")]
    Code39,
    #[serde(rename = "CODE128")]
    Code128,
}

impl BarcodeFormat {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ean13 => "EAN13",
            Self::Ean8 => "EAN8",
            Self::Upc => "UPC",
            Self::Code39 => "CODE39",
            Self::Code128 => "CODE128",
        }
    }

    /// Required digit count for the fixed-length numeric formats.
    pub fn digit_count(&self) -> Option<usize> {
        match self {
            Self::Ean13 => Some(13),
            Self::Ean8 => Some(8),
            Self::Upc => Some(12),
            Self::Code39 | Self::Code128 => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarcodeValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BarcodeValidation {
    fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    fn invalid(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(message.into()),
        }
    }
}

const CODE39_SYMBOLS: &str = "-. $/+%";

/// Check `data` against the rules of `format`.
pub fn validate(format: BarcodeFormat, data: &str) -> BarcodeValidation {
    if data.is_empty() {
        return BarcodeValidation::invalid("Barcode data cannot be empty");
    }

    if let Some(count) = format.digit_count() {
        let all_digits = data.chars().all(|c| c.is_ascii_digit());
        if !all_digits || data.len() != count {
            return BarcodeValidation::invalid(format!(
                "{} requires exactly {} digits",
                format.name(),
                count
            ));
        }
        return BarcodeValidation::ok();
    }

    match format {
        BarcodeFormat::Code39 => {
            let allowed = |c: char| {
                c.is_ascii_uppercase() || c.is_ascii_digit() || CODE39_SYMBOLS.contains(c)
            };
            if data.chars().all(allowed) {
                BarcodeValidation::ok()
            } else {
                BarcodeValidation::invalid(
                    "CODE39 only supports A-Z, 0-9, space and the symbols - . $ / + %",
                )
            }
        }
        _ => {
            if data.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) {
                BarcodeValidation::ok()
            } else {
                BarcodeValidation::invalid("CODE128 supports printable ASCII characters only")
            }
        }
    }
}

/// Modulo-10 check digit used by EAN and UPC over `digits` (check digit
/// excluded): weights 3 and 1 alternate from the rightmost digit.
pub fn check_digit(digits: &str) -> u8 {
    let sum: u32 = digits
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let value = u32::from(b - b'0');
            if i % 2 == 0 { value * 3 } else { value }
        })
        .sum();
    ((10 - sum % 10) % 10) as u8
}
