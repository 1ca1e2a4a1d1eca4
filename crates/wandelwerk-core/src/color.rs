// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Colour strings as they arrive from option forms ("#fff", "#336699",
// "rgb(0, 0, 0)", "white") parsed into RGBA pixels.

use image::Rgba;

use crate::error::{Result, WandelError};

pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Parse a CSS-style colour string into an RGBA pixel.
///
/// Accepts `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`, `rgb(r, g, b)`,
/// `rgba(r, g, b, a)` (alpha as 0..1) and a handful of named colours.
pub fn parse_color(input: &str) -> Result<Rgba<u8>> {
    let value = input.trim().to_ascii_lowercase();

    if let Some(hex) = value.strip_prefix('#') {
        return parse_hex(hex).ok_or_else(|| invalid(input));
    }

    if let Some(body) = value
        .strip_prefix("rgba(")
        .or_else(|| value.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        return parse_functional(body).ok_or_else(|| invalid(input));
    }

    named(&value).ok_or_else(|| invalid(input))
}

/// Format a pixel as `#rrggbb`, dropping alpha.
pub fn to_hex(color: Rgba<u8>) -> String {
    let Rgba([r, g, b, _]) = color;
    format!("#{r:02x}{g:02x}{b:02x}")
}

fn parse_hex(hex: &str) -> Option<Rgba<u8>> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

    match hex.len() {
        3 => Some(Rgba([nibble(0)?, nibble(1)?, nibble(2)?, 255])),
        4 => Some(Rgba([nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?])),
        6 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, 255])),
        8 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, byte(6)?])),
        _ => None,
    }
}

fn parse_functional(body: &str) -> Option<Rgba<u8>> {
    let parts: Vec<&str> = body.split(',').map(str::trim).collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let channel = |s: &str| s.parse::<f32>().ok().map(|v| v.clamp(0.0, 255.0).round() as u8);
    let alpha = match parts.get(3) {
        Some(a) => (a.parse::<f32>().ok()?.clamp(0.0, 1.0) * 255.0).round() as u8,
        None => 255,
    };
    Some(Rgba([
        channel(parts[0])?,
        channel(parts[1])?,
        channel(parts[2])?,
        alpha,
    ]))
}

fn named(name: &str) -> Option<Rgba<u8>> {
    let color = match name {
        "white" => WHITE,
        "black" => BLACK,
        "transparent" => Rgba([0, 0, 0, 0]),
        "red" => Rgba([255, 0, 0, 255]),
        "green" => Rgba([0, 128, 0, 255]),
        "blue" => Rgba([0, 0, 255, 255]),
        "gray" | "grey" => Rgba([128, 128, 128, 255]),
        "yellow" => Rgba([255, 255, 0, 255]),
        _ => return None,
    };
    Some(color)
}

fn invalid(input: &str) -> WandelError {
    WandelError::Validation(format!("'{input}' is not a recognised colour"))
}
