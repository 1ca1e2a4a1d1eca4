// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Background removal by colour distance from a sampled corner.

use image::{DynamicImage, Rgba, RgbaImage};
use tracing::{debug, instrument};

/// Colours at the four corners: top-left, top-right, bottom-left,
/// bottom-right.
pub fn corner_samples(image: &RgbaImage) -> [Rgba<u8>; 4] {
    let (w, h) = image.dimensions();
    let (right, bottom) = (w.saturating_sub(1), h.saturating_sub(1));
    [
        *image.get_pixel(0, 0),
        *image.get_pixel(right, 0),
        *image.get_pixel(0, bottom),
        *image.get_pixel(right, bottom),
    ]
}

/// Euclidean distance between two colours in RGB space.
pub fn rgb_distance(a: Rgba<u8>, b: Rgba<u8>) -> f32 {
    let d = |i: usize| f32::from(a[i]) - f32::from(b[i]);
    (d(0) * d(0) + d(1) * d(1) + d(2) * d(2)).sqrt()
}

/// Clear every pixel whose colour lies within `threshold` of the top-left
/// corner. Other pixels keep their colour and alpha.
#[instrument(skip(image), fields(width = image.width(), height = image.height()))]
pub fn remove_background(image: &DynamicImage, threshold: f32) -> RgbaImage {
    let mut canvas = image.to_rgba8();
    if canvas.width() == 0 || canvas.height() == 0 {
        return canvas;
    }
    let corners = corner_samples(&canvas);
    let background = corners[0];
    debug!(?corners, ?background, "Background colour sampled");

    let mut cleared = 0usize;
    for pixel in canvas.pixels_mut() {
        if rgb_distance(*pixel, background) < threshold {
            pixel[3] = 0;
            cleared += 1;
        }
    }
    debug!(cleared, "Background pixels cleared");
    canvas
}
