// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Colour filters: brightness, contrast and saturation as percentages where 100
// is the identity, gaussian blur, sepia and grayscale.

use image::{Rgba, RgbaImage};
use imageproc::filter::gaussian_blur_f32;
use tracing::{debug, instrument};
use wandelwerk_core::FilterSettings;

const LUMA: [f32; 3] = [0.2126, 0.7152, 0.0722];

/// Apply all filters in a fixed order: brightness, contrast, saturation,
/// blur, sepia, grayscale.
#[instrument(skip(canvas))]
pub fn apply(canvas: &mut RgbaImage, settings: &FilterSettings) {
    let brightness = settings.brightness / 100.0;
    let contrast = settings.contrast / 100.0;
    let saturation = settings.saturation / 100.0;

    for pixel in canvas.pixels_mut() {
        let Rgba([r, g, b, a]) = *pixel;
        let mut rgb = [f32::from(r), f32::from(g), f32::from(b)];

        for channel in &mut rgb {
            *channel *= brightness;
            *channel = (*channel - 128.0) * contrast + 128.0;
        }

        let gray = luma(&rgb);
        for channel in &mut rgb {
            *channel = gray + (*channel - gray) * saturation;
        }
        *pixel = to_pixel(rgb, a);
    }

    if settings.blur > 0.0 {
        *canvas = gaussian_blur_f32(canvas, settings.blur);
        debug!(sigma = settings.blur, "Blur applied");
    }

    if !settings.sepia && !settings.grayscale {
        return;
    }
    for pixel in canvas.pixels_mut() {
        let Rgba([r, g, b, a]) = *pixel;
        let mut rgb = [f32::from(r), f32::from(g), f32::from(b)];
        if settings.sepia {
            rgb = sepia(rgb);
        }
        if settings.grayscale {
            let gray = luma(&rgb);
            rgb = [gray; 3];
        }
        *pixel = to_pixel(rgb, a);
    }
}

fn to_pixel(rgb: [f32; 3], alpha: u8) -> Rgba<u8> {
    let clamp = |v: f32| v.clamp(0.0, 255.0).round() as u8;
    Rgba([clamp(rgb[0]), clamp(rgb[1]), clamp(rgb[2]), alpha])
}

fn luma(rgb: &[f32; 3]) -> f32 {
    rgb[0] * LUMA[0] + rgb[1] * LUMA[1] + rgb[2] * LUMA[2]
}

fn sepia([r, g, b]: [f32; 3]) -> [f32; 3] {
    [
        0.393 * r + 0.769 * g + 0.189 * b,
        0.349 * r + 0.686 * g + 0.168 * b,
        0.272 * r + 0.534 * g + 0.131 * b,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(1, 1, Rgba(color))
    }

    #[test]
    fn defaults_leave_pixels_alone() {
        let mut canvas = single([12, 130, 240, 200]);
        apply(&mut canvas, &FilterSettings::default());
        assert_eq!(canvas.get_pixel(0, 0).0, [12, 130, 240, 200]);
    }

    #[test]
    fn brightness_scales_channels() {
        let mut canvas = single([100, 50, 0, 255]);
        apply(
            &mut canvas,
            &FilterSettings {
                brightness: 150.0,
                ..Default::default()
            },
        );
        assert_eq!(canvas.get_pixel(0, 0).0, [150, 75, 0, 255]);
    }

    #[test]
    fn zero_saturation_or_grayscale_gives_equal_channels() {
        for settings in [
            FilterSettings {
                saturation: 0.0,
                ..Default::default()
            },
            FilterSettings {
                grayscale: true,
                sepia: true,
                ..Default::default()
            },
        ] {
            let mut canvas = single([200, 40, 90, 255]);
            apply(&mut canvas, &settings);
            let [r, g, b, _] = canvas.get_pixel(0, 0).0;
            assert_eq!(r, g);
            assert_eq!(g, b);
        }
    }

    #[test]
    fn blur_preserves_size() {
        let mut canvas = RgbaImage::from_fn(9, 9, |x, _| {
            if x < 4 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        apply(
            &mut canvas,
            &FilterSettings {
                blur: 1.5,
                ..Default::default()
            },
        );
        assert_eq!(canvas.dimensions(), (9, 9));
        let mid = canvas.get_pixel(4, 4).0[0];
        assert!(mid > 0 && mid < 255);
    }

    #[test]
    fn blur_runs_before_sepia() {
        let edge = RgbaImage::from_fn(9, 9, |x, _| {
            if x < 4 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });

        let mut expected = gaussian_blur_f32(&edge, 1.5);
        for pixel in expected.pixels_mut() {
            let Rgba([r, g, b, a]) = *pixel;
            *pixel = to_pixel(sepia([f32::from(r), f32::from(g), f32::from(b)]), a);
        }

        let mut canvas = edge.clone();
        apply(
            &mut canvas,
            &FilterSettings {
                blur: 1.5,
                sepia: true,
                ..Default::default()
            },
        );
        assert_eq!(canvas.get_pixel(4, 4), expected.get_pixel(4, 4));
        assert_eq!(canvas, expected);
    }
}
