// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// QR decoding from uploaded raster images using `rqrr`.

use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use wandelwerk_core::error::{Result, WandelError};

/// A corner of a detected code, in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// Text read from one QR code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedCode {
    pub text: String,
    /// Corners clockwise from the top-left finder pattern.
    pub location: Option<[Point; 4]>,
}

/// Finds and reads QR codes in images.
#[derive(Debug, Default, Clone, Copy)]
pub struct QrDecoder;

impl QrDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Read the first readable code in `data`.
    pub fn decode(&self, data: &[u8]) -> Result<DecodedCode> {
        self.decode_all(data)?
            .into_iter()
            .next()
            .ok_or_else(|| WandelError::Decode("No code found".into()))
    }

    /// Read every code in `data`. Grids that are detected but cannot be read
    /// are skipped; an image with no readable code is a `Decode` error.
    #[instrument(skip(self, data), fields(data_len = data.len()))]
    pub fn decode_all(&self, data: &[u8]) -> Result<Vec<DecodedCode>> {
        let luma = image::load_from_memory(data)
            .map_err(|err| WandelError::Decode(format!("failed to decode image: {}", err)))?
            .to_luma8();
        let (width, height) = luma.dimensions();
        debug!(width, height, "Searching for QR codes");

        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
                luma.get_pixel(x as u32, y as u32).0[0]
            });
        let grids = prepared.detect_grids();

        let mut codes = Vec::with_capacity(grids.len());
        for (index, grid) in grids.iter().enumerate() {
            match grid.decode() {
                Ok((_meta, text)) => {
                    let corners = grid.bounds.map(|p| Point { x: p.x, y: p.y });
                    codes.push(DecodedCode {
                        text,
                        location: Some(corners),
                    });
                }
                Err(err) => warn!(grid = index, ?err, "Detected grid could not be read"),
            }
        }

        if codes.is_empty() {
            return Err(WandelError::Decode("No code found".into()));
        }
        info!(found = codes.len(), "QR codes decoded");
        Ok(codes)
    }
}
