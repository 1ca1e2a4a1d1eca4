// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, WandelError};

/// Tunable engine settings. Persisted as JSON; missing fields take defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Euclidean RGB distance below which a pixel counts as background.
    pub background_threshold: f32,
    /// Watermark glyph height as a fraction of the shorter canvas side.
    pub watermark_size_ratio: f32,
    /// Margin around images placed on PDF pages, in millimetres.
    pub pdf_image_margin_mm: f32,
    /// Creator tag stamped into every PDF the engine writes.
    pub pdf_creator: String,
    /// Default DPI for PDF page rasterisation.
    pub render_dpi: f32,
    /// DPI for page thumbnails.
    pub thumbnail_dpi: f32,
    /// Simulated progress increment per tick while a file is processing.
    pub progress_step: u8,
    /// Interval between simulated progress ticks, in milliseconds.
    pub progress_tick_ms: u64,
    /// Delay between staggered individual deliveries, in milliseconds.
    pub stagger_delay_ms: u64,
    /// Maximum number of files accepted into one batch.
    pub max_files: usize,
    /// Maximum size of one uploaded file, in bytes.
    pub max_file_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            background_threshold: 35.0,
            watermark_size_ratio: 0.05,
            pdf_image_margin_mm: 15.0,
            pdf_creator: "Wandelwerk".into(),
            render_dpi: 150.0,
            thumbnail_dpi: 36.0,
            progress_step: 10,
            progress_tick_ms: 100,
            stagger_delay_ms: 300,
            max_files: 20,
            max_file_bytes: 50 * 1024 * 1024,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file. A missing file yields defaults;
    /// a malformed one is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data).map_err(|err| {
            WandelError::Config(format!("invalid config {}: {}", path.display(), err))
        })?;
        config.validate()?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Persist configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Reject settings the pipelines cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=442.0).contains(&self.background_threshold) {
            return Err(WandelError::Config(format!(
                "background_threshold {} outside 0-442",
                self.background_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.watermark_size_ratio) || self.watermark_size_ratio == 0.0 {
            return Err(WandelError::Config(
                "watermark_size_ratio must be in (0, 1]".into(),
            ));
        }
        if self.render_dpi <= 0.0 || self.thumbnail_dpi <= 0.0 {
            return Err(WandelError::Config("DPI values must be positive".into()));
        }
        if self.progress_step == 0 {
            warn!("progress_step is 0; progress will only move at completion");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load(dir.path().join("absent.json")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        let config = EngineConfig {
            background_threshold: 20.0,
            pdf_creator: "Test Suite".into(),
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        std::fs::write(&path, r#"{"render_dpi": 300}"#).unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.render_dpi, 300.0);
        assert_eq!(config.max_files, 20);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(EngineConfig::load(&path), Err(WandelError::Config(_))));
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let config = EngineConfig {
            background_threshold: 900.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
