use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use engine::EngineConfig;
use serde::{Deserialize, Serialize};
use view::{DEFAULT_TILE_SIZE, WHEEL_ZOOM_STEP};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub tile_size: f64,
    pub viewport_width: f64,
    pub viewport_height: f64,
    /// Tile directory laid out as `{root}/{z}/{x}/{y}.{extension}`. Synthetic
    /// tiles are generated when unset.
    pub tiles: Option<PathBuf>,
    pub extension: String,
    pub start: StartPosition,
    pub session: SessionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            tile_size: DEFAULT_TILE_SIZE,
            viewport_width: 1024.0,
            viewport_height: 768.0,
            tiles: None,
            extension: "png".to_string(),
            start: StartPosition::default(),
            session: SessionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartPosition {
    pub lat: f64,
    pub lon: f64,
    pub zoom: f64,
}

impl Default for StartPosition {
    fn default() -> Self {
        Self {
            lat: 48.8566,
            lon: 2.3522,
            zoom: 12.0,
        }
    }
}

/// Scripted camera motion applied once per frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub frames: u64,
    pub frame_ms: u64,
    /// Screen pixels per frame.
    pub pan_x: f64,
    pub pan_y: f64,
    /// Zoom levels per frame.
    pub zoom_step: f64,
    pub stats_every: u64,
    /// Frames allowed after the script ends for in-flight tiles to land.
    pub settle_frames: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frames: 600,
            frame_ms: 16,
            pan_x: 4.0,
            pan_y: 0.0,
            zoom_step: WHEEL_ZOOM_STEP * 0.1,
            stats_every: 60,
            settle_frames: 240,
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text =
            fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parse config {}", path.display()))
    }
}
