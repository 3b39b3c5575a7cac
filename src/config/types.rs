//! Configuration type definitions.

use super::enums::{BackendKind, OverflowPolicy};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Canvas and render loop settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CanvasConfig {
    /// Maximum number of queued drawables (valid range: 1 - 65536)
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Target frames per second (valid range: 0 - 1000, 0 = drain as fast as possible)
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Behavior when the queue is full: "block" or "overwrite-oldest"
    #[serde(default)]
    pub overflow: OverflowPolicy,

    /// Canvas width in pixels for raster backends (valid range: 16 - 8192)
    #[serde(default = "default_width")]
    pub width: u32,

    /// Canvas height in pixels for raster backends (valid range: 16 - 8192)
    #[serde(default = "default_height")]
    pub height: u32,

    /// Background color as RGBA (0.0 - 1.0), painted at the start of every frame
    #[serde(default = "default_background")]
    pub background: [f64; 4],
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            fps: default_fps(),
            overflow: OverflowPolicy::default(),
            width: default_width(),
            height: default_height(),
            background: default_background(),
        }
    }
}

/// Producer/consumer demo settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DemoConfig {
    /// Number of producer threads (valid range: 1 - 64)
    #[serde(default = "default_producers")]
    pub producers: usize,

    /// Drawables each producer submits per locked batch (valid range: 1 - 256)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Stop after this many frames (0 = run until interrupted or `duration_secs`)
    #[serde(default)]
    pub frames: u64,

    /// Stop after this many seconds (0 = no time limit)
    #[serde(default)]
    pub duration_secs: u64,

    /// Backend to draw with: "log" or "cairo"
    #[serde(default)]
    pub backend: BackendKind,

    /// Number of leading frames the raster backend writes out as PNG files
    #[serde(default)]
    pub record_frames: u64,

    /// Directory for recorded frames (defaults to the working directory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_dir: Option<PathBuf>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            producers: default_producers(),
            batch_size: default_batch_size(),
            frames: 0,
            duration_secs: 0,
            backend: BackendKind::default(),
            record_frames: 0,
            record_dir: None,
        }
    }
}

fn default_capacity() -> usize {
    1024
}

fn default_fps() -> u32 {
    60
}

fn default_width() -> u32 {
    800
}

fn default_height() -> u32 {
    600
}

fn default_background() -> [f64; 4] {
    [1.0, 1.0, 1.0, 1.0]
}

fn default_producers() -> usize {
    4
}

fn default_batch_size() -> usize {
    8
}
