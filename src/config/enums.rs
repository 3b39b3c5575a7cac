//! Configuration enum types.

use clap::ValueEnum;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a submission does when the canvas queue is full.
///
/// ```toml
/// [canvas]
/// overflow = "overwrite-oldest"
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, JsonSchema, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Producer waits until the render loop drains the queue
    #[default]
    Block,
    /// Oldest queued drawable is evicted (counted in render stats)
    OverwriteOldest,
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::Block => f.write_str("block"),
            OverflowPolicy::OverwriteOldest => f.write_str("overwrite-oldest"),
        }
    }
}

/// Drawing backend used by the demo binary.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, JsonSchema, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Logs every draw call at trace level
    #[default]
    Log,
    /// Rasterizes into a Cairo image surface (requires the `cairo` feature)
    Cairo,
}
